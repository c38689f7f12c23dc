use std::sync::{Arc, OnceLock};

use async_openai::{
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestSystemMessage, ChatCompletionRequestUserMessage,
        CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use common::{
    error::AppError,
    storage::session_store::SessionStore,
    utils::{config::AppConfig, embedding::Embedder},
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, instrument};

use crate::{
    answer_retrieval_helper::{
        create_user_message, format_chunk_context, format_session_context,
        SOURCE_DOCUMENTS_AND_INTERNET, SOURCE_INTERNET, SYSTEM_PROMPT,
    },
    corpus::CorpusHandle,
    retrieve_chunks, retrieve_session_texts, RetrievedChunk, SessionSnippet,
};

/// Remote completion boundary.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, AppError>;
}

/// Chat completion over any OpenAI-compatible endpoint.
pub struct OpenAiChatModel {
    client: Arc<Client<OpenAIConfig>>,
    model: String,
    temperature: f32,
    system_prompt: String,
}

impl OpenAiChatModel {
    pub fn new(client: Arc<Client<OpenAIConfig>>, model: impl Into<String>, temperature: f32) -> Self {
        Self {
            client,
            model: model.into(),
            temperature,
            system_prompt: SYSTEM_PROMPT.to_string(),
        }
    }

    pub fn from_config(client: Arc<Client<OpenAIConfig>>, config: &AppConfig) -> Self {
        Self::new(client, config.chat_model.clone(), config.llm_temperature)
    }
}

#[async_trait]
impl LanguageModel for OpenAiChatModel {
    #[instrument(skip_all, fields(model = %self.model))]
    async fn complete(&self, prompt: &str) -> Result<String, AppError> {
        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages([
                ChatCompletionRequestSystemMessage::from(self.system_prompt.as_str()).into(),
                ChatCompletionRequestUserMessage::from(prompt).into(),
            ])
            .temperature(self.temperature)
            .build()?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|err| AppError::ExternalService(err.to_string()))?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| AppError::ExternalService("No content found in LLM response".into()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatAnswer {
    pub answer: String,
    pub source: String,
}

/// Document material placed in front of the question.
#[derive(Debug, Clone)]
pub enum AnswerContext {
    Chunks(Vec<RetrievedChunk>),
    SessionTexts(Vec<SessionSnippet>),
    None,
}

impl AnswerContext {
    pub fn uses_documents(&self) -> bool {
        match self {
            Self::Chunks(chunks) => !chunks.is_empty(),
            Self::SessionTexts(snippets) => !snippets.is_empty(),
            Self::None => false,
        }
    }

    fn render(&self) -> Option<String> {
        if !self.uses_documents() {
            return None;
        }
        match self {
            Self::Chunks(chunks) => Some(format_chunk_context(chunks)),
            Self::SessionTexts(snippets) => Some(format_session_context(snippets)),
            Self::None => None,
        }
    }
}

/// Where chat context may come from.
pub struct ContextSources<'a> {
    pub embedder: &'a dyn Embedder,
    pub corpus: &'a CorpusHandle,
    pub sessions: &'a SessionStore,
    pub session_char_limit: usize,
}

/// Session documents take precedence over the shared index.
#[instrument(skip_all, fields(session_id, top_k))]
pub async fn gather_context(
    sources: &ContextSources<'_>,
    session_id: &str,
    question: &str,
    top_k: usize,
) -> Result<AnswerContext, AppError> {
    let snippets = retrieve_session_texts(sources.sessions, session_id, sources.session_char_limit).await;
    if !snippets.is_empty() {
        debug!(
            documents = snippets.len(),
            truncated = snippets.iter().filter(|snippet| snippet.truncated).count(),
            "using session documents as context"
        );
        return Ok(AnswerContext::SessionTexts(snippets));
    }

    let chunks = retrieve_chunks(sources.embedder, sources.corpus, question, top_k).await?;
    if chunks.is_empty() {
        return Ok(AnswerContext::None);
    }
    debug!(chunks = chunks.len(), "using indexed chunks as context");
    Ok(AnswerContext::Chunks(chunks))
}

pub fn build_prompt(context: &AnswerContext, question: &str) -> String {
    create_user_message(context.render().as_deref(), question)
}

/// Asks the model and parses its reply. An upstream failure is returned as an
/// error, never replaced by a synthesized answer.
pub async fn answer_question(
    llm: &dyn LanguageModel,
    question: &str,
    context: &AnswerContext,
) -> Result<ChatAnswer, AppError> {
    let prompt = build_prompt(context, question);
    let content = llm.complete(&prompt).await?;
    process_llm_response(&content, context.uses_documents())
}

struct MarkdownPatterns {
    bold: Regex,
    italic: Regex,
    heading: Regex,
    blank_runs: Regex,
}

fn markdown_patterns() -> Result<&'static MarkdownPatterns, AppError> {
    static PATTERNS: OnceLock<Result<MarkdownPatterns, String>> = OnceLock::new();

    let compiled = PATTERNS.get_or_init(|| {
        Ok(MarkdownPatterns {
            bold: Regex::new(r"\*\*([^*]+)\*\*").map_err(|e| e.to_string())?,
            italic: Regex::new(r"\*([^*]+)\*").map_err(|e| e.to_string())?,
            heading: Regex::new(r"#{1,3}\s+").map_err(|e| e.to_string())?,
            blank_runs: Regex::new(r"\n{3,}").map_err(|e| e.to_string())?,
        })
    });

    compiled
        .as_ref()
        .map_err(|err| AppError::InternalError(format!("invalid markdown pattern: {err}")))
}

fn strip_code_fences(content: &str) -> &str {
    if let Some((_, rest)) = content.split_once("```json") {
        return rest.split("```").next().unwrap_or(rest).trim();
    }
    let mut parts = content.split("```");
    match (parts.next(), parts.next()) {
        (Some(_), Some(fenced)) => fenced.trim(),
        _ => content,
    }
}

fn clean_markdown(content: &str) -> Result<String, AppError> {
    let patterns = markdown_patterns()?;
    let text = patterns.bold.replace_all(content, "$1");
    let text = patterns.italic.replace_all(&text, "$1");
    let text = patterns.heading.replace_all(&text, "\n");
    Ok(patterns.blank_runs.replace_all(&text, "\n\n").into_owned())
}

/// Extracts `{answer, source}` from model output. Non-JSON output becomes the
/// answer verbatim with a source label derived from `used_documents`.
pub fn process_llm_response(content: &str, used_documents: bool) -> Result<ChatAnswer, AppError> {
    let cleaned = clean_markdown(strip_code_fences(content))?;
    let default_source = if used_documents {
        SOURCE_DOCUMENTS_AND_INTERNET
    } else {
        SOURCE_INTERNET
    };

    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(&cleaned) {
        if let Some(answer) = map.get("answer").and_then(Value::as_str) {
            let source = map
                .get("source")
                .and_then(Value::as_str)
                .unwrap_or(default_source);
            return Ok(ChatAnswer {
                answer: answer.to_string(),
                source: source.to_string(),
            });
        }
    }

    Ok(ChatAnswer {
        answer: cleaned,
        source: default_source.to_string(),
    })
}
