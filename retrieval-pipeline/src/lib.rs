#![allow(clippy::missing_docs_in_private_items, clippy::result_large_err)]

pub mod answer_retrieval;
pub mod answer_retrieval_helper;
pub mod corpus;
pub mod index;
pub mod scoring;

use common::{
    error::AppError,
    storage::{session_store::SessionStore, types::chunk::Chunk},
    utils::embedding::Embedder,
};
use serde::Serialize;
use tracing::{debug, instrument};

pub use answer_retrieval::{
    answer_question, gather_context, AnswerContext, ChatAnswer, ContextSources, LanguageModel,
    OpenAiChatModel,
};
pub use corpus::{CorpusHandle, CorpusStatus};
pub use index::{SimilarityMetric, VectorIndex};

/// Chunk returned by a similarity query together with its score.
#[derive(Debug, Clone, Serialize)]
pub struct RetrievedChunk {
    pub chunk: Chunk,
    pub score: f32,
}

/// Raw session text as handed to the prompt, after the hard character cut.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSnippet {
    pub position: usize,
    pub text: String,
    pub truncated: bool,
}

/// Embeds `query` and returns the `top_k` most similar chunks of the active
/// index, best first. No active index, an empty index or `top_k == 0` give an
/// empty result without touching the embedder.
#[instrument(skip_all, fields(top_k))]
pub async fn retrieve_chunks(
    embedder: &dyn Embedder,
    corpus: &CorpusHandle,
    query: &str,
    top_k: usize,
) -> Result<Vec<RetrievedChunk>, AppError> {
    let Some(index) = corpus.snapshot().await else {
        debug!("no active index; returning empty result");
        return Ok(Vec::new());
    };

    if index.is_empty() || top_k == 0 {
        return Ok(Vec::new());
    }

    let query_vector = embedder.embed(query).await?;
    let results = index.query(&query_vector, top_k)?;
    debug!(
        results = results.len(),
        best_score = results.first().map(|r| r.score),
        "vector retrieval finished"
    );
    Ok(results)
}

/// Returns the session's stored texts in order, each cut to at most
/// `char_limit` characters. The cut is positional and may split a word.
pub async fn retrieve_session_texts(
    store: &SessionStore,
    session_id: &str,
    char_limit: usize,
) -> Vec<SessionSnippet> {
    let Some(documents) = store.documents(session_id).await else {
        return Vec::new();
    };

    documents
        .iter()
        .enumerate()
        .map(|(position, text)| {
            let (kept, truncated) = truncate_chars(text, char_limit);
            SessionSnippet {
                position,
                text: kept.to_owned(),
                truncated,
            }
        })
        .collect()
}

/// Hard cut at `limit` characters.
pub fn truncate_chars(text: &str, limit: usize) -> (&str, bool) {
    match text.char_indices().nth(limit) {
        Some((byte_idx, _)) => (text.get(..byte_idx).unwrap_or(text), true),
        None => (text, false),
    }
}
