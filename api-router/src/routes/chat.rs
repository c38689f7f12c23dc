use axum::{extract::State, Json};
use common::error::AppError;
use retrieval_pipeline::{answer_question, gather_context, AnswerContext, ChatAnswer, ContextSources};
use serde::Deserialize;
use tracing::info;

use crate::{api_state::ApiState, error::ApiError};

fn default_use_documents() -> bool {
    true
}

fn default_session_id() -> String {
    "default".to_string()
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub question: String,
    #[serde(default = "default_use_documents")]
    pub use_documents: bool,
    #[serde(default = "default_session_id")]
    pub session_id: String,
    /// When non-empty, replaces the documents stored for `session_id`.
    #[serde(default)]
    pub document_texts: Vec<String>,
    #[serde(default)]
    pub top_k: Option<usize>,
}

pub async fn chat(
    State(state): State<ApiState>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatAnswer>, ApiError> {
    if request.question.trim().is_empty() {
        return Err(AppError::Validation("question must not be empty".into()).into());
    }

    if !request.document_texts.is_empty() {
        info!(
            session_id = %request.session_id,
            documents = request.document_texts.len(),
            "storing session documents"
        );
        state
            .sessions
            .replace(&request.session_id, request.document_texts)
            .await?;
    }

    let context = if request.use_documents {
        let sources = ContextSources {
            embedder: state.embedder.as_ref(),
            corpus: &state.corpus,
            sessions: &state.sessions,
            session_char_limit: state.config.session_context_char_limit,
        };
        let top_k = request.top_k.unwrap_or(state.config.retrieval_top_k);
        gather_context(&sources, &request.session_id, &request.question, top_k).await?
    } else {
        AnswerContext::None
    };

    info!(
        session_id = %request.session_id,
        uses_documents = context.uses_documents(),
        "answering chat question"
    );
    let answer = answer_question(state.llm.as_ref(), &request.question, &context).await?;

    Ok(Json(answer))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::http::StatusCode;
    use serde_json::json;
    use tower::ServiceExt;

    use crate::routes::test_support::{app, json_body, json_request, test_state, StubModel};

    #[tokio::test]
    async fn chat_without_documents_uses_question_only_prompt() {
        let llm = StubModel::replying(r#"{"answer": "A contract is an agreement.", "source": "internet"}"#);
        let state = test_state(Arc::clone(&llm));

        let response = app(&state)
            .oneshot(json_request("/chat/", &json!({"question": "What is a contract?"})))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["answer"], "A contract is an agreement.");
        assert_eq!(body["source"], "internet");

        let prompt = llm.last_prompt().await.expect("prompt sent");
        assert!(!prompt.contains("DOCUMENT CONTEXT"));
        assert!(prompt.contains("What is a contract?"));
    }

    #[tokio::test]
    async fn session_documents_are_stored_and_truncated() {
        let llm = StubModel::replying("Plain text answer");
        let state = test_state(Arc::clone(&llm));
        let long_text = format!("{}{}", "a".repeat(8000), "TAIL-MARKER");

        let response = app(&state)
            .oneshot(json_request(
                "/chat/",
                &json!({
                    "question": "Summarise",
                    "session_id": "s-1",
                    "document_texts": [long_text, "Second document"]
                }),
            ))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["answer"], "Plain text answer");
        assert_eq!(body["source"], "documents and internet");

        let prompt = llm.last_prompt().await.expect("prompt sent");
        assert!(prompt.contains("--- Document 1 ---"));
        assert!(prompt.contains("--- Document 2 ---\nSecond document"));
        assert!(!prompt.contains("TAIL-MARKER"));

        // A follow-up in the same session reuses the stored documents.
        let response = app(&state)
            .oneshot(json_request(
                "/chat/",
                &json!({"question": "And the second?", "session_id": "s-1"}),
            ))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        let prompt = llm.last_prompt().await.expect("prompt sent");
        assert!(prompt.contains("Second document"));
    }

    #[tokio::test]
    async fn use_documents_false_ignores_session() {
        let llm = StubModel::replying("ok");
        let state = test_state(Arc::clone(&llm));

        let response = app(&state)
            .oneshot(json_request(
                "/chat/",
                &json!({
                    "question": "General question",
                    "use_documents": false,
                    "document_texts": ["Confidential clause"]
                }),
            ))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["source"], "internet");
        let prompt = llm.last_prompt().await.expect("prompt sent");
        assert!(!prompt.contains("Confidential clause"));
        assert!(state.sessions.documents("default").await.is_some());
    }

    #[tokio::test]
    async fn too_many_session_documents_is_bad_request() {
        let state = test_state(StubModel::replying("unused"));

        let response = app(&state)
            .oneshot(json_request(
                "/chat/",
                &json!({"question": "q", "document_texts": ["a", "b", "c", "d"]}),
            ))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn upstream_failure_is_bad_gateway() {
        let state = test_state(StubModel::failing("503 upstream overloaded"));

        let response = app(&state)
            .oneshot(json_request("/chat/", &json!({"question": "Anything?"})))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let body = json_body(response).await;
        assert!(body["error"]
            .as_str()
            .is_some_and(|msg| msg.contains("503 upstream overloaded")));
    }
}
