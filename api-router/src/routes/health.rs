use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

use crate::api_state::ApiState;

/// Reports whether a corpus is loaded and which index is serving queries.
pub async fn health(State(state): State<ApiState>) -> impl IntoResponse {
    let corpus = state.corpus.status().await;
    let active_sessions = state.sessions.active_count().await;

    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "documents_loaded": corpus.documents_loaded,
            "total_chunks": corpus.total_chunks,
            "corpus_generation": corpus.generation,
            "sources": corpus.sources,
            "similarity_metric": corpus.similarity_metric,
            "index_built_at": corpus.built_at,
            "active_sessions": active_sessions,
            "embedding_backend": state.embedding_backend,
        })),
    )
}
