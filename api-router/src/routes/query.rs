use axum::{extract::State, Json};
use common::error::AppError;
use retrieval_pipeline::retrieve_chunks;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{api_state::ApiState, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    pub query: String,
    #[serde(default)]
    pub top_k: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct QueryResult {
    pub text: String,
    pub source: String,
    pub page: Option<u32>,
    pub sequence_index: usize,
    pub score: f32,
}

#[derive(Debug, Serialize)]
pub struct QueryResponse {
    pub results: Vec<QueryResult>,
}

/// Returns the chunks of the active corpus most similar to the query.
pub async fn query_documents(
    State(state): State<ApiState>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<QueryResponse>, ApiError> {
    if request.query.trim().is_empty() {
        return Err(AppError::Validation("query must not be empty".into()).into());
    }
    let top_k = request.top_k.unwrap_or(state.config.retrieval_top_k);

    let retrieved =
        retrieve_chunks(state.embedder.as_ref(), &state.corpus, &request.query, top_k).await?;
    info!(top_k, results = retrieved.len(), "answered similarity query");

    let results = retrieved
        .into_iter()
        .map(|hit| QueryResult {
            text: hit.chunk.text,
            source: hit.chunk.source_filename,
            page: hit.chunk.page_number,
            sequence_index: hit.chunk.sequence_index,
            score: hit.score,
        })
        .collect();

    Ok(Json(QueryResponse { results }))
}
