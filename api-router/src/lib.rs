#![allow(clippy::missing_docs_in_private_items, clippy::result_large_err)]

use api_state::ApiState;
use axum::{
    extract::{DefaultBodyLimit, FromRef},
    routing::{get, post},
    Router,
};
use routes::{
    chat::chat, health::health, liveness::live, query::query_documents, root::root,
    upload::upload_pdfs,
};

pub mod api_state;
pub mod error;
mod routes;

/// Router for the document question-answering API.
pub fn api_routes<S>(app_state: &ApiState) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
    ApiState: FromRef<S>,
{
    // Probes and service metadata
    let public = Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/live", get(live));

    let documents = Router::new()
        .route(
            "/upload-pdfs/",
            post(upload_pdfs).layer(DefaultBodyLimit::max(
                app_state.config.ingest_max_body_bytes,
            )),
        )
        .route("/query/", post(query_documents))
        .route("/chat/", post(chat));

    public.merge(documents)
}
