use axum::{response::IntoResponse, Json};
use serde_json::json;

pub async fn root() -> impl IntoResponse {
    Json(json!({
        "message": "Legal Document Chatbot API",
        "endpoints": {
            "/upload-pdfs/": "POST - Upload 1-3 PDF files",
            "/query/": "POST - Retrieve the most relevant document chunks",
            "/chat/": "POST - Chat with documents + internet knowledge",
            "/health": "GET - Health check",
            "/live": "GET - Liveness check"
        }
    }))
}
