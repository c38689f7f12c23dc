use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header, Request, Response},
    Router,
};
use common::{
    error::AppError,
    utils::{config::AppConfig, embedding::EmbeddingProvider},
};
use retrieval_pipeline::LanguageModel;
use serde_json::Value;
use tokio::sync::Mutex;

use crate::{api_routes, api_state::ApiState};

const TEST_EMBEDDING_DIM: usize = 64;
const BOUNDARY: &str = "test-boundary-7MA4YWxkTrZu0gW";

/// Language model stub that records prompts and returns a canned reply.
pub(crate) struct StubModel {
    reply: Result<String, String>,
    prompts: Mutex<Vec<String>>,
}

impl StubModel {
    pub(crate) fn replying(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Ok(reply.to_string()),
            prompts: Mutex::new(Vec::new()),
        })
    }

    pub(crate) fn failing(message: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Err(message.to_string()),
            prompts: Mutex::new(Vec::new()),
        })
    }

    pub(crate) async fn last_prompt(&self) -> Option<String> {
        self.prompts.lock().await.last().cloned()
    }
}

#[async_trait]
impl LanguageModel for StubModel {
    async fn complete(&self, prompt: &str) -> Result<String, AppError> {
        self.prompts.lock().await.push(prompt.to_string());
        self.reply.clone().map_err(AppError::ExternalService)
    }
}

pub(crate) fn test_state(llm: Arc<StubModel>) -> ApiState {
    let config = AppConfig {
        embedding_dimensions: 64,
        ..AppConfig::default()
    };
    let embedder = Arc::new(
        EmbeddingProvider::new_hashed(TEST_EMBEDDING_DIM).expect("hashed embedding provider"),
    );
    ApiState::new(&config, embedder, "hashed", llm).expect("api state")
}

pub(crate) fn app(state: &ApiState) -> Router {
    api_routes(state).with_state(state.clone())
}

pub(crate) async fn json_body(response: Response<Body>) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body");
    serde_json::from_slice(&bytes).expect("json body")
}

pub(crate) fn json_request(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("request")
}

/// Builds a multipart request with one `files` part per `(filename, content type, bytes)`.
pub(crate) fn multipart_request(uri: &str, files: &[(&str, &str, &[u8])]) -> Request<Body> {
    let mut body = Vec::new();
    for (filename, content_type, bytes) in files {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"files\"; filename=\"{filename}\"\r\nContent-Type: {content_type}\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .expect("request")
}
