use std::sync::Arc;

use api_router::{api_routes, api_state::ApiState};
use async_openai::{config::OpenAIConfig, Client};
use axum::Router;
use common::utils::{
    config::get_config,
    embedding::{Embedder, EmbeddingProvider},
};
use retrieval_pipeline::OpenAiChatModel;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main(flavor = "multi_thread", worker_threads = 2)]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Set up tracing
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .try_init()
        .ok();

    // Get config
    let config = get_config()?;
    if config.openai_api_key.is_empty() {
        warn!("openai_api_key is not set; chat requests will be rejected upstream");
    }

    let openai_client = Arc::new(Client::with_config(
        OpenAIConfig::new()
            .with_api_key(&config.openai_api_key)
            .with_api_base(&config.openai_base_url),
    ));

    // Create embedding provider based on config
    let embedding_provider =
        Arc::new(EmbeddingProvider::from_config(&config, Some(Arc::clone(&openai_client))).await?);
    let embedding_backend = embedding_provider.backend_label();
    info!(
        embedding_backend,
        embedding_model = ?embedding_provider.model_code(),
        embedding_dimension = embedding_provider.dimension(),
        "Embedding provider initialized"
    );

    let llm = Arc::new(OpenAiChatModel::from_config(openai_client, &config));
    info!(chat_model = %config.chat_model, base_url = %config.openai_base_url, "Language model configured");

    let api_state = ApiState::new(&config, embedding_provider, embedding_backend, llm)?;
    let app = build_app(&api_state);

    info!("Starting server listening on 0.0.0.0:{}", config.http_port);
    let serve_address = format!("0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(serve_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// The browser front-end is served from another origin, so CORS is fully open.
fn build_app(api_state: &ApiState) -> Router {
    api_routes(api_state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(api_state.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{header, Method, Request, StatusCode},
    };
    use common::utils::config::AppConfig;
    use tower::ServiceExt;

    fn smoke_test_state() -> ApiState {
        let config = AppConfig {
            openai_api_key: "test-key".into(),
            openai_base_url: "https://example.com".into(),
            http_port: 0,
            embedding_dimensions: 384,
            ..Default::default()
        };
        let openai_client = Arc::new(Client::with_config(
            OpenAIConfig::new()
                .with_api_key(&config.openai_api_key)
                .with_api_base(&config.openai_base_url),
        ));

        // Use hashed embeddings for tests to avoid external dependencies
        let embedding_provider = Arc::new(
            EmbeddingProvider::new_hashed(384).expect("failed to create hashed embedding provider"),
        );
        let llm = Arc::new(OpenAiChatModel::from_config(openai_client, &config));

        ApiState::new(&config, embedding_provider, "hashed", llm).expect("api state")
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn smoke_startup_with_hashed_embeddings() {
        let app = build_app(&smoke_test_state());

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/live")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("router response");
        assert_eq!(response.status(), StatusCode::OK);

        let health_response = app
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("health response");
        assert_eq!(health_response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn cors_preflight_allows_any_origin() {
        let app = build_app(&smoke_test_state());

        let response = app
            .oneshot(
                Request::builder()
                    .method(Method::OPTIONS)
                    .uri("/chat/")
                    .header(header::ORIGIN, "http://localhost:5173")
                    .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("preflight response");

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response
                .headers()
                .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
                .and_then(|value| value.to_str().ok()),
            Some("*")
        );
    }
}
