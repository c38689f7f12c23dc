use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

use super::embedding::EmbeddingBackend;

#[derive(Clone, Deserialize, Debug)]
#[serde(default)]
pub struct AppConfig {
    pub openai_api_key: String,
    pub openai_base_url: String,
    pub chat_model: String,
    pub llm_temperature: f32,
    pub http_port: u16,
    pub embedding_backend: EmbeddingBackend,
    pub embedding_model: Option<String>,
    pub embedding_dimensions: u32,
    pub embedding_batch_size: usize,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub retrieval_top_k: usize,
    pub ingest_min_files: usize,
    pub ingest_max_files: usize,
    pub ingest_max_body_bytes: usize,
    pub session_context_char_limit: usize,
    pub session_ttl_secs: u64,
    pub session_max_entries: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            openai_api_key: String::new(),
            openai_base_url: default_base_url(),
            chat_model: "nvidia/nemotron-nano-12b-v2-vl:free".to_string(),
            llm_temperature: 0.3,
            http_port: 8000,
            embedding_backend: EmbeddingBackend::default(),
            embedding_model: None,
            embedding_dimensions: 384,
            embedding_batch_size: 64,
            chunk_size: 1000,
            chunk_overlap: 150,
            retrieval_top_k: 5,
            ingest_min_files: 1,
            ingest_max_files: 3,
            ingest_max_body_bytes: 50 * 1024 * 1024,
            session_context_char_limit: 8000,
            session_ttl_secs: 60 * 60,
            session_max_entries: 1024,
        }
    }
}

fn default_base_url() -> String {
    "https://openrouter.ai/api/v1".to_string()
}

pub fn get_config() -> Result<AppConfig, ConfigError> {
    let config = Config::builder()
        .add_source(File::with_name("config").required(false))
        .add_source(Environment::default())
        .build()?;

    config.try_deserialize()
}
