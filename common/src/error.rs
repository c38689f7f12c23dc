use async_openai::error::OpenAIError;
use thiserror::Error;
use tokio::task::JoinError;

// Core internal errors
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Failed to read {filename}: {message}")]
    Chunking { filename: String, message: String },
    #[error("Embedding error: {0}")]
    Embedding(String),
    #[error("LLM API error: {0}")]
    ExternalService(String),
    #[error("OpenAI error: {0}")]
    OpenAI(#[from] OpenAIError),
    #[error("Task join error: {0}")]
    Join(#[from] JoinError),
    #[error("IoError: {0}")]
    Io(#[from] std::io::Error),
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),
    #[error("Anyhow error: {0}")]
    Anyhow(#[from] anyhow::Error),
    #[error("Internal service error: {0}")]
    InternalError(String),
}

impl AppError {
    pub fn chunking(filename: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Chunking {
            filename: filename.into(),
            message: message.into(),
        }
    }
}
