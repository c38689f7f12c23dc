use common::{
    error::AppError,
    utils::{config::AppConfig, ingest_limits::IngestBounds},
};

use super::chunking::ChunkingConfig;

pub const DEFAULT_EMBEDDING_BATCH_SIZE: usize = 64;

#[derive(Debug, Clone)]
pub struct IngestionConfig {
    pub chunking: ChunkingConfig,
    pub bounds: IngestBounds,
    /// Number of chunk texts sent to the embedder per request.
    pub embedding_batch_size: usize,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            chunking: ChunkingConfig::default(),
            bounds: IngestBounds::default(),
            embedding_batch_size: DEFAULT_EMBEDDING_BATCH_SIZE,
        }
    }
}

impl IngestionConfig {
    pub fn from_config(config: &AppConfig) -> Result<Self, AppError> {
        Ok(Self {
            chunking: ChunkingConfig {
                chunk_size: config.chunk_size,
                overlap: config.chunk_overlap,
            },
            bounds: IngestBounds::from_config(config)?,
            embedding_batch_size: config.embedding_batch_size.max(1),
        })
    }
}
