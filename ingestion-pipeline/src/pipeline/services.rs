use std::sync::Arc;

use async_trait::async_trait;
use common::{
    error::AppError,
    storage::types::document::{PageText, RawDocument},
    utils::embedding::Embedder,
};

use crate::utils::pdf_ingestion::extract_pdf_pages;

/// Side-effecting steps of the pipeline, split out so tests can substitute them.
#[async_trait]
pub trait PipelineServices: Send + Sync {
    async fn extract_pages(&self, document: &RawDocument) -> Result<Vec<PageText>, AppError>;

    async fn embed_texts(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, AppError>;
}

pub struct DefaultPipelineServices {
    embedder: Arc<dyn Embedder>,
}

impl DefaultPipelineServices {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self { embedder }
    }
}

#[async_trait]
impl PipelineServices for DefaultPipelineServices {
    async fn extract_pages(&self, document: &RawDocument) -> Result<Vec<PageText>, AppError> {
        extract_pdf_pages(document).await
    }

    async fn embed_texts(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, AppError> {
        self.embedder.embed_many(texts).await
    }
}
