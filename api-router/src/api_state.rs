use std::sync::Arc;

use common::{
    error::AppError,
    storage::session_store::SessionStore,
    utils::{config::AppConfig, embedding::Embedder},
};
use ingestion_pipeline::{IngestionConfig, IngestionPipeline};
use retrieval_pipeline::{CorpusHandle, LanguageModel};

#[derive(Clone)]
pub struct ApiState {
    pub config: AppConfig,
    pub corpus: CorpusHandle,
    pub sessions: SessionStore,
    pub embedder: Arc<dyn Embedder>,
    pub llm: Arc<dyn LanguageModel>,
    pub ingestion: Arc<IngestionPipeline>,
    pub embedding_backend: String,
}

impl ApiState {
    /// Wires a fresh, empty corpus and session store around the given providers.
    pub fn new(
        config: &AppConfig,
        embedder: Arc<dyn Embedder>,
        embedding_backend: impl Into<String>,
        llm: Arc<dyn LanguageModel>,
    ) -> Result<Self, AppError> {
        let corpus = CorpusHandle::new();
        let sessions = SessionStore::from_config(config)?;
        let ingestion = Arc::new(IngestionPipeline::new(
            corpus.clone(),
            Arc::clone(&embedder),
            IngestionConfig::from_config(config)?,
        )?);

        Ok(Self {
            config: config.clone(),
            corpus,
            sessions,
            embedder,
            llm,
            ingestion,
            embedding_backend: embedding_backend.into(),
        })
    }
}
