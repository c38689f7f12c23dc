mod chunking;
mod config;
mod services;

pub use chunking::{Chunker, ChunkingConfig, SourceText, DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE};
pub use config::{IngestionConfig, DEFAULT_EMBEDDING_BATCH_SIZE};
#[allow(clippy::module_name_repetitions)]
pub use services::{DefaultPipelineServices, PipelineServices};

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use common::{
    error::AppError,
    storage::types::{
        chunk::{Chunk, EmbeddedChunk},
        document::RawDocument,
    },
    utils::{embedding::Embedder, ingest_limits::validate_upload},
};
use futures::future::try_join_all;
use retrieval_pipeline::{CorpusHandle, VectorIndex};
use serde::Serialize;
use tracing::{debug, info, warn};

/// Outcome of a successful ingestion.
#[derive(Debug, Clone, Serialize)]
pub struct IngestionSummary {
    pub total_chunks: usize,
    pub files_processed: Vec<String>,
    pub generation: u64,
}

#[allow(clippy::module_name_repetitions)]
pub struct IngestionPipeline {
    corpus: CorpusHandle,
    pipeline_config: IngestionConfig,
    chunker: Chunker,
    services: Arc<dyn PipelineServices>,
}

impl IngestionPipeline {
    pub fn new(
        corpus: CorpusHandle,
        embedder: Arc<dyn Embedder>,
        pipeline_config: IngestionConfig,
    ) -> Result<Self, AppError> {
        let services = DefaultPipelineServices::new(embedder);
        Self::with_services(corpus, pipeline_config, Arc::new(services))
    }

    pub fn with_services(
        corpus: CorpusHandle,
        pipeline_config: IngestionConfig,
        services: Arc<dyn PipelineServices>,
    ) -> Result<Self, AppError> {
        let chunker = Chunker::new(pipeline_config.chunking)?;
        Ok(Self {
            corpus,
            pipeline_config,
            chunker,
            services,
        })
    }

    /// Replaces the active corpus with an index built from `files`.
    ///
    /// Nothing is swapped unless every stage succeeds, so a failed upload keeps
    /// serving the previous index.
    #[tracing::instrument(skip_all, fields(files = files.len()))]
    pub async fn ingest(&self, files: Vec<RawDocument>) -> Result<IngestionSummary, AppError> {
        let pipeline_started = Instant::now();
        let files_processed: Vec<String> = files.iter().map(|f| f.filename.clone()).collect();

        let (index, timings) = self.build_index(&files).await.map_err(|err| {
            warn!(error = %err, "ingestion failed; active index left unchanged");
            err
        })?;

        let total_chunks = index.len();
        let generation = self.corpus.replace(index).await;

        info!(
            generation,
            total_chunks,
            files = ?files_processed,
            total_ms = Self::duration_millis(pipeline_started.elapsed()),
            extract_ms = timings.extract_ms,
            chunk_ms = timings.chunk_ms,
            embed_ms = timings.embed_ms,
            build_ms = timings.build_ms,
            "ingestion pipeline finished"
        );

        Ok(IngestionSummary {
            total_chunks,
            files_processed,
            generation,
        })
    }

    async fn build_index(
        &self,
        files: &[RawDocument],
    ) -> Result<(VectorIndex, StageTimings), AppError> {
        validate_upload(files, self.pipeline_config.bounds)?;

        let stage_start = Instant::now();
        let sources = self.extract_sources(files).await?;
        let extract_ms = Self::duration_millis(stage_start.elapsed());

        let stage_start = Instant::now();
        let chunks = self.chunker.split(&sources);
        let chunk_ms = Self::duration_millis(stage_start.elapsed());
        debug!(chunks = chunks.len(), "chunking finished");

        let stage_start = Instant::now();
        let embedded = self.embed_chunks(chunks).await?;
        let embed_ms = Self::duration_millis(stage_start.elapsed());

        let stage_start = Instant::now();
        let index = VectorIndex::build(embedded)?;
        let build_ms = Self::duration_millis(stage_start.elapsed());

        Ok((
            index,
            StageTimings {
                extract_ms,
                chunk_ms,
                embed_ms,
                build_ms,
            },
        ))
    }

    async fn extract_sources(&self, files: &[RawDocument]) -> Result<Vec<SourceText>, AppError> {
        let services = self.services.as_ref();
        let per_file = try_join_all(files.iter().map(|file| async move {
            let pages = services.extract_pages(file).await?;
            debug!(filename = %file.filename, pages = pages.len(), "extracted pages");
            Ok::<_, AppError>((file.filename.clone(), pages))
        }))
        .await?;

        Ok(per_file
            .into_iter()
            .enumerate()
            .flat_map(|(document_index, (filename, pages))| {
                pages.into_iter().map(move |page| SourceText {
                    document_index,
                    filename: filename.clone(),
                    page_number: page.page_number,
                    text: page.text,
                })
            })
            .collect())
    }

    async fn embed_chunks(&self, chunks: Vec<Chunk>) -> Result<Vec<EmbeddedChunk>, AppError> {
        let batch_size = self.pipeline_config.embedding_batch_size.max(1);
        let mut vectors = Vec::with_capacity(chunks.len());

        for batch in chunks.chunks(batch_size) {
            let texts: Vec<String> = batch.iter().map(|chunk| chunk.text.clone()).collect();
            let batch_vectors = self.services.embed_texts(texts).await?;
            if batch_vectors.len() != batch.len() {
                return Err(AppError::Embedding(format!(
                    "embedder returned {} vectors for {} chunks",
                    batch_vectors.len(),
                    batch.len()
                )));
            }
            vectors.extend(batch_vectors);
        }

        Ok(chunks
            .into_iter()
            .zip(vectors)
            .map(|(chunk, vector)| EmbeddedChunk { chunk, vector })
            .collect())
    }

    fn duration_millis(duration: Duration) -> u64 {
        u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
    }
}

struct StageTimings {
    extract_ms: u64,
    chunk_ms: u64,
    embed_ms: u64,
    build_ms: u64,
}
