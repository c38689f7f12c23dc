use std::{
    collections::hash_map::DefaultHasher,
    hash::{Hash, Hasher},
    str::FromStr,
    sync::Arc,
};

use anyhow::{anyhow, Context, Result};
use async_openai::{types::CreateEmbeddingRequestArgs, Client};
use async_trait::async_trait;
use fastembed::{EmbeddingModel, ModelTrait, TextEmbedding, TextInitOptions};
use serde::Deserialize;
use tokio::sync::Mutex;
use tokio_retry::{
    strategy::{jitter, ExponentialBackoff},
    Retry,
};
use tracing::{debug, warn};

use super::config::AppConfig;
use crate::error::AppError;

/// Text to fixed-length vector boundary used by ingestion and retrieval.
///
/// Implementations must be deterministic for a given model and return vectors
/// of exactly [`Embedder::dimension`] floats.
#[async_trait]
pub trait Embedder: Send + Sync {
    fn dimension(&self) -> usize;

    async fn embed(&self, text: &str) -> Result<Vec<f32>, AppError>;

    async fn embed_many(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, AppError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingBackend {
    #[serde(alias = "open-ai")]
    OpenAI,
    #[default]
    #[serde(alias = "fast-embed", alias = "fast")]
    FastEmbed,
    Hashed,
}

impl std::str::FromStr for EmbeddingBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "openai" | "open-ai" => Ok(Self::OpenAI),
            "hashed" => Ok(Self::Hashed),
            "fastembed" | "fast-embed" | "fast" => Ok(Self::FastEmbed),
            other => Err(anyhow!(
                "unknown embedding backend '{other}'. Expected 'openai', 'hashed', or 'fastembed'."
            )),
        }
    }
}

#[derive(Clone)]
pub struct EmbeddingProvider {
    inner: EmbeddingInner,
}

#[derive(Clone)]
enum EmbeddingInner {
    OpenAI {
        client: Arc<Client<async_openai::config::OpenAIConfig>>,
        model: String,
        dimensions: u32,
    },
    Hashed {
        dimension: usize,
    },
    FastEmbed {
        model: Arc<Mutex<TextEmbedding>>,
        model_name: EmbeddingModel,
        dimension: usize,
    },
}

const OPENAI_DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";
const OPENAI_RETRY_ATTEMPTS: usize = 3;

impl EmbeddingProvider {
    pub fn backend_label(&self) -> &'static str {
        match self.inner {
            EmbeddingInner::Hashed { .. } => "hashed",
            EmbeddingInner::FastEmbed { .. } => "fastembed",
            EmbeddingInner::OpenAI { .. } => "openai",
        }
    }

    pub fn model_code(&self) -> Option<String> {
        match &self.inner {
            EmbeddingInner::FastEmbed { model_name, .. } => Some(model_name.to_string()),
            EmbeddingInner::OpenAI { model, .. } => Some(model.clone()),
            EmbeddingInner::Hashed { .. } => None,
        }
    }

    /// Builds the provider selected by `embedding_backend`.
    ///
    /// The OpenAI backend needs a client; FastEmbed downloads its model on first use.
    pub async fn from_config(
        config: &AppConfig,
        openai_client: Option<Arc<Client<async_openai::config::OpenAIConfig>>>,
    ) -> Result<Self> {
        match config.embedding_backend {
            EmbeddingBackend::Hashed => {
                Self::new_hashed(usize::try_from(config.embedding_dimensions)?)
            }
            EmbeddingBackend::FastEmbed => Self::new_fastembed(config.embedding_model.clone()).await,
            EmbeddingBackend::OpenAI => {
                let client = openai_client
                    .ok_or_else(|| anyhow!("the openai embedding backend requires a client"))?;
                let model = config
                    .embedding_model
                    .clone()
                    .unwrap_or_else(|| OPENAI_DEFAULT_EMBEDDING_MODEL.to_string());
                Ok(Self::new_openai(client, model, config.embedding_dimensions))
            }
        }
    }

    pub fn new_openai(
        client: Arc<Client<async_openai::config::OpenAIConfig>>,
        model: String,
        dimensions: u32,
    ) -> Self {
        EmbeddingProvider {
            inner: EmbeddingInner::OpenAI {
                client,
                model,
                dimensions,
            },
        }
    }

    pub async fn new_fastembed(model_override: Option<String>) -> Result<Self> {
        let model_name = if let Some(code) = model_override {
            EmbeddingModel::from_str(&code).map_err(|err| anyhow!(err))?
        } else {
            EmbeddingModel::AllMiniLML6V2
        };

        let options = TextInitOptions::new(model_name.clone()).with_show_download_progress(true);
        let model_name_for_task = model_name.clone();
        let model_name_code = model_name.to_string();

        let (model, dimension) = tokio::task::spawn_blocking(move || -> Result<_> {
            let model =
                TextEmbedding::try_new(options).context("initialising FastEmbed text model")?;
            let info = EmbeddingModel::get_model_info(&model_name_for_task)
                .ok_or_else(|| anyhow!("FastEmbed model metadata missing for {model_name_code}"))?;
            Ok((model, info.dim))
        })
        .await
        .context("joining FastEmbed initialisation task")??;

        Ok(EmbeddingProvider {
            inner: EmbeddingInner::FastEmbed {
                model: Arc::new(Mutex::new(model)),
                model_name,
                dimension,
            },
        })
    }

    pub fn new_hashed(dimension: usize) -> Result<Self> {
        Ok(EmbeddingProvider {
            inner: EmbeddingInner::Hashed {
                dimension: dimension.max(1),
            },
        })
    }

    async fn embed_texts(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        match &self.inner {
            EmbeddingInner::Hashed { dimension } => Ok(texts
                .iter()
                .map(|text| hashed_embedding(text, *dimension))
                .collect()),
            EmbeddingInner::FastEmbed { model, .. } => {
                with_model_blocking(model, move |model| {
                    model
                        .embed(texts, None)
                        .context("generating fastembed batch embeddings")
                })
                .await
            }
            EmbeddingInner::OpenAI {
                client,
                model,
                dimensions,
            } => {
                let retry_strategy = ExponentialBackoff::from_millis(100)
                    .map(jitter)
                    .take(OPENAI_RETRY_ATTEMPTS);

                let response = Retry::spawn(retry_strategy, || {
                    let request = CreateEmbeddingRequestArgs::default()
                        .model(model.clone())
                        .input(texts.clone())
                        .dimensions(*dimensions)
                        .build();
                    async move {
                        client.embeddings().create(request?).await.inspect_err(|err| {
                            warn!(error = %err, "OpenAI embedding request failed");
                        })
                    }
                })
                .await?;

                Ok(in_input_order(
                    response
                        .data
                        .into_iter()
                        .map(|item| (item.index, item.embedding))
                        .collect(),
                ))
            }
        }
    }

    fn check_batch(&self, expected: usize, vectors: &[Vec<f32>]) -> Result<(), AppError> {
        if vectors.len() != expected {
            return Err(AppError::Embedding(format!(
                "{} backend returned {} vectors for {expected} inputs",
                self.backend_label(),
                vectors.len()
            )));
        }

        let dimension = Embedder::dimension(self);
        if let Some(bad) = vectors.iter().find(|vector| vector.len() != dimension) {
            return Err(AppError::Embedding(format!(
                "{} backend returned a {}-dimensional vector, expected {dimension}",
                self.backend_label(),
                bad.len()
            )));
        }

        Ok(())
    }
}

#[async_trait]
impl Embedder for EmbeddingProvider {
    fn dimension(&self) -> usize {
        match &self.inner {
            EmbeddingInner::Hashed { dimension } | EmbeddingInner::FastEmbed { dimension, .. } => {
                *dimension
            }
            EmbeddingInner::OpenAI { dimensions, .. } => *dimensions as usize,
        }
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, AppError> {
        self.embed_many(vec![text.to_owned()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| AppError::Embedding("no embedding returned for input".into()))
    }

    async fn embed_many(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, AppError> {
        let expected = texts.len();
        let vectors = self
            .embed_texts(texts)
            .await
            .map_err(|err| AppError::Embedding(format!("{err:#}")))?;
        self.check_batch(expected, &vectors)?;

        debug!(
            backend = self.backend_label(),
            count = vectors.len(),
            "generated embeddings"
        );
        Ok(vectors)
    }
}

/// Runs CPU-bound model work on the blocking pool while holding the model lock.
async fn with_model_blocking<M, T, F>(model: &Arc<Mutex<M>>, work: F) -> Result<T>
where
    M: Send + 'static,
    T: Send + 'static,
    F: FnOnce(&mut M) -> Result<T> + Send + 'static,
{
    let model = Arc::clone(model);
    tokio::task::spawn_blocking(move || {
        let mut guard = model.blocking_lock();
        work(&mut guard)
    })
    .await
    .context("joining FastEmbed embedding task")?
}

/// Orders `(index, vector)` pairs by the input position the provider reports.
fn in_input_order(mut items: Vec<(u32, Vec<f32>)>) -> Vec<Vec<f32>> {
    items.sort_by_key(|(index, _)| *index);
    items.into_iter().map(|(_, vector)| vector).collect()
}

// Helper functions for hashed embeddings
fn hashed_embedding(text: &str, dimension: usize) -> Vec<f32> {
    let dim = dimension.max(1);
    let mut vector = vec![0.0f32; dim];
    if text.is_empty() {
        return vector;
    }

    let mut token_count = 0f32;
    for token in tokens(text) {
        token_count += 1.0;
        let idx = bucket(&token, dim);
        if let Some(slot) = vector.get_mut(idx) {
            *slot += 1.0;
        }
    }

    if token_count == 0.0 {
        return vector;
    }

    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for value in &mut vector {
            *value /= norm;
        }
    }

    vector
}

fn tokens(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(str::to_lowercase)
}

fn bucket(token: &str, dimension: usize) -> usize {
    let mut hasher = DefaultHasher::new();
    token.hash(&mut hasher);
    (hasher.finish() as usize) % dimension
}
