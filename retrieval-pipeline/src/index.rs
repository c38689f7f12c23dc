use std::{collections::BTreeSet, fmt};

use chrono::{DateTime, Utc};
use common::{
    error::AppError,
    storage::types::chunk::{Chunk, EmbeddedChunk},
};
use serde::Serialize;

use crate::{
    scoring::{cosine_with_norms, descending, l2_norm},
    RetrievedChunk,
};

/// Similarity used to rank entries. Fixed for the lifetime of an index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SimilarityMetric {
    Cosine,
}

impl fmt::Display for SimilarityMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cosine => f.write_str("cosine"),
        }
    }
}

struct IndexEntry {
    chunk: Chunk,
    vector: Vec<f32>,
    norm: f32,
}

/// Immutable in-memory k-nearest-neighbour index over embedded chunks.
///
/// Search is exact: every entry is scored against the query. The only way to
/// change the contents is to build a new index.
pub struct VectorIndex {
    entries: Vec<IndexEntry>,
    dimension: usize,
    metric: SimilarityMetric,
    sources: Vec<String>,
    built_at: DateTime<Utc>,
}

impl VectorIndex {
    /// Builds a fresh index. All vectors must share one non-zero dimension.
    pub fn build(embedded_chunks: Vec<EmbeddedChunk>) -> Result<Self, AppError> {
        let dimension = embedded_chunks.first().map_or(0, |first| first.vector.len());
        if !embedded_chunks.is_empty() && dimension == 0 {
            return Err(AppError::Embedding(
                "cannot index zero-dimensional vectors".into(),
            ));
        }

        let mut sources = BTreeSet::new();
        let mut entries = Vec::with_capacity(embedded_chunks.len());
        for EmbeddedChunk { chunk, vector } in embedded_chunks {
            if vector.len() != dimension {
                return Err(AppError::Embedding(format!(
                    "chunk {} of {} has a {}-dimensional vector, expected {dimension}",
                    chunk.sequence_index,
                    chunk.source_filename,
                    vector.len()
                )));
            }
            if vector.iter().any(|value| !value.is_finite()) {
                return Err(AppError::Embedding(format!(
                    "chunk {} of {} has a non-finite vector component",
                    chunk.sequence_index, chunk.source_filename
                )));
            }
            if !sources.contains(&chunk.source_filename) {
                sources.insert(chunk.source_filename.clone());
            }
            let norm = l2_norm(&vector);
            entries.push(IndexEntry {
                chunk,
                vector,
                norm,
            });
        }

        Ok(Self {
            entries,
            dimension,
            metric: SimilarityMetric::Cosine,
            sources: sources.into_iter().collect(),
            built_at: Utc::now(),
        })
    }

    /// Returns up to `k` chunks ranked by descending similarity. Ties keep
    /// build order. An empty index yields an empty result.
    pub fn query(&self, query_vector: &[f32], k: usize) -> Result<Vec<RetrievedChunk>, AppError> {
        if self.entries.is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        if query_vector.len() != self.dimension {
            return Err(AppError::Embedding(format!(
                "query vector has {} dimensions, index expects {}",
                query_vector.len(),
                self.dimension
            )));
        }

        let query_norm = l2_norm(query_vector);
        let mut scored: Vec<(usize, f32)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(position, entry)| {
                let score = match self.metric {
                    SimilarityMetric::Cosine => {
                        cosine_with_norms(query_vector, query_norm, &entry.vector, entry.norm)
                    }
                };
                (position, score)
            })
            .collect();

        // Stable sort keeps build order among equal scores.
        scored.sort_by(|a, b| descending(a.1, b.1));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .filter_map(|(position, score)| {
                self.entries.get(position).map(|entry| RetrievedChunk {
                    chunk: entry.chunk.clone(),
                    score,
                })
            })
            .collect())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn metric(&self) -> SimilarityMetric {
        self.metric
    }

    /// Distinct source filenames, sorted.
    pub fn sources(&self) -> &[String] {
        &self.sources
    }

    pub fn built_at(&self) -> DateTime<Utc> {
        self.built_at
    }
}

impl fmt::Debug for VectorIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VectorIndex")
            .field("entries", &self.entries.len())
            .field("dimension", &self.dimension)
            .field("metric", &self.metric)
            .field("sources", &self.sources)
            .finish_non_exhaustive()
    }
}
