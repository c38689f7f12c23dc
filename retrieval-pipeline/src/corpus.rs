use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::info;

use crate::index::{SimilarityMetric, VectorIndex};

#[derive(Default)]
struct CorpusState {
    active: Option<Arc<VectorIndex>>,
    generation: u64,
}

/// Owner of the active index for one corpus scope.
///
/// Readers take a cheap `Arc` snapshot and keep querying it even if a newer
/// index is installed meanwhile; the old index is released once the last
/// snapshot drops.
#[derive(Clone, Default)]
pub struct CorpusHandle {
    state: Arc<RwLock<CorpusState>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CorpusStatus {
    pub documents_loaded: bool,
    pub total_chunks: usize,
    pub generation: u64,
    pub sources: Vec<String>,
    pub similarity_metric: Option<SimilarityMetric>,
    pub built_at: Option<DateTime<Utc>>,
}

impl CorpusHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn snapshot(&self) -> Option<Arc<VectorIndex>> {
        self.state.read().await.active.clone()
    }

    /// Installs `index` as the active index and returns the new generation.
    pub async fn replace(&self, index: VectorIndex) -> u64 {
        let index = Arc::new(index);
        let mut state = self.state.write().await;
        state.generation = state.generation.saturating_add(1);
        let previous = state.active.replace(Arc::clone(&index));
        let generation = state.generation;
        drop(state);

        info!(
            generation,
            chunks = index.len(),
            dimension = index.dimension(),
            sources = ?index.sources(),
            replaced_chunks = previous.as_ref().map_or(0, |old| old.len()),
            "activated new corpus index"
        );
        generation
    }

    pub async fn status(&self) -> CorpusStatus {
        let state = self.state.read().await;
        match state.active.as_deref() {
            Some(index) => CorpusStatus {
                documents_loaded: true,
                total_chunks: index.len(),
                generation: state.generation,
                sources: index.sources().to_vec(),
                similarity_metric: Some(index.metric()),
                built_at: Some(index.built_at()),
            },
            None => CorpusStatus {
                documents_loaded: false,
                total_chunks: 0,
                generation: state.generation,
                sources: Vec::new(),
                similarity_metric: None,
                built_at: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::tests::embedded;

    #[tokio::test]
    async fn new_handle_has_no_index() {
        let corpus = CorpusHandle::new();
        assert!(corpus.snapshot().await.is_none());
        let status = corpus.status().await;
        assert!(!status.documents_loaded);
        assert_eq!(status.generation, 0);
    }

    #[tokio::test]
    async fn replace_swaps_whole_index() {
        let corpus = CorpusHandle::new();
        let first = VectorIndex::build(vec![embedded("old.pdf", 0, "old", vec![1.0, 0.0])])
            .expect("build first");
        assert_eq!(corpus.replace(first).await, 1);

        let held = corpus.snapshot().await.expect("first snapshot");

        let second = VectorIndex::build(vec![
            embedded("new.pdf", 0, "new a", vec![0.0, 1.0]),
            embedded("new.pdf", 1, "new b", vec![1.0, 1.0]),
        ])
        .expect("build second");
        assert_eq!(corpus.replace(second).await, 2);

        // A snapshot taken before the swap still sees the old corpus.
        assert_eq!(held.sources(), ["old.pdf".to_string()]);

        let current = corpus.snapshot().await.expect("second snapshot");
        let results = current.query(&[1.0, 0.0], 10).expect("query");
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.chunk.source_filename == "new.pdf"));

        let status = corpus.status().await;
        assert_eq!(status.total_chunks, 2);
        assert_eq!(status.sources, vec!["new.pdf".to_string()]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn readers_never_observe_a_partially_replaced_index() {
        let corpus = CorpusHandle::new();

        let writer = {
            let corpus = corpus.clone();
            tokio::spawn(async move {
                for round in 0..200_usize {
                    let size = round % 7 + 1;
                    let source = format!("{size}-chunks.pdf");
                    let chunks = (0..size)
                        .map(|sequence| embedded(&source, sequence, "clause", vec![1.0, 0.5]))
                        .collect();
                    corpus
                        .replace(VectorIndex::build(chunks).expect("build"))
                        .await;
                    tokio::task::yield_now().await;
                }
            })
        };

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let corpus = corpus.clone();
                tokio::spawn(async move {
                    let mut inconsistent = 0_usize;
                    for _ in 0..500 {
                        let Some(index) = corpus.snapshot().await else {
                            tokio::task::yield_now().await;
                            continue;
                        };
                        let results = index.query(&[1.0, 0.0], 100).expect("query");
                        let consistent = match index.sources() {
                            [source] => {
                                let expected: usize = source
                                    .split('-')
                                    .next()
                                    .and_then(|size| size.parse().ok())
                                    .unwrap_or(0);
                                index.len() == expected
                                    && results.len() == expected
                                    && results.iter().all(|r| &r.chunk.source_filename == source)
                            }
                            _ => false,
                        };
                        if !consistent {
                            inconsistent += 1;
                        }
                        tokio::task::yield_now().await;
                    }
                    inconsistent
                })
            })
            .collect();

        writer.await.expect("writer task");
        for reader in readers {
            assert_eq!(reader.await.expect("reader task"), 0);
        }
        assert_eq!(corpus.status().await.generation, 200);
    }

    #[tokio::test]
    async fn handles_are_independent_scopes() {
        let a = CorpusHandle::new();
        let b = CorpusHandle::new();
        a.replace(VectorIndex::build(vec![embedded("a.pdf", 0, "a", vec![1.0])]).expect("build"))
            .await;

        assert!(a.snapshot().await.is_some());
        assert!(b.snapshot().await.is_none());
    }
}
