use crate::error::{ConfigurationError, IndexError, ValidationError};
use crate::models::{DocumentChunk, EmbeddedChunk, SearchHit};
use crate::traits::VectorIndex;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tracing::debug;

#[derive(Debug)]
struct StoredChunk {
    chunk: DocumentChunk,
    /// Unit-length copy of the embedded vector; zero vectors stay zero.
    unit: Vec<f32>,
}

#[derive(Debug, Default)]
struct Snapshot {
    dimension: Option<usize>,
    sources: BTreeMap<String, Arc<Vec<StoredChunk>>>,
    len: usize,
}

/// Process-local index with copy-on-write snapshots.
///
/// Vectors are L2-normalised on insert and queries on search, so a dot
/// product yields the cosine similarity of the raw vectors. The `RwLock`
/// guards only the snapshot pointer: readers clone the `Arc` and search
/// without holding it, writers build the next snapshot off-lock and swap.
#[derive(Debug, Default)]
pub struct InMemoryVectorIndex {
    current: RwLock<Arc<Snapshot>>,
    writer: Mutex<()>,
}

impl InMemoryVectorIndex {
    pub fn new() -> Self {
        Self::default()
    }

    fn snapshot(&self) -> Arc<Snapshot> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Source names with their chunk counts.
    pub fn sources(&self) -> Vec<(String, usize)> {
        self.snapshot()
            .sources
            .iter()
            .map(|(name, chunks)| (name.clone(), chunks.len()))
            .collect()
    }

    fn replace_source(&self, source: &str, chunks: Vec<EmbeddedChunk>) -> Result<(), IndexError> {
        if let Some(stray) = chunks
            .iter()
            .find(|embedded| embedded.chunk.source_name != source)
        {
            return Err(ValidationError::SourceMismatch {
                expected: source.to_string(),
                actual: stray.chunk.source_name.clone(),
            }
            .into());
        }

        let _writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let previous = self.snapshot();

        let mut dimension = previous.dimension;
        let mut stored = Vec::with_capacity(chunks.len());
        for embedded in chunks {
            let actual = embedded.vector.len();
            match dimension {
                Some(expected) if expected != actual => {
                    return Err(ConfigurationError::DimensionMismatch { expected, actual }.into());
                }
                None if actual == 0 => {
                    return Err(ConfigurationError::Invalid {
                        key: "vector".to_string(),
                        details: "embedding vectors must not be empty".to_string(),
                    }
                    .into());
                }
                None => dimension = Some(actual),
                Some(_) => {}
            }

            stored.push(StoredChunk {
                unit: normalize(&embedded.vector),
                chunk: embedded.chunk,
            });
        }

        let mut sources = previous.sources.clone();
        let replaced = if stored.is_empty() {
            sources.remove(source)
        } else {
            sources.insert(source.to_string(), Arc::new(stored))
        };
        let len = sources.values().map(|chunks| chunks.len()).sum();

        debug!(
            source,
            replaced = replaced.map(|chunks| chunks.len()).unwrap_or(0),
            total = len,
            "swapping index snapshot"
        );

        let next = Arc::new(Snapshot {
            dimension,
            sources,
            len,
        });
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = next;
        Ok(())
    }

    fn nearest(&self, query_vector: &[f32], top_k: usize) -> Result<Vec<SearchHit>, IndexError> {
        if top_k == 0 {
            return Err(ValidationError::TopK(top_k).into());
        }

        let snapshot = self.snapshot();
        let Some(expected) = snapshot.dimension else {
            return Ok(Vec::new());
        };
        if snapshot.len == 0 {
            return Ok(Vec::new());
        }
        if query_vector.len() != expected {
            return Err(ConfigurationError::DimensionMismatch {
                expected,
                actual: query_vector.len(),
            }
            .into());
        }

        let query = normalize(query_vector);
        let mut scored: Vec<(&StoredChunk, f32)> = snapshot
            .sources
            .values()
            .flat_map(|chunks| chunks.iter())
            .map(|stored| (stored, dot(&query, &stored.unit)))
            .collect();

        scored.sort_by(|(left, left_score), (right, right_score)| {
            right_score
                .total_cmp(left_score)
                .then_with(|| left.chunk.chunk_index.cmp(&right.chunk.chunk_index))
                .then_with(|| left.chunk.source_name.cmp(&right.chunk.source_name))
                .then_with(|| left.chunk.id.cmp(&right.chunk.id))
        });

        Ok(scored
            .into_iter()
            .take(top_k)
            .map(|(stored, similarity)| SearchHit {
                chunk: stored.chunk.clone(),
                similarity,
            })
            .collect())
    }
}

#[async_trait]
impl VectorIndex for InMemoryVectorIndex {
    async fn upsert(&self, source: &str, chunks: Vec<EmbeddedChunk>) -> Result<(), IndexError> {
        self.replace_source(source, chunks)
    }

    async fn search(&self, query_vector: &[f32], top_k: usize) -> Result<Vec<SearchHit>, IndexError> {
        self.nearest(query_vector, top_k)
    }

    fn len(&self) -> usize {
        self.snapshot().len
    }

    fn dimension(&self) -> Option<usize> {
        self.snapshot().dimension
    }
}

fn normalize(vector: &[f32]) -> Vec<f32> {
    let magnitude = vector.iter().map(|value| value * value).sum::<f32>().sqrt();
    if magnitude > 0.0 {
        vector.iter().map(|value| value / magnitude).collect()
    } else {
        vector.to_vec()
    }
}

fn dot(left: &[f32], right: &[f32]) -> f32 {
    left.iter().zip(right).map(|(a, b)| a * b).sum()
}
