use crate::error::{ConfigurationError, EmbedderError, EmbeddingError};
use async_trait::async_trait;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_LOCAL_DIMENSIONS: usize = 128;
pub const DEFAULT_EMBED_BATCH_SIZE: usize = 32;

/// Text-to-vector backend. Returns one vector per input, in input order.
#[async_trait]
pub trait Embedder: Send + Sync {
    fn name(&self) -> &str;

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError>;
}

/// Offline embedder hashing character trigrams into a fixed number of buckets.
#[derive(Debug, Clone, Copy)]
pub struct CharacterNgramEmbedder {
    pub dimensions: usize,
}

impl Default for CharacterNgramEmbedder {
    fn default() -> Self {
        Self {
            dimensions: DEFAULT_LOCAL_DIMENSIONS,
        }
    }
}

impl CharacterNgramEmbedder {
    pub fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0f32; self.dimensions.max(1)];
        let lowered = text.to_lowercase();
        let chars: Vec<char> = lowered.chars().collect();

        if chars.is_empty() {
            return vector;
        }

        for window in chars.windows(3) {
            let token = window.iter().collect::<String>();
            let mut hash = 1469598103934665603u64;
            for byte in token.bytes() {
                hash ^= byte as u64;
                hash = hash.wrapping_mul(1099511628211);
            }
            let bucket = (hash % vector.len() as u64) as usize;
            vector[bucket] += 1.0;
        }

        let magnitude = vector.iter().map(|value| value * value).sum::<f32>().sqrt();
        if magnitude > 0.0 {
            for value in &mut vector {
                *value /= magnitude;
            }
        }

        vector
    }
}

#[async_trait]
impl Embedder for CharacterNgramEmbedder {
    fn name(&self) -> &str {
        "char-trigram"
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        Ok(texts.iter().map(|text| self.embed_one(text)).collect())
    }
}

/// Wraps a backend, batches requests, bounds every call with a timeout and
/// pins the vector dimension to whatever the first successful call returned.
pub struct EmbedderAdapter {
    inner: Arc<dyn Embedder>,
    batch_size: usize,
    timeout: Duration,
    dimension: OnceLock<usize>,
}

impl EmbedderAdapter {
    pub fn new(inner: Arc<dyn Embedder>, batch_size: usize, timeout: Duration) -> Self {
        Self {
            inner,
            batch_size: batch_size.max(1),
            timeout,
            dimension: OnceLock::new(),
        }
    }

    pub fn dimension(&self) -> Option<usize> {
        self.dimension.get().copied()
    }

    pub async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedderError> {
        let mut vectors = Vec::with_capacity(texts.len());

        for batch in texts.chunks(self.batch_size) {
            let timeout_ms = self.timeout.as_millis() as u64;
            let embedded = tokio::time::timeout(self.timeout, self.inner.embed(batch))
                .await
                .map_err(|_| EmbeddingError::TimedOut { timeout_ms })??;

            if embedded.len() != batch.len() {
                return Err(EmbeddingError::Malformed(format!(
                    "{} returned {} vectors for {} texts",
                    self.inner.name(),
                    embedded.len(),
                    batch.len()
                ))
                .into());
            }

            let batch_dimension = batch_dimension(&embedded)?;
            if let Some(batch_dimension) = batch_dimension {
                let fixed = *self.dimension.get_or_init(|| {
                    debug!(
                        backend = self.inner.name(),
                        dimension = batch_dimension,
                        "embedding dimension discovered"
                    );
                    batch_dimension
                });
                if fixed != batch_dimension {
                    return Err(ConfigurationError::DimensionMismatch {
                        expected: fixed,
                        actual: batch_dimension,
                    }
                    .into());
                }
            }

            vectors.extend(embedded);
        }

        Ok(vectors)
    }

    pub async fn embed_one(&self, text: &str) -> Result<Vec<f32>, EmbedderError> {
        self.embed(&[text.to_string()])
            .await?
            .pop()
            .ok_or_else(|| EmbeddingError::Malformed("no embedding returned".to_string()).into())
    }
}

fn batch_dimension(vectors: &[Vec<f32>]) -> Result<Option<usize>, EmbeddingError> {
    let Some(first) = vectors.first() else {
        return Ok(None);
    };

    if first.is_empty() {
        return Err(EmbeddingError::Malformed("empty embedding vector".to_string()));
    }

    if vectors.iter().flatten().any(|value| !value.is_finite()) {
        return Err(EmbeddingError::Malformed(
            "embedding contains a non-finite value".to_string(),
        ));
    }

    if let Some(odd) = vectors.iter().find(|vector| vector.len() != first.len()) {
        return Err(EmbeddingError::Malformed(format!(
            "vectors of length {} and {} in one batch",
            first.len(),
            odd.len()
        )));
    }

    Ok(Some(first.len()))
}
