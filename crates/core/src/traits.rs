use crate::error::{GenerationError, IndexError, LookupError};
use crate::models::{EmbeddedChunk, GenerationOptions, SearchHit, WeatherFact, WeatherLocation};
use async_trait::async_trait;

#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Replaces every chunk stored for `source` with `chunks`. Readers observe
    /// either the previous set or the new one, never a mix.
    async fn upsert(&self, source: &str, chunks: Vec<EmbeddedChunk>) -> Result<(), IndexError>;

    /// Nearest neighbours by cosine similarity, best first.
    async fn search(&self, query_vector: &[f32], top_k: usize) -> Result<Vec<SearchHit>, IndexError>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Vector length fixed by the first write, if any.
    fn dimension(&self) -> Option<usize>;
}

#[async_trait]
pub trait Generator: Send + Sync {
    fn name(&self) -> &str;

    async fn generate(
        &self,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Result<String, GenerationError>;
}

#[async_trait]
pub trait WeatherLookup: Send + Sync {
    async fn lookup(&self, location: &WeatherLocation) -> Result<WeatherFact, LookupError>;
}
