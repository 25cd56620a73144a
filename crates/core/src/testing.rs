//! In-memory collaborators shared by the unit tests.

use crate::error::{GenerationError, IndexError, LookupError};
use crate::models::{EmbeddedChunk, GenerationOptions, SearchHit, WeatherFact, WeatherLocation};
use crate::stores::InMemoryVectorIndex;
use crate::traits::{Generator, VectorIndex, WeatherLookup};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

pub struct FakeGenerator {
    reply: Result<String, GenerationError>,
    pub calls: AtomicUsize,
    pub prompts: Mutex<Vec<String>>,
}

impl FakeGenerator {
    pub fn replying(text: &str) -> Self {
        Self::with_result(Ok(text.to_string()))
    }

    pub fn failing(error: GenerationError) -> Self {
        Self::with_result(Err(error))
    }

    fn with_result(reply: Result<String, GenerationError>) -> Self {
        Self {
            reply,
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Generator for FakeGenerator {
    fn name(&self) -> &str {
        "fake"
    }

    async fn generate(
        &self,
        prompt: &str,
        _options: &GenerationOptions,
    ) -> Result<String, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.reply.clone()
    }
}

pub struct FakeWeather {
    result: Result<WeatherFact, LookupError>,
    pub calls: AtomicUsize,
    pub locations: Mutex<Vec<WeatherLocation>>,
}

impl FakeWeather {
    pub fn reporting(fact: WeatherFact) -> Self {
        Self::with_result(Ok(fact))
    }

    pub fn failing(error: LookupError) -> Self {
        Self::with_result(Err(error))
    }

    fn with_result(result: Result<WeatherFact, LookupError>) -> Self {
        Self {
            result,
            calls: AtomicUsize::new(0),
            locations: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WeatherLookup for FakeWeather {
    async fn lookup(&self, location: &WeatherLocation) -> Result<WeatherFact, LookupError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.locations.lock().unwrap().push(location.clone());
        self.result.clone()
    }
}

/// Never answers within any reasonable bound; pair with a paused clock.
pub struct Hanging;

#[async_trait]
impl Generator for Hanging {
    fn name(&self) -> &str {
        "hanging"
    }

    async fn generate(
        &self,
        _prompt: &str,
        _options: &GenerationOptions,
    ) -> Result<String, GenerationError> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok("too late".to_string())
    }
}

#[async_trait]
impl WeatherLookup for Hanging {
    async fn lookup(&self, _location: &WeatherLocation) -> Result<WeatherFact, LookupError> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(london_fact())
    }
}

/// Real in-memory index that also counts how often it was touched.
#[derive(Default)]
pub struct CountingIndex {
    inner: InMemoryVectorIndex,
    pub searches: AtomicUsize,
    pub upserts: AtomicUsize,
}

impl CountingIndex {
    pub fn search_count(&self) -> usize {
        self.searches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VectorIndex for CountingIndex {
    async fn upsert(&self, source: &str, chunks: Vec<EmbeddedChunk>) -> Result<(), IndexError> {
        self.upserts.fetch_add(1, Ordering::SeqCst);
        self.inner.upsert(source, chunks).await
    }

    async fn search(&self, query_vector: &[f32], top_k: usize) -> Result<Vec<SearchHit>, IndexError> {
        self.searches.fetch_add(1, Ordering::SeqCst);
        self.inner.search(query_vector, top_k).await
    }

    fn len(&self) -> usize {
        self.inner.len()
    }

    fn dimension(&self) -> Option<usize> {
        self.inner.dimension()
    }
}

pub fn london_fact() -> WeatherFact {
    WeatherFact {
        location: "London".to_string(),
        temperature: 14.2,
        humidity: 72.0,
        pressure: 1015.0,
        description: "scattered clouds".to_string(),
        wind_speed: 3.6,
        wind_direction: 200.0,
    }
}
