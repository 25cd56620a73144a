pub mod backends;
pub mod chunking;
pub mod config;
pub mod embeddings;
pub mod error;
pub mod evaluator;
pub mod extractor;
pub mod ingest;
pub mod models;
pub mod orchestrator;
pub mod pipeline;
pub mod report;
pub mod router;
pub mod stores;
pub mod traits;
pub mod weather;

#[cfg(test)]
pub(crate) mod testing;

pub use backends::{DisabledWeather, OllamaEmbedder, OllamaGenerator, OpenWeatherClient};
pub use chunking::{normalize_whitespace, Chunker};
pub use config::{AssistantConfig, EvaluatorConfig};
pub use embeddings::{CharacterNgramEmbedder, Embedder, EmbedderAdapter, DEFAULT_LOCAL_DIMENSIONS};
pub use error::{
    ConfigurationError, EmbeddingError, GenerationError, IndexError, IngestError, LookupError,
    PipelineError, ValidationError,
};
pub use evaluator::{Evaluator, DEFAULT_RAG_QUERIES, DEFAULT_WEATHER_QUERIES};
pub use ingest::{discover_documents, load_folder, FolderLoad, SkippedDocument};
pub use models::{
    AnswerOutcome, DocumentChunk, EmbeddedChunk, EvaluationInput, EvaluationRecord,
    GenerationOptions, IngestReport, RouteLabel, SearchHit, WeatherFact, WeatherLocation,
};
pub use orchestrator::{Assistant, Collaborators, FolderIngest, PipelineFailure};
pub use pipeline::{Pipeline, PipelineState, Stage, NO_CONTEXT_ANSWER};
pub use report::{EvaluationReport, FailedQuery, OverallSummary, RouteSummary};
pub use router::classify;
pub use stores::InMemoryVectorIndex;
pub use traits::{Generator, VectorIndex, WeatherLookup};
pub use weather::LocationExtractor;
