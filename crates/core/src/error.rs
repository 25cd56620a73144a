use thiserror::Error;

/// Fatal setup problems. Surfacing one of these means the index or a client
/// was wired with incompatible settings, not that a single call failed.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConfigurationError {
    #[error("vector dimension mismatch: index is fixed at {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("invalid configuration value for {key}: {details}")]
    Invalid { key: String, details: String },

    #[error("http client setup failed: {0}")]
    HttpClient(String),
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ValidationError {
    #[error("chunk size must be a positive number of characters, got {0}")]
    ChunkSize(usize),

    #[error("top_k must be a positive integer, got {0}")]
    TopK(usize),

    #[error("chunk from source {actual:?} upserted under {expected:?}")]
    SourceMismatch { expected: String, actual: String },
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum EmbeddingError {
    #[error("embedding backend unavailable: {0}")]
    Unavailable(String),

    #[error("invalid response from embedding backend ({status}): {details}")]
    Backend { status: u16, details: String },

    #[error("malformed embedding response: {0}")]
    Malformed(String),

    #[error("embedding request timed out after {timeout_ms} ms")]
    TimedOut { timeout_ms: u64 },
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum GenerationError {
    #[error("generation timed out after {timeout_ms} ms")]
    TimedOut { timeout_ms: u64 },

    #[error("generation backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("malformed generation output: {0}")]
    MalformedOutput(String),
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum LookupError {
    #[error("no weather data found for {0}")]
    NotFound(String),

    #[error("weather service unavailable: {0}")]
    Unavailable(String),

    #[error("query does not name a location (e.g. 'weather in London')")]
    MissingLocation,

    #[error("weather lookup timed out after {timeout_ms} ms")]
    TimedOut { timeout_ms: u64 },
}

/// What the dimension-checking embedder adapter can fail with.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum EmbedderError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Embedding(#[from] EmbeddingError),
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum IndexError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// Error carried by a pipeline run that ended in the `Failed` stage.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum PipelineError {
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("generation error: {0}")]
    Generation(#[from] GenerationError),

    #[error("lookup error: {0}")]
    Lookup(#[from] LookupError),
}

impl From<EmbedderError> for PipelineError {
    fn from(value: EmbedderError) -> Self {
        match value {
            EmbedderError::Configuration(error) => Self::Configuration(error),
            EmbedderError::Embedding(error) => Self::Embedding(error),
        }
    }
}

impl From<IndexError> for PipelineError {
    fn from(value: IndexError) -> Self {
        match value {
            IndexError::Configuration(error) => Self::Configuration(error),
            IndexError::Validation(error) => Self::Validation(error),
        }
    }
}

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("pdf parse error: {0}")]
    PdfParse(String),

    #[error("unsupported document type: {0}")]
    UnsupportedFile(String),

    #[error("no documents found in {0}")]
    NoDocuments(String),

    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("embedding error: {0}")]
    Embedding(#[from] EmbeddingError),
}

impl From<EmbedderError> for IngestError {
    fn from(value: EmbedderError) -> Self {
        match value {
            EmbedderError::Configuration(error) => Self::Configuration(error),
            EmbedderError::Embedding(error) => Self::Embedding(error),
        }
    }
}

impl From<IndexError> for IngestError {
    fn from(value: IndexError) -> Self {
        match value {
            IndexError::Configuration(error) => Self::Configuration(error),
            IndexError::Validation(error) => Self::Validation(error),
        }
    }
}

pub type Result<T, E = IngestError> = std::result::Result<T, E>;
