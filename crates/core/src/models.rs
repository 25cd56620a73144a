use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A contiguous slice of one ingested document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DocumentChunk {
    pub id: u64,
    pub text: String,
    pub source_name: String,
    pub chunk_index: u64,
    /// Character (not byte) offset of the first character in the source text.
    pub start_offset: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmbeddedChunk {
    pub chunk: DocumentChunk,
    pub vector: Vec<f32>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum RouteLabel {
    Weather,
    Rag,
}

impl RouteLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Weather => "weather",
            Self::Rag => "rag",
        }
    }
}

impl fmt::Display for RouteLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchHit {
    pub chunk: DocumentChunk,
    pub similarity: f32,
}

/// Where to ask the weather service about.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum WeatherLocation {
    City(String),
    Coordinates { lat: f64, lon: f64 },
}

impl fmt::Display for WeatherLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::City(name) => f.write_str(name),
            Self::Coordinates { lat, lon } => write!(f, "{lat:.4},{lon:.4}"),
        }
    }
}

/// Current conditions, metric units.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WeatherFact {
    pub location: String,
    /// Degrees Celsius.
    pub temperature: f64,
    /// Percent.
    pub humidity: f64,
    /// Hectopascal.
    pub pressure: f64,
    pub description: String,
    /// Metres per second.
    pub wind_speed: f64,
    /// Meteorological degrees.
    pub wind_direction: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct GenerationOptions {
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_ms: u64,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            temperature: 0.2,
            max_tokens: 512,
            timeout_ms: 30_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IngestReport {
    pub source_name: String,
    pub chunk_count: usize,
    pub dimension: usize,
    pub checksum: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnswerOutcome {
    pub route: RouteLabel,
    pub answer: String,
    pub retrieved_chunk_count: usize,
    pub latency_ms: u64,
}

/// One produced answer handed to the evaluator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EvaluationInput {
    pub query: String,
    pub route: RouteLabel,
    pub answer: String,
    pub latency_ms: u64,
    /// Texts of the chunks the answer was generated from; empty for weather.
    #[serde(default)]
    pub context: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EvaluationRecord {
    pub query: String,
    pub route: RouteLabel,
    pub answer: String,
    pub latency_ms: u64,
    pub metrics: BTreeMap<String, f64>,
    pub overall_score: f64,
}
