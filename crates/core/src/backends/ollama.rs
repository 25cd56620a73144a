//! Ollama HTTP backends for text generation and embeddings.
//!
//! API reference: https://github.com/ollama/ollama/blob/main/docs/api.md

use crate::embeddings::Embedder;
use crate::error::{ConfigurationError, EmbeddingError, GenerationError};
use crate::models::GenerationOptions;
use crate::traits::Generator;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument};

pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
pub const DEFAULT_GENERATION_MODEL: &str = "llama3.2";
pub const DEFAULT_EMBEDDING_MODEL: &str = "nomic-embed-text";

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateRequestOptions,
}

#[derive(Debug, Serialize, PartialEq)]
struct GenerateRequestOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
    #[serde(default = "default_true")]
    done: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

fn build_client(timeout: Duration) -> Result<Client, ConfigurationError> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|error| ConfigurationError::HttpClient(error.to_string()))
}

/// Text generation through `POST /api/generate`.
#[derive(Debug, Clone)]
pub struct OllamaGenerator {
    base_url: String,
    model: String,
    client: Client,
}

impl OllamaGenerator {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ConfigurationError> {
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            client: build_client(timeout)?,
        })
    }

    fn request_options(options: &GenerationOptions) -> GenerateRequestOptions {
        GenerateRequestOptions {
            temperature: options.temperature,
            num_predict: options.max_tokens,
        }
    }

    async fn send(&self, prompt: &str, options: &GenerationOptions) -> Result<String, GenerationError> {
        let url = format!("{}/api/generate", self.base_url);
        let request = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
            options: Self::request_options(options),
        };

        let response = self
            .client
            .post(&url)
            .timeout(Duration::from_millis(options.timeout_ms))
            .json(&request)
            .send()
            .await
            .map_err(|error| {
                if error.is_timeout() {
                    GenerationError::TimedOut {
                        timeout_ms: options.timeout_ms,
                    }
                } else {
                    GenerationError::BackendUnavailable(error.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let details = response.text().await.unwrap_or_default();
            return Err(GenerationError::BackendUnavailable(format!(
                "ollama returned {status}: {details}"
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|error| GenerationError::BackendUnavailable(error.to_string()))?;
        parse_generate_body(&body)
    }
}

fn parse_generate_body(body: &str) -> Result<String, GenerationError> {
    let parsed: GenerateResponse = serde_json::from_str(body)
        .map_err(|error| GenerationError::MalformedOutput(error.to_string()))?;

    if !parsed.done {
        return Err(GenerationError::MalformedOutput(
            "generation stopped before completion".to_string(),
        ));
    }

    let text = parsed.response.trim();
    if text.is_empty() {
        return Err(GenerationError::MalformedOutput("empty response".to_string()));
    }

    Ok(text.to_string())
}

#[async_trait]
impl Generator for OllamaGenerator {
    fn name(&self) -> &str {
        "ollama"
    }

    #[instrument(skip(self, prompt, options), fields(model = %self.model, prompt_len = prompt.len()))]
    async fn generate(
        &self,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Result<String, GenerationError> {
        debug!("sending generation request");
        let timeout_ms = options.timeout_ms;
        tokio::time::timeout(Duration::from_millis(timeout_ms), self.send(prompt, options))
            .await
            .map_err(|_| GenerationError::TimedOut { timeout_ms })?
    }
}

/// Batched embeddings through `POST /api/embed`.
#[derive(Debug, Clone)]
pub struct OllamaEmbedder {
    base_url: String,
    model: String,
    client: Client,
    timeout_ms: u64,
}

impl OllamaEmbedder {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ConfigurationError> {
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            client: build_client(timeout)?,
            timeout_ms: timeout.as_millis() as u64,
        })
    }
}

fn parse_embed_body(body: &str) -> Result<Vec<Vec<f32>>, EmbeddingError> {
    let parsed: EmbedResponse =
        serde_json::from_str(body).map_err(|error| EmbeddingError::Malformed(error.to_string()))?;
    Ok(parsed.embeddings)
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    fn name(&self) -> &str {
        "ollama"
    }

    #[instrument(skip(self, texts), fields(model = %self.model, batch = texts.len()))]
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let url = format!("{}/api/embed", self.base_url);
        debug!("sending embedding request");

        let response = self
            .client
            .post(&url)
            .json(&EmbedRequest {
                model: &self.model,
                input: texts,
            })
            .send()
            .await
            .map_err(|error| {
                if error.is_timeout() {
                    EmbeddingError::TimedOut {
                        timeout_ms: self.timeout_ms,
                    }
                } else {
                    EmbeddingError::Unavailable(error.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let details = response.text().await.unwrap_or_default();
            return Err(EmbeddingError::Backend {
                status: status.as_u16(),
                details,
            });
        }

        let body = response
            .text()
            .await
            .map_err(|error| EmbeddingError::Unavailable(error.to_string()))?;
        parse_embed_body(&body)
    }
}
