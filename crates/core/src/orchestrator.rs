use crate::chunking::Chunker;
use crate::config::{AssistantConfig, EvaluatorConfig};
use crate::embeddings::{Embedder, EmbedderAdapter};
use crate::error::{ConfigurationError, GenerationError, IngestError, PipelineError};
use crate::evaluator::Evaluator;
use crate::ingest::{ingest_text, load_folder, SkippedDocument};
use crate::models::{AnswerOutcome, EvaluationInput, IngestReport, RouteLabel};
use crate::pipeline::{Pipeline, Stage};
use crate::report::{EvaluationReport, FailedQuery};
use crate::traits::{Generator, VectorIndex, WeatherLookup};
use crate::weather::LocationExtractor;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{info, instrument, warn};

/// A query that ended in `Failed`, with everything needed to tell why.
#[derive(Debug, Clone, Error)]
#[error("query {query:?} failed: {error}")]
pub struct PipelineFailure {
    pub query: String,
    pub route: Option<RouteLabel>,
    pub error: PipelineError,
    pub history: Vec<Stage>,
}

#[derive(Debug, Default)]
pub struct FolderIngest {
    pub reports: Vec<IngestReport>,
    pub skipped: Vec<SkippedDocument>,
}

/// Collaborators the assistant runs against.
pub struct Collaborators {
    pub index: Arc<dyn VectorIndex>,
    pub embedder: Arc<dyn Embedder>,
    pub generator: Arc<dyn Generator>,
    pub weather: Arc<dyn WeatherLookup>,
    /// Rubric grader for evaluation; `None` keeps evaluation rule-based.
    pub judge: Option<Arc<dyn Generator>>,
}

/// Entry point tying ingestion, answering and evaluation together.
pub struct Assistant {
    config: AssistantConfig,
    chunker: Chunker,
    index: Arc<dyn VectorIndex>,
    embedder: Arc<EmbedderAdapter>,
    pipeline: Pipeline,
    evaluator: Evaluator,
}

impl Assistant {
    pub fn new(
        config: AssistantConfig,
        evaluator_config: EvaluatorConfig,
        collaborators: Collaborators,
    ) -> Result<Self, ConfigurationError> {
        config.validate()?;

        let chunker =
            Chunker::new(config.max_chunk_chars).map_err(|error| ConfigurationError::Invalid {
                key: "max_chunk_chars".to_string(),
                details: error.to_string(),
            })?;
        let embedder = Arc::new(EmbedderAdapter::new(
            collaborators.embedder,
            config.embed_batch_size,
            config.call_timeout(),
        ));

        let pipeline = Pipeline::new(
            collaborators.index.clone(),
            embedder.clone(),
            collaborators.generator,
            collaborators.weather,
            LocationExtractor::new()?,
            config.top_k,
            config.generation,
            config.call_timeout(),
        );

        let mut evaluator = Evaluator::new(evaluator_config)?;
        if let Some(judge) = collaborators.judge {
            evaluator = evaluator.with_judge(judge);
        }

        Ok(Self {
            config,
            chunker,
            index: collaborators.index,
            embedder,
            pipeline,
            evaluator,
        })
    }

    pub fn config(&self) -> &AssistantConfig {
        &self.config
    }

    pub fn indexed_chunks(&self) -> usize {
        self.index.len()
    }

    pub async fn ingest(&self, source_name: &str, raw_text: &str) -> Result<IngestReport, IngestError> {
        ingest_text(
            &self.chunker,
            &self.embedder,
            self.index.as_ref(),
            source_name,
            raw_text,
        )
        .await
    }

    /// Ingests every supported document under `path`, one source per file.
    pub async fn ingest_path(&self, path: &Path) -> Result<FolderIngest, IngestError> {
        let load = load_folder(path)?;
        let mut outcome = FolderIngest {
            reports: Vec::with_capacity(load.documents.len()),
            skipped: load.skipped,
        };

        for document in load.documents {
            let report = self.ingest(&document.source_name, &document.text).await?;
            outcome.reports.push(report);
        }

        info!(
            documents = outcome.reports.len(),
            skipped = outcome.skipped.len(),
            chunks = self.index.len(),
            "corpus ingested"
        );
        Ok(outcome)
    }

    pub async fn answer(&self, query: &str) -> Result<AnswerOutcome, PipelineFailure> {
        self.execute(query).await.map(|(outcome, _)| outcome)
    }

    /// Runs every query through the pipeline one after another, then scores
    /// the successful ones. Failed queries are reported but never scored.
    pub async fn evaluate_batch(&self, queries: &[String]) -> EvaluationReport {
        let mut inputs = Vec::with_capacity(queries.len());
        let mut failures = Vec::new();

        for query in queries {
            match self.execute(query).await {
                Ok((outcome, context)) => inputs.push(EvaluationInput {
                    query: query.clone(),
                    route: outcome.route,
                    answer: outcome.answer,
                    latency_ms: outcome.latency_ms,
                    context,
                }),
                Err(failure) => {
                    warn!(query = %failure.query, error = %failure.error, "query failed during evaluation");
                    failures.push(FailedQuery {
                        query: failure.query,
                        route: failure.route,
                        error: failure.error.to_string(),
                    });
                }
            }
        }

        let records = self.evaluator.evaluate(&inputs).await;
        let report = EvaluationReport::build(records, failures);
        info!(
            report_id = %report.report_id,
            scored = report.overall.scored_queries,
            failed = report.overall.failed_queries,
            "evaluation finished"
        );
        report
    }

    #[instrument(skip(self))]
    async fn execute(&self, query: &str) -> Result<(AnswerOutcome, Vec<String>), PipelineFailure> {
        let started = Instant::now();
        let state = self.pipeline.run(query).await;
        let latency_ms = started.elapsed().as_millis() as u64;
        let history = state.history().to_vec();

        match (state.answer, state.error) {
            (Some(answer), None) => {
                let route = state.route.unwrap_or(RouteLabel::Rag);
                let context: Vec<String> = state
                    .retrieved_chunks
                    .into_iter()
                    .map(|chunk| chunk.text)
                    .collect();
                info!(%route, chunks = context.len(), latency_ms, "query answered");
                Ok((
                    AnswerOutcome {
                        route,
                        answer,
                        retrieved_chunk_count: context.len(),
                        latency_ms,
                    },
                    context,
                ))
            }
            (_, error) => {
                let error = error.unwrap_or_else(|| {
                    GenerationError::MalformedOutput("pipeline ended without an answer".to_string())
                        .into()
                });
                warn!(%error, latency_ms, "query failed");
                Err(PipelineFailure {
                    query: state.query,
                    route: state.route,
                    error,
                    history,
                })
            }
        }
    }
}
