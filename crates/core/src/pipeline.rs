use crate::embeddings::EmbedderAdapter;
use crate::error::{GenerationError, LookupError, PipelineError};
use crate::models::{DocumentChunk, GenerationOptions, RouteLabel};
use crate::router::classify;
use crate::traits::{Generator, VectorIndex, WeatherLookup};
use crate::weather::{format_weather_answer, LocationExtractor};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

pub const NO_CONTEXT_ANSWER: &str =
    "No relevant information was found in the ingested documents for this question.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Start,
    Routed,
    Retrieving,
    Answering,
    Done,
    Failed,
}

impl Stage {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

/// Everything one query accumulates on its way through the pipeline.
#[derive(Debug, Clone)]
pub struct PipelineState {
    pub query: String,
    pub route: Option<RouteLabel>,
    pub retrieved_chunks: Vec<DocumentChunk>,
    pub answer: Option<String>,
    pub error: Option<PipelineError>,
    stage: Stage,
    history: Vec<Stage>,
    draft: Option<String>,
}

impl PipelineState {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            route: None,
            retrieved_chunks: Vec::new(),
            answer: None,
            error: None,
            stage: Stage::Start,
            history: vec![Stage::Start],
            draft: None,
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Stages visited so far, starting with `Start`.
    pub fn history(&self) -> &[Stage] {
        &self.history
    }

    pub fn is_done(&self) -> bool {
        self.stage == Stage::Done
    }

    fn enter(&mut self, stage: Stage) {
        debug!(query = %self.query, from = ?self.stage, to = ?stage, "pipeline transition");
        self.stage = stage;
        self.history.push(stage);
    }

    fn fail(&mut self, error: PipelineError) {
        self.error = Some(error);
        self.draft = None;
        self.enter(Stage::Failed);
    }
}

/// Router → {weather lookup | retrieval + generation} → answer.
///
/// Collaborators are injected so the same machine runs against HTTP backends
/// or in-memory fakes. No retries happen here.
pub struct Pipeline {
    index: Arc<dyn VectorIndex>,
    embedder: Arc<EmbedderAdapter>,
    generator: Arc<dyn Generator>,
    weather: Arc<dyn WeatherLookup>,
    locations: LocationExtractor,
    top_k: usize,
    generation: GenerationOptions,
    lookup_timeout: Duration,
}

impl Pipeline {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        index: Arc<dyn VectorIndex>,
        embedder: Arc<EmbedderAdapter>,
        generator: Arc<dyn Generator>,
        weather: Arc<dyn WeatherLookup>,
        locations: LocationExtractor,
        top_k: usize,
        generation: GenerationOptions,
        lookup_timeout: Duration,
    ) -> Self {
        Self {
            index,
            embedder,
            generator,
            weather,
            locations,
            top_k,
            generation,
            lookup_timeout,
        }
    }

    pub async fn run(&self, query: &str) -> PipelineState {
        let mut state = PipelineState::new(query);
        while !state.stage().is_terminal() {
            self.step(&mut state).await;
        }
        state
    }

    /// Performs exactly one transition. Terminal states are left untouched.
    pub async fn step(&self, state: &mut PipelineState) {
        match state.stage {
            Stage::Start => {
                state.route = Some(classify(&state.query));
                state.enter(Stage::Routed);
            }
            Stage::Routed => {
                let route = *state.route.get_or_insert_with(|| classify(&state.query));
                match route {
                    RouteLabel::Rag => match self.retrieve(&state.query).await {
                        Ok(chunks) => {
                            state.retrieved_chunks = chunks;
                            state.enter(Stage::Retrieving);
                        }
                        Err(error) => state.fail(error),
                    },
                    RouteLabel::Weather => match self.weather_answer(&state.query).await {
                        Ok(answer) => {
                            state.draft = Some(answer);
                            state.enter(Stage::Answering);
                        }
                        Err(error) => state.fail(error),
                    },
                }
            }
            Stage::Retrieving => match self.rag_answer(&state.query, &state.retrieved_chunks).await {
                Ok(answer) => {
                    state.draft = Some(answer);
                    state.enter(Stage::Answering);
                }
                Err(error) => state.fail(error),
            },
            Stage::Answering => {
                state.answer = state.draft.take();
                state.enter(Stage::Done);
            }
            Stage::Done | Stage::Failed => {}
        }
    }

    async fn retrieve(&self, query: &str) -> Result<Vec<DocumentChunk>, PipelineError> {
        let query_vector = self.embedder.embed_one(query).await?;
        let hits = self.index.search(&query_vector, self.top_k).await?;
        debug!(hits = hits.len(), "retrieved chunks");
        Ok(hits.into_iter().map(|hit| hit.chunk).collect())
    }

    async fn rag_answer(&self, query: &str, chunks: &[DocumentChunk]) -> Result<String, PipelineError> {
        if chunks.is_empty() {
            return Ok(NO_CONTEXT_ANSWER.to_string());
        }

        let prompt = build_rag_prompt(query, chunks);
        let timeout_ms = self.generation.timeout_ms;
        let answer = tokio::time::timeout(
            Duration::from_millis(timeout_ms),
            self.generator.generate(&prompt, &self.generation),
        )
        .await
        .map_err(|_| GenerationError::TimedOut { timeout_ms })??;
        Ok(answer)
    }

    async fn weather_answer(&self, query: &str) -> Result<String, PipelineError> {
        let location = self
            .locations
            .extract(query)
            .ok_or(LookupError::MissingLocation)?;

        let timeout_ms = self.lookup_timeout.as_millis() as u64;
        let fact = tokio::time::timeout(self.lookup_timeout, self.weather.lookup(&location))
            .await
            .map_err(|_| LookupError::TimedOut { timeout_ms })??;
        Ok(format_weather_answer(&fact))
    }
}

pub fn build_rag_prompt(query: &str, chunks: &[DocumentChunk]) -> String {
    let context = chunks
        .iter()
        .map(|chunk| chunk.text.trim())
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        "Based on the following context from the ingested documents, answer the user's question.\n\n\
         Context:\n{context}\n\n\
         Question: {query}\n\n\
         Provide a helpful and accurate answer based only on the context provided."
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::CharacterNgramEmbedder;
    use crate::error::EmbeddingError;
    use crate::models::EmbeddedChunk;
    use crate::testing::{london_fact, CountingIndex, FakeGenerator, FakeWeather, Hanging};
    use async_trait::async_trait;

    struct BrokenEmbedder;

    #[async_trait]
    impl crate::embeddings::Embedder for BrokenEmbedder {
        fn name(&self) -> &str {
            "broken"
        }

        async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            Err(EmbeddingError::Unavailable("connection refused".to_string()))
        }
    }

    struct Fixture {
        index: Arc<CountingIndex>,
        generator: Arc<FakeGenerator>,
        weather: Arc<FakeWeather>,
        pipeline: Pipeline,
    }

    fn fixture_with(
        embedder: Arc<dyn crate::embeddings::Embedder>,
        generator: FakeGenerator,
        weather: FakeWeather,
    ) -> Fixture {
        let index = Arc::new(CountingIndex::default());
        let generator = Arc::new(generator);
        let weather = Arc::new(weather);
        let pipeline = Pipeline::new(
            index.clone(),
            Arc::new(EmbedderAdapter::new(embedder, 8, Duration::from_secs(1))),
            generator.clone(),
            weather.clone(),
            LocationExtractor::new().unwrap(),
            4,
            GenerationOptions::default(),
            Duration::from_secs(1),
        );
        Fixture {
            index,
            generator,
            weather,
            pipeline,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(
            Arc::new(CharacterNgramEmbedder::default()),
            FakeGenerator::replying("The document describes hydraulic pumps."),
            FakeWeather::reporting(london_fact()),
        )
    }

    async fn seed(index: &CountingIndex, texts: &[&str]) {
        let embedder = CharacterNgramEmbedder::default();
        let chunks = texts
            .iter()
            .enumerate()
            .map(|(position, text)| EmbeddedChunk {
                chunk: DocumentChunk {
                    id: position as u64,
                    text: text.to_string(),
                    source_name: "doc1".to_string(),
                    chunk_index: position as u64,
                    start_offset: 0,
                },
                vector: embedder.embed_one(text),
            })
            .collect();
        index.upsert("doc1", chunks).await.unwrap();
    }

    #[tokio::test]
    async fn rag_route_walks_every_stage() {
        let fixture = fixture();
        seed(&fixture.index, &["Hydraulic pumps move fluid.", "Valves regulate flow."]).await;

        let state = fixture.pipeline.run("What is this document about?").await;

        assert!(state.is_done());
        assert_eq!(state.route, Some(RouteLabel::Rag));
        assert_eq!(
            state.history(),
            &[Stage::Start, Stage::Routed, Stage::Retrieving, Stage::Answering, Stage::Done]
        );
        assert_eq!(state.retrieved_chunks.len(), 2);
        assert_eq!(
            state.answer.as_deref(),
            Some("The document describes hydraulic pumps.")
        );
        assert_eq!(fixture.weather.call_count(), 0);

        let prompts = fixture.generator.prompts.lock().unwrap();
        assert!(prompts[0].contains("Hydraulic pumps move fluid."));
        assert!(prompts[0].contains("Question: What is this document about?"));
    }

    #[tokio::test]
    async fn weather_route_skips_index_and_generator() {
        let fixture = fixture();
        seed(&fixture.index, &["unrelated text"]).await;

        let state = fixture.pipeline.run("What's the weather in London?").await;

        assert!(state.is_done());
        assert_eq!(state.route, Some(RouteLabel::Weather));
        assert_eq!(
            state.history(),
            &[Stage::Start, Stage::Routed, Stage::Answering, Stage::Done]
        );
        assert_eq!(fixture.weather.call_count(), 1);
        assert_eq!(fixture.index.search_count(), 0);
        assert_eq!(fixture.generator.call_count(), 0);
        assert!(state.answer.unwrap().contains("14.2°C"));
        assert_eq!(
            fixture.weather.locations.lock().unwrap()[0],
            crate::models::WeatherLocation::City("London".to_string())
        );
    }

    #[tokio::test]
    async fn empty_index_answers_without_generation() {
        let fixture = fixture();
        let state = fixture.pipeline.run("Summarize the main points").await;

        assert!(state.is_done());
        assert!(state.retrieved_chunks.is_empty());
        assert_eq!(state.answer.as_deref(), Some(NO_CONTEXT_ANSWER));
        assert_eq!(fixture.generator.call_count(), 0);
    }

    #[tokio::test]
    async fn embedding_failure_fails_the_run() {
        let fixture = fixture_with(
            Arc::new(BrokenEmbedder),
            FakeGenerator::replying("unused"),
            FakeWeather::reporting(london_fact()),
        );
        let state = fixture.pipeline.run("What are the key findings?").await;

        assert_eq!(state.stage(), Stage::Failed);
        assert_eq!(state.history(), &[Stage::Start, Stage::Routed, Stage::Failed]);
        assert!(matches!(state.error, Some(PipelineError::Embedding(_))));
        assert!(state.answer.is_none());
    }

    #[tokio::test]
    async fn generation_failure_fails_the_run() {
        let fixture = fixture_with(
            Arc::new(CharacterNgramEmbedder::default()),
            FakeGenerator::failing(GenerationError::TimedOut { timeout_ms: 10 }),
            FakeWeather::reporting(london_fact()),
        );
        seed(&fixture.index, &["Some context."]).await;

        let state = fixture.pipeline.run("Tell me about the methodology").await;

        assert_eq!(state.stage(), Stage::Failed);
        assert_eq!(
            state.error,
            Some(PipelineError::Generation(GenerationError::TimedOut { timeout_ms: 10 }))
        );
        assert!(state.answer.is_none());
    }

    #[tokio::test]
    async fn lookup_failures_fail_the_run() {
        let fixture = fixture_with(
            Arc::new(CharacterNgramEmbedder::default()),
            FakeGenerator::replying("unused"),
            FakeWeather::failing(LookupError::NotFound("Atlantis".to_string())),
        );

        let state = fixture.pipeline.run("weather in Atlantis").await;
        assert_eq!(state.stage(), Stage::Failed);
        assert!(matches!(
            state.error,
            Some(PipelineError::Lookup(LookupError::NotFound(_)))
        ));

        let state = fixture.pipeline.run("what's the forecast").await;
        assert_eq!(
            state.error,
            Some(PipelineError::Lookup(LookupError::MissingLocation))
        );
        assert_eq!(fixture.weather.call_count(), 1);
    }

    fn hanging_pipeline(index: Arc<CountingIndex>) -> Pipeline {
        Pipeline::new(
            index,
            Arc::new(EmbedderAdapter::new(
                Arc::new(CharacterNgramEmbedder::default()),
                8,
                Duration::from_secs(1),
            )),
            Arc::new(Hanging),
            Arc::new(Hanging),
            LocationExtractor::new().unwrap(),
            4,
            GenerationOptions {
                timeout_ms: 50,
                ..GenerationOptions::default()
            },
            Duration::from_millis(50),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn slow_generation_times_out() {
        let index = Arc::new(CountingIndex::default());
        seed(&index, &["Some context."]).await;
        let pipeline = hanging_pipeline(index);

        let state = pipeline.run("Tell me about the methodology").await;

        assert_eq!(state.stage(), Stage::Failed);
        assert_eq!(
            state.error,
            Some(PipelineError::Generation(GenerationError::TimedOut { timeout_ms: 50 }))
        );
        assert!(state.answer.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn slow_weather_lookup_times_out() {
        let pipeline = hanging_pipeline(Arc::new(CountingIndex::default()));

        let state = pipeline.run("What's the weather in London?").await;

        assert_eq!(state.stage(), Stage::Failed);
        assert_eq!(
            state.error,
            Some(PipelineError::Lookup(LookupError::TimedOut { timeout_ms: 50 }))
        );
        assert_eq!(state.history(), &[Stage::Start, Stage::Routed, Stage::Failed]);
    }

    #[tokio::test]
    async fn terminal_states_do_not_move() {
        let fixture = fixture();
        let mut state = fixture.pipeline.run("weather in London").await;
        let before = state.history().len();
        fixture.pipeline.step(&mut state).await;
        assert_eq!(state.history().len(), before);
        assert!(state.is_done());
    }
}
