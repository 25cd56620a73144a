use anyhow::Context;
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use omni_answer_core::backends::ollama::{
    DEFAULT_EMBEDDING_MODEL, DEFAULT_GENERATION_MODEL, DEFAULT_OLLAMA_URL,
};
use omni_answer_core::{
    Assistant, AssistantConfig, CharacterNgramEmbedder, Collaborators, DisabledWeather, Embedder,
    EvaluationReport, EvaluatorConfig, Generator, InMemoryVectorIndex, OllamaEmbedder,
    OllamaGenerator, OpenWeatherClient, WeatherLookup, DEFAULT_RAG_QUERIES,
    DEFAULT_WEATHER_QUERIES,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "omni-answer", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[command(flatten)]
    backends: BackendArgs,
}

#[derive(Args)]
struct BackendArgs {
    /// Ollama base URL
    #[arg(long, global = true, env = "OLLAMA_BASE_URL", default_value = DEFAULT_OLLAMA_URL)]
    ollama_url: String,

    /// Ollama model used for answers and judging
    #[arg(long, global = true, env = "OLLAMA_MODEL", default_value = DEFAULT_GENERATION_MODEL)]
    model: String,

    /// Ollama embedding model
    #[arg(long, global = true, env = "OLLAMA_EMBED_MODEL", default_value = DEFAULT_EMBEDDING_MODEL)]
    embedding_model: String,

    /// Embed with the offline trigram embedder instead of Ollama.
    #[arg(long, global = true, default_value_t = false)]
    local_embeddings: bool,

    /// OpenWeather API key; weather questions fail without it.
    #[arg(long, global = true, env = "OPENWEATHER_API_KEY", hide_env_values = true)]
    openweather_api_key: Option<String>,

    /// Chunks retrieved per document question.
    #[arg(long, global = true, default_value = "4")]
    top_k: usize,

    /// Maximum characters per chunk.
    #[arg(long, global = true, default_value = "800")]
    chunk_chars: usize,

    /// Timeout for each backend call, in seconds.
    #[arg(long, global = true, default_value = "30")]
    timeout_secs: u64,
}

#[derive(Subcommand)]
enum Command {
    /// Ingest a document or folder, optionally asking one question against it.
    Ingest {
        /// File or folder; .pdf, .txt and .md files are loaded recursively.
        #[arg(long)]
        path: PathBuf,
        #[arg(long)]
        query: Option<String>,
    },
    /// Answer one question.
    Ask {
        #[arg(long)]
        query: String,
        /// Documents to ingest before answering.
        #[arg(long)]
        corpus: Option<PathBuf>,
    },
    /// Answer and score a batch of questions.
    Eval {
        #[arg(long)]
        corpus: Option<PathBuf>,
        /// Question to evaluate; repeatable.
        #[arg(long = "query")]
        queries: Vec<String>,
        /// Add the built-in weather and document questions.
        #[arg(long, default_value_t = false)]
        defaults: bool,
        /// Skip the LLM judge and score with rules only.
        #[arg(long, default_value_t = false)]
        no_judge: bool,
        /// Write the JSON report here.
        #[arg(long)]
        report: Option<PathBuf>,
    },
}

fn build_assistant(
    args: &BackendArgs,
    use_judge: bool,
) -> anyhow::Result<(Assistant, Arc<InMemoryVectorIndex>)> {
    let timeout = Duration::from_secs(args.timeout_secs);
    let mut config = AssistantConfig {
        max_chunk_chars: args.chunk_chars,
        top_k: args.top_k,
        call_timeout_ms: timeout.as_millis() as u64,
        ..AssistantConfig::default()
    };
    config.generation.timeout_ms = config.call_timeout_ms;

    let generator: Arc<dyn Generator> =
        Arc::new(OllamaGenerator::new(&args.ollama_url, &args.model, timeout)?);

    let embedder: Arc<dyn Embedder> = if args.local_embeddings {
        Arc::new(CharacterNgramEmbedder::default())
    } else {
        Arc::new(OllamaEmbedder::new(
            &args.ollama_url,
            &args.embedding_model,
            timeout,
        )?)
    };

    let weather: Arc<dyn WeatherLookup> = match args.openweather_api_key.as_deref() {
        Some(key) if !key.trim().is_empty() => Arc::new(OpenWeatherClient::new(key, timeout)?),
        _ => {
            warn!("OPENWEATHER_API_KEY is not set; weather questions will fail");
            Arc::new(DisabledWeather)
        }
    };

    let evaluator_config = EvaluatorConfig {
        use_judge,
        ..EvaluatorConfig::default()
    };

    let index = Arc::new(InMemoryVectorIndex::new());
    let assistant = Assistant::new(
        config,
        evaluator_config,
        Collaborators {
            index: index.clone(),
            embedder,
            generator: generator.clone(),
            weather,
            judge: use_judge.then_some(generator),
        },
    )?;
    Ok((assistant, index))
}

async fn ingest_corpus(
    assistant: &Assistant,
    index: &InMemoryVectorIndex,
    path: &Path,
) -> anyhow::Result<()> {
    let outcome = assistant
        .ingest_path(path)
        .await
        .with_context(|| format!("failed to ingest {}", path.display()))?;

    for skipped in &outcome.skipped {
        warn!(path = %skipped.path.display(), reason = %skipped.reason, "skipped document");
    }
    for report in &outcome.reports {
        println!(
            "{} chunks={} dimension={} sha256={}",
            report.source_name, report.chunk_count, report.dimension, report.checksum
        );
    }
    println!(
        "{} documents ingested, {} skipped, {} chunks indexed",
        outcome.reports.len(),
        outcome.skipped.len(),
        assistant.indexed_chunks()
    );
    for (source, chunks) in index.sources() {
        println!("  {source}: {chunks} chunks");
    }
    Ok(())
}

async fn ask(assistant: &Assistant, query: &str) -> anyhow::Result<()> {
    match assistant.answer(query).await {
        Ok(outcome) => {
            println!(
                "route={} chunks={} latency_ms={}",
                outcome.route, outcome.retrieved_chunk_count, outcome.latency_ms
            );
            println!("{}", outcome.answer);
            Ok(())
        }
        Err(failure) => {
            let stages = failure
                .history
                .iter()
                .map(|stage| format!("{stage:?}"))
                .collect::<Vec<_>>()
                .join(" -> ");
            println!("stages: {stages}");
            Err(failure.into())
        }
    }
}

fn print_summary(report: &EvaluationReport) {
    println!("report {} at {}", report.report_id, report.generated_at.to_rfc3339());
    for record in &report.records {
        println!(
            "[{}] overall={:.3} latency_ms={} query={:?}",
            record.route, record.overall_score, record.latency_ms, record.query
        );
        for (metric, score) in &record.metrics {
            println!("    {metric}={score:.3}");
        }
    }
    for failure in &report.failures {
        println!("[failed] query={:?} error={}", failure.query, failure.error);
    }
    for (route, summary) in &report.route_summaries {
        println!(
            "{route}: count={} avg={:.3} min={:.3} max={:.3}",
            summary.count, summary.avg_score, summary.min_score, summary.max_score
        );
    }
    match report.overall.avg_score {
        Some(avg) => println!(
            "overall: {} queries, {} failed, avg={avg:.3}",
            report.overall.total_queries, report.overall.failed_queries
        ),
        None => println!(
            "overall: {} queries, none scored",
            report.overall.total_queries
        ),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_version = env!("CARGO_PKG_VERSION");

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    info!(
        version = app_version,
        started_at = %Utc::now().to_rfc3339(),
        "omni-answer boot"
    );

    match cli.command {
        Command::Ingest { path, query } => {
            let (assistant, index) = build_assistant(&cli.backends, false)?;
            ingest_corpus(&assistant, &index, &path).await?;
            if let Some(query) = query {
                ask(&assistant, &query).await?;
            }
        }
        Command::Ask { query, corpus } => {
            let (assistant, index) = build_assistant(&cli.backends, false)?;
            if let Some(corpus) = corpus {
                ingest_corpus(&assistant, &index, &corpus).await?;
            }
            ask(&assistant, &query).await?;
        }
        Command::Eval {
            corpus,
            mut queries,
            defaults,
            no_judge,
            report,
        } => {
            if defaults || queries.is_empty() {
                queries.extend(
                    DEFAULT_WEATHER_QUERIES
                        .iter()
                        .chain(DEFAULT_RAG_QUERIES.iter())
                        .map(|query| query.to_string()),
                );
            }

            let (assistant, index) = build_assistant(&cli.backends, !no_judge)?;
            if let Some(corpus) = corpus {
                ingest_corpus(&assistant, &index, &corpus).await?;
            }

            let evaluation = assistant.evaluate_batch(&queries).await;
            print_summary(&evaluation);

            if let Some(path) = report {
                let json = evaluation.to_json_pretty()?;
                tokio::fs::write(&path, json)
                    .await
                    .with_context(|| format!("failed to write report to {}", path.display()))?;
                println!("report written to {}", path.display());
            }
        }
    }

    Ok(())
}
