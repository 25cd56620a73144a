use crate::config::EvaluatorConfig;
use crate::error::{ConfigurationError, GenerationError};
use crate::models::{EvaluationInput, EvaluationRecord, RouteLabel};
use crate::traits::Generator;
use futures::{stream, StreamExt};
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

pub const LENGTH: &str = "length";
pub const RELEVANCE: &str = "relevance";
pub const CLARITY: &str = "clarity";
pub const ACCURACY: &str = "accuracy";
pub const HELPFULNESS: &str = "helpfulness";
pub const COHERENCE: &str = "coherence";

pub const DEFAULT_WEATHER_QUERIES: [&str; 4] = [
    "What's the weather like in London?",
    "Temperature in New York",
    "Is it raining in Tokyo?",
    "Weather forecast for Paris",
];

pub const DEFAULT_RAG_QUERIES: [&str; 4] = [
    "What is this document about?",
    "Summarize the main points",
    "What are the key findings?",
    "Tell me about the methodology",
];

const UNIT_TOKENS: [&str; 7] = ["°c", "°f", "%", "m/s", "hpa", "km/h", "mph"];
const WEATHER_VOCABULARY: [&str; 11] = [
    "temperature", "humidity", "wind", "pressure", "rain", "cloud", "sun", "snow", "clear",
    "weather", "forecast",
];
const STOP_WORDS: [&str; 32] = [
    "the", "is", "at", "which", "on", "an", "as", "are", "was", "were", "for", "to", "of", "in",
    "and", "or", "but", "with", "by", "from", "this", "that", "be", "have", "has", "had", "it",
    "its", "their", "they", "them", "what",
];

#[derive(Debug, Deserialize)]
struct JudgeScores {
    accuracy: f64,
    helpfulness: f64,
    coherence: f64,
}

/// Scores produced answers. Rule metrics are always computed; judge metrics
/// are added only when a judge is configured and its reply parses.
pub struct Evaluator {
    config: EvaluatorConfig,
    judge: Option<Arc<dyn Generator>>,
}

impl Evaluator {
    pub fn new(config: EvaluatorConfig) -> Result<Self, ConfigurationError> {
        config.validate()?;
        Ok(Self {
            config,
            judge: None,
        })
    }

    pub fn with_judge(mut self, judge: Arc<dyn Generator>) -> Self {
        self.judge = Some(judge);
        self
    }

    pub fn config(&self) -> &EvaluatorConfig {
        &self.config
    }

    /// Scores every input concurrently; output order matches input order.
    pub async fn evaluate(&self, inputs: &[EvaluationInput]) -> Vec<EvaluationRecord> {
        stream::iter(inputs)
            .map(|input| self.evaluate_one(input))
            .buffered(self.config.concurrency)
            .collect()
            .await
    }

    pub async fn evaluate_one(&self, input: &EvaluationInput) -> EvaluationRecord {
        let rule = self.rule_metrics(input);
        let judged = self.judge_metrics(input).await;
        let overall_score = self.overall(&rule, judged.as_ref());

        let mut metrics = rule;
        if let Some(judged) = judged {
            metrics.extend(judged);
        }

        EvaluationRecord {
            query: input.query.clone(),
            route: input.route,
            answer: input.answer.clone(),
            latency_ms: input.latency_ms,
            metrics,
            overall_score,
        }
    }

    pub fn rule_metrics(&self, input: &EvaluationInput) -> BTreeMap<String, f64> {
        BTreeMap::from([
            (
                LENGTH.to_string(),
                length_score(word_count(&input.answer), &self.config),
            ),
            (
                RELEVANCE.to_string(),
                relevance_score(input.route, &input.query, &input.answer, &input.context),
            ),
            (CLARITY.to_string(), clarity_score(&input.answer)),
        ])
    }

    async fn judge_metrics(&self, input: &EvaluationInput) -> Option<BTreeMap<String, f64>> {
        if !self.config.use_judge {
            return None;
        }
        let judge = self.judge.as_ref()?;

        let prompt = judge_prompt(input);
        let options = self.config.judge_options;
        let reply = tokio::time::timeout(
            Duration::from_millis(options.timeout_ms),
            judge.generate(&prompt, &options),
        )
        .await
        .unwrap_or(Err(GenerationError::TimedOut {
            timeout_ms: options.timeout_ms,
        }));

        let parsed = reply
            .map_err(|error| error.to_string())
            .and_then(|text| parse_judge_scores(&text));

        match parsed {
            Ok(scores) => Some(scores),
            Err(reason) => {
                warn!(query = %input.query, %reason, "judge metrics omitted");
                None
            }
        }
    }

    fn overall(&self, rule: &BTreeMap<String, f64>, judged: Option<&BTreeMap<String, f64>>) -> f64 {
        let judged_values: Vec<f64> = judged.map(|m| m.values().copied().collect()).unwrap_or_default();

        let weighted_sum = rule.values().sum::<f64>() * self.config.rule_weight
            + judged_values.iter().sum::<f64>() * self.config.judge_weight;
        let total_weight = rule.len() as f64 * self.config.rule_weight
            + judged_values.len() as f64 * self.config.judge_weight;

        if total_weight > 0.0 {
            return (weighted_sum / total_weight).clamp(0.0, 1.0);
        }

        let count = rule.len() + judged_values.len();
        if count == 0 {
            return 0.0;
        }
        (rule.values().sum::<f64>() + judged_values.iter().sum::<f64>()) / count as f64
    }
}

pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Step function over word count: short < optimal band > long.
pub fn length_score(words: usize, config: &EvaluatorConfig) -> f64 {
    if words < config.min_words {
        config.too_short_score
    } else if words <= config.max_words {
        1.0
    } else {
        config.too_long_score
    }
}

pub fn relevance_score(route: RouteLabel, query: &str, answer: &str, context: &[String]) -> f64 {
    let lowered = answer.to_lowercase();

    match route {
        RouteLabel::Weather => {
            let has_number = lowered.chars().any(|c| c.is_ascii_digit());
            let has_unit = UNIT_TOKENS.iter().any(|unit| lowered.contains(unit));
            let has_vocabulary = WEATHER_VOCABULARY.iter().any(|word| lowered.contains(word));
            [has_number, has_unit, has_vocabulary]
                .iter()
                .filter(|present| **present)
                .count() as f64
                / 3.0
        }
        RouteLabel::Rag => {
            let answer_terms = content_terms(answer);
            if answer_terms.is_empty() {
                return 0.0;
            }

            let vocabulary: BTreeSet<String> = if context.iter().any(|text| !text.trim().is_empty()) {
                context.iter().flat_map(|text| content_terms(text)).collect()
            } else {
                content_terms(query)
            };

            let shared = answer_terms.intersection(&vocabulary).count();
            shared as f64 / answer_terms.len() as f64
        }
    }
}

fn content_terms(text: &str) -> BTreeSet<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|token| token.chars().count() > 2 && !STOP_WORDS.contains(token))
        .map(str::to_string)
        .collect()
}

/// Splits on `.`, `!` and `?` when followed by whitespace or the end, so
/// decimals such as `12.5` stay inside one sentence.
pub fn sentences(text: &str) -> Vec<&str> {
    let mut result = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((position, current)) = chars.next() {
        if !matches!(current, '.' | '!' | '?') {
            continue;
        }
        let at_boundary = chars.peek().map_or(true, |(_, next)| next.is_whitespace());
        if at_boundary {
            let end = position + current.len_utf8();
            result.push(text[start..end].trim());
            start = end;
        }
    }
    result.push(text[start..].trim());

    result.into_iter().filter(|sentence| !sentence.is_empty()).collect()
}

pub fn clarity_score(answer: &str) -> f64 {
    let sentences = sentences(answer);
    if sentences.is_empty() {
        return 0.0;
    }

    let lengths: Vec<usize> = sentences.iter().map(|sentence| word_count(sentence)).collect();
    let average = lengths.iter().sum::<usize>() as f64 / lengths.len() as f64;

    let mut score: f64 = if (5.0..=25.0).contains(&average) {
        1.0
    } else if average < 5.0 {
        0.6
    } else {
        0.8
    };

    let rambling = lengths.iter().filter(|length| **length > 40).count();
    if rambling * 3 > lengths.len() {
        score -= 0.2;
    }
    if lengths.len() == 1 {
        score = score.min(0.8);
    }

    score.clamp(0.0, 1.0)
}

pub fn judge_prompt(input: &EvaluationInput) -> String {
    let context = if input.context.is_empty() {
        "(none)".to_string()
    } else {
        input.context.join("\n---\n")
    };

    format!(
        "You are grading an assistant's answer. Score each criterion from 0.0 to 1.0.\n\
         accuracy: the answer is factually consistent with the question and context.\n\
         helpfulness: the answer addresses what the user asked.\n\
         coherence: the answer is well organised and easy to follow.\n\
         Respond with only a JSON object such as \
         {{\"accuracy\": 0.8, \"helpfulness\": 0.7, \"coherence\": 0.9}}.\n\n\
         Route: {}\nQuestion: {}\nContext:\n{}\nAnswer:\n{}",
        input.route, input.query, context, input.answer
    )
}

pub fn parse_judge_scores(reply: &str) -> Result<BTreeMap<String, f64>, String> {
    let start = reply.find('{').ok_or("judge reply has no JSON object")?;
    let end = reply.rfind('}').ok_or("judge reply has no JSON object")?;
    if end < start {
        return Err("judge reply has no JSON object".to_string());
    }

    let scores: JudgeScores =
        serde_json::from_str(&reply[start..=end]).map_err(|error| error.to_string())?;

    let mut metrics = BTreeMap::new();
    for (name, value) in [
        (ACCURACY, scores.accuracy),
        (HELPFULNESS, scores.helpfulness),
        (COHERENCE, scores.coherence),
    ] {
        if !value.is_finite() {
            return Err(format!("{name} is not a finite number"));
        }
        metrics.insert(name.to_string(), value.clamp(0.0, 1.0));
    }
    debug!(?metrics, "judge scores parsed");
    Ok(metrics)
}
