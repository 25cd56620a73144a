use crate::embeddings::DEFAULT_EMBED_BATCH_SIZE;
use crate::error::ConfigurationError;
use crate::models::GenerationOptions;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AssistantConfig {
    pub max_chunk_chars: usize,
    pub top_k: usize,
    pub embed_batch_size: usize,
    /// Upper bound for every embedding and weather call.
    pub call_timeout_ms: u64,
    pub generation: GenerationOptions,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            max_chunk_chars: 800,
            top_k: 4,
            embed_batch_size: DEFAULT_EMBED_BATCH_SIZE,
            call_timeout_ms: 30_000,
            generation: GenerationOptions::default(),
        }
    }
}

impl AssistantConfig {
    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        positive("max_chunk_chars", self.max_chunk_chars as u64)?;
        positive("top_k", self.top_k as u64)?;
        positive("embed_batch_size", self.embed_batch_size as u64)?;
        positive("call_timeout_ms", self.call_timeout_ms)?;
        positive("generation.timeout_ms", self.generation.timeout_ms)?;
        positive("generation.max_tokens", self.generation.max_tokens as u64)?;
        if !(0.0..=2.0).contains(&self.generation.temperature) {
            return Err(ConfigurationError::Invalid {
                key: "generation.temperature".to_string(),
                details: format!("{} is outside 0.0..=2.0", self.generation.temperature),
            });
        }
        Ok(())
    }
}

/// Thresholds and weights for answer scoring.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EvaluatorConfig {
    pub min_words: usize,
    pub max_words: usize,
    pub too_short_score: f64,
    pub too_long_score: f64,
    /// Weight of each rule-based metric in the overall score.
    pub rule_weight: f64,
    /// Weight of each judge-produced metric in the overall score.
    pub judge_weight: f64,
    pub use_judge: bool,
    pub concurrency: usize,
    pub judge_options: GenerationOptions,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            min_words: 10,
            max_words: 500,
            too_short_score: 0.3,
            too_long_score: 0.7,
            rule_weight: 1.0,
            judge_weight: 1.0,
            use_judge: true,
            concurrency: 4,
            judge_options: GenerationOptions {
                temperature: 0.0,
                max_tokens: 128,
                timeout_ms: 30_000,
            },
        }
    }
}

impl EvaluatorConfig {
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.min_words > self.max_words {
            return Err(ConfigurationError::Invalid {
                key: "min_words".to_string(),
                details: format!("{} exceeds max_words {}", self.min_words, self.max_words),
            });
        }
        for (key, value) in [
            ("too_short_score", self.too_short_score),
            ("too_long_score", self.too_long_score),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigurationError::Invalid {
                    key: key.to_string(),
                    details: format!("{value} is outside 0.0..=1.0"),
                });
            }
        }
        for (key, value) in [("rule_weight", self.rule_weight), ("judge_weight", self.judge_weight)] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigurationError::Invalid {
                    key: key.to_string(),
                    details: format!("{value} must be a non-negative number"),
                });
            }
        }
        if self.rule_weight == 0.0 && self.judge_weight == 0.0 {
            return Err(ConfigurationError::Invalid {
                key: "rule_weight".to_string(),
                details: "rule and judge weights cannot both be zero".to_string(),
            });
        }
        positive("concurrency", self.concurrency as u64)
    }
}

fn positive(key: &str, value: u64) -> Result<(), ConfigurationError> {
    if value == 0 {
        return Err(ConfigurationError::Invalid {
            key: key.to_string(),
            details: "must be greater than zero".to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(AssistantConfig::default().validate().is_ok());
        assert!(EvaluatorConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_top_k_is_invalid() {
        let config = AssistantConfig {
            top_k: 0,
            ..AssistantConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigurationError::Invalid { key, .. }) if key == "top_k"
        ));
    }

    #[test]
    fn inverted_word_bounds_are_invalid() {
        let config = EvaluatorConfig {
            min_words: 50,
            max_words: 10,
            ..EvaluatorConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
