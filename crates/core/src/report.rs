use crate::models::{EvaluationRecord, RouteLabel};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FailedQuery {
    pub query: String,
    pub route: Option<RouteLabel>,
    pub error: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RouteSummary {
    pub count: usize,
    pub avg_score: f64,
    pub min_score: f64,
    pub max_score: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OverallSummary {
    pub total_queries: usize,
    pub scored_queries: usize,
    pub failed_queries: usize,
    pub avg_score: Option<f64>,
    pub min_score: Option<f64>,
    pub max_score: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EvaluationReport {
    pub report_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub records: Vec<EvaluationRecord>,
    pub failures: Vec<FailedQuery>,
    pub route_summaries: BTreeMap<RouteLabel, RouteSummary>,
    pub metric_averages: BTreeMap<String, f64>,
    pub overall: OverallSummary,
}

impl EvaluationReport {
    pub fn build(records: Vec<EvaluationRecord>, failures: Vec<FailedQuery>) -> Self {
        let mut by_route: BTreeMap<RouteLabel, Vec<f64>> = BTreeMap::new();
        for record in &records {
            by_route
                .entry(record.route)
                .or_default()
                .push(record.overall_score);
        }
        let route_summaries = by_route
            .into_iter()
            .filter_map(|(route, scores)| summarize(&scores).map(|summary| (route, summary)))
            .collect();

        let mut per_metric: BTreeMap<String, (f64, usize)> = BTreeMap::new();
        for (name, value) in records.iter().flat_map(|record| record.metrics.iter()) {
            let entry = per_metric.entry(name.clone()).or_insert((0.0, 0));
            entry.0 += value;
            entry.1 += 1;
        }
        let metric_averages = per_metric
            .into_iter()
            .map(|(name, (sum, count))| (name, sum / count as f64))
            .collect();

        let scores: Vec<f64> = records.iter().map(|record| record.overall_score).collect();
        let summary = summarize(&scores);
        let overall = OverallSummary {
            total_queries: records.len() + failures.len(),
            scored_queries: records.len(),
            failed_queries: failures.len(),
            avg_score: summary.as_ref().map(|s| s.avg_score),
            min_score: summary.as_ref().map(|s| s.min_score),
            max_score: summary.as_ref().map(|s| s.max_score),
        };

        Self {
            report_id: Uuid::new_v4(),
            generated_at: Utc::now(),
            records,
            failures,
            route_summaries,
            metric_averages,
            overall,
        }
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

fn summarize(scores: &[f64]) -> Option<RouteSummary> {
    if scores.is_empty() {
        return None;
    }
    Some(RouteSummary {
        count: scores.len(),
        avg_score: scores.iter().sum::<f64>() / scores.len() as f64,
        min_score: scores.iter().copied().fold(f64::INFINITY, f64::min),
        max_score: scores.iter().copied().fold(f64::NEG_INFINITY, f64::max),
    })
}
