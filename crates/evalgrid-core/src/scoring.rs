//! Literal-match scoring and per-model aggregation.

use serde::{Deserialize, Serialize};

use crate::model::ResultRecord;

/// Exact match after trimming surrounding whitespace. No expected answer
/// means the call cannot be correct.
pub fn is_correct(expected: Option<&str>, response: &str) -> bool {
    match expected {
        Some(expected) => expected.trim() == response.trim(),
        None => false,
    }
}

/// Aggregate over every record of one model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSummary {
    pub model: String,
    pub provider: String,
    pub calls: usize,
    /// Calls whose prompt carried an expected answer.
    pub scored: usize,
    pub correct: usize,
    pub errors: usize,
    pub mean_latency_s: f64,
    pub total_tokens: u64,
}

impl ModelSummary {
    /// `correct / scored`, or `None` when nothing was scored.
    pub fn accuracy(&self) -> Option<f64> {
        (self.scored > 0).then(|| self.correct as f64 / self.scored as f64)
    }
}

/// Per-model summaries in first-seen order.
pub fn summarize(records: &[ResultRecord]) -> Vec<ModelSummary> {
    let mut out: Vec<ModelSummary> = Vec::new();
    let mut latency_sums: Vec<f64> = Vec::new();

    for r in records {
        let idx = match out.iter().position(|s| s.model == r.model) {
            Some(i) => i,
            None => {
                out.push(ModelSummary {
                    model: r.model.clone(),
                    provider: r.provider.clone(),
                    calls: 0,
                    scored: 0,
                    correct: 0,
                    errors: 0,
                    mean_latency_s: 0.0,
                    total_tokens: 0,
                });
                latency_sums.push(0.0);
                out.len() - 1
            }
        };
        let s = &mut out[idx];
        s.calls += 1;
        if r.expected_answer.is_some() {
            s.scored += 1;
        }
        if r.is_correct {
            s.correct += 1;
        }
        if r.is_error() {
            s.errors += 1;
        }
        s.total_tokens += r.usage_total_tokens.unwrap_or(0);
        latency_sums[idx] += r.latency_s;
    }

    for (s, sum) in out.iter_mut().zip(latency_sums) {
        s.mean_latency_s = crate::model::round_millis(sum / s.calls as f64);
    }
    out
}
