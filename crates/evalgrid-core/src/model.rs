use serde::{Deserialize, Serialize};

use crate::client::{Completion, Usage};
use crate::error::{CallError, CallErrorKind};

/// Finish reason recorded for calls that never produced a response.
pub const ERROR_FINISH_REASON: &str = "error";

/// Result of one call, as seen by the runner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallOutcome {
    Completed {
        content: String,
        finish_reason: String,
        usage: Usage,
    },
    Failed {
        kind: CallErrorKind,
        message: String,
    },
}

impl From<Result<Completion, CallError>> for CallOutcome {
    fn from(result: Result<Completion, CallError>) -> Self {
        match result {
            Ok(c) => Self::Completed {
                content: c.content,
                finish_reason: c.finish_reason,
                usage: c.usage,
            },
            Err(e) => Self::Failed {
                kind: e.kind,
                message: e.to_string(),
            },
        }
    }
}

impl CallOutcome {
    /// Response text; empty for failed calls.
    pub fn content(&self) -> &str {
        match self {
            Self::Completed { content, .. } => content,
            Self::Failed { .. } => "",
        }
    }
}

/// One row per (scenario, replication, model).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    pub scenario_id: String,
    pub rep: u32,
    pub model: String,
    pub provider: String,
    pub temperature: Option<f64>,
    pub max_tokens: Option<u64>,
    pub top_p: Option<f64>,
    pub seed: Option<i64>,
    /// Seconds, rounded to milliseconds.
    pub latency_s: f64,
    pub finish_reason: String,
    pub prompt_system: String,
    pub prompt_user: String,
    pub expected_answer: Option<String>,
    pub response: String,
    pub is_correct: bool,
    pub usage_prompt_tokens: Option<u64>,
    pub usage_completion_tokens: Option<u64>,
    pub usage_total_tokens: Option<u64>,
    pub error: Option<String>,
    pub error_kind: Option<CallErrorKind>,
}

impl ResultRecord {
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

pub(crate) fn round_millis(secs: f64) -> f64 {
    (secs * 1000.0).round() / 1000.0
}
