//! Condensed one-row-per-call CSV.

use std::path::Path;

use serde::Serialize;

use crate::error::{HarnessError, HarnessResult};
use crate::model::ResultRecord;

/// Responses longer than this are cut in the preview column.
pub const PREVIEW_CHARS: usize = 120;

const COLUMNS: [&str; 8] = [
    "scenario_id",
    "rep",
    "model",
    "latency_s",
    "is_correct",
    "expected_answer",
    "response_preview",
    "error",
];

#[derive(Debug, Serialize)]
struct SummaryRow<'a> {
    scenario_id: &'a str,
    rep: u32,
    model: &'a str,
    latency_s: f64,
    is_correct: bool,
    expected_answer: Option<&'a str>,
    response_preview: Option<String>,
    error: Option<&'a str>,
}

impl<'a> From<&'a ResultRecord> for SummaryRow<'a> {
    fn from(r: &'a ResultRecord) -> Self {
        Self {
            scenario_id: &r.scenario_id,
            rep: r.rep,
            model: &r.model,
            latency_s: r.latency_s,
            is_correct: r.is_correct,
            expected_answer: r.expected_answer.as_deref(),
            response_preview: response_preview(&r.response),
            error: r.error.as_deref(),
        }
    }
}

/// First [`PREVIEW_CHARS`] characters plus `...` when longer; `None` when empty.
pub fn response_preview(response: &str) -> Option<String> {
    if response.is_empty() {
        return None;
    }
    let mut chars = response.char_indices();
    match chars.nth(PREVIEW_CHARS) {
        Some((cut, _)) => Some(format!("{}...", &response[..cut])),
        None => Some(response.to_string()),
    }
}

/// Header is always written, so an empty run still yields a valid CSV.
pub fn write_summary_csv(path: &Path, records: &[ResultRecord]) -> HarnessResult<()> {
    let mut w = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)
        .map_err(|e| HarnessError::output(path, e))?;
    w.write_record(COLUMNS)
        .map_err(|e| HarnessError::output(path, e))?;
    for r in records {
        w.serialize(SummaryRow::from(r))
            .map_err(|e| HarnessError::output(path, e))?;
    }
    w.flush().map_err(|e| HarnessError::output(path, e))?;
    Ok(())
}
