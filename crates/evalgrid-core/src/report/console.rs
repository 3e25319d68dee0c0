use crate::report::progress::{ProgressEvent, ProgressSink};
use crate::scoring::ModelSummary;
use std::sync::Arc;

/// Format a progress event for display. Deterministic, unit-testable.
#[must_use]
pub fn format_progress_line(ev: &ProgressEvent) -> String {
    match ev {
        ProgressEvent::ScenarioStarted {
            index,
            total,
            scenario_id,
        } => format!("Scenario {}/{}: {}", index + 1, total, scenario_id),
        ProgressEvent::CallFinished {
            done,
            total,
            rep,
            model,
            failed,
            ..
        } => {
            let status = if *failed { "error" } else { "ok" };
            format!(
                "  [{}/{}] {} (rep {}) {}",
                done,
                total,
                model,
                rep + 1,
                status
            )
        }
    }
}

/// Write a progress line to stderr.
pub fn emit_progress_line(line: &str) {
    eprintln!("{}", line);
}

/// Progress sink that prints every event to stderr. `None` for empty runs.
pub fn default_progress_sink(total_calls: usize) -> Option<ProgressSink> {
    if total_calls == 0 {
        return None;
    }
    Some(Arc::new(|ev: &ProgressEvent| {
        emit_progress_line(&format_progress_line(ev));
    }))
}

/// Render the per-model table printed after a run.
#[must_use]
pub fn format_model_table(summaries: &[ModelSummary]) -> String {
    let width = summaries
        .iter()
        .map(|s| s.model.len())
        .max()
        .unwrap_or(0)
        .max("model".len());

    let mut out = format!(
        "{:<width$}  {:>5}  {:>8}  {:>6}  {:>9}  {:>8}\n",
        "model", "calls", "accuracy", "errors", "latency_s", "tokens"
    );
    for s in summaries {
        let accuracy = s
            .accuracy()
            .map(|a| format!("{:.2}", a))
            .unwrap_or_else(|| "n/a".into());
        out.push_str(&format!(
            "{:<width$}  {:>5}  {:>8}  {:>6}  {:>9.3}  {:>8}\n",
            s.model, s.calls, accuracy, s.errors, s.mean_latency_s, s.total_tokens
        ));
    }
    out
}

pub fn print_summary(summaries: &[ModelSummary]) {
    if summaries.is_empty() {
        return;
    }
    eprintln!("\n━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    eprint!("{}", format_model_table(summaries));
}
