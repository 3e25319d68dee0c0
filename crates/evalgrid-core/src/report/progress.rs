//! Progress events emitted by the runner. Cosmetic only; the console layer
//! consumes them through a sink.

use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    /// A scenario's first replication is about to be rendered.
    ScenarioStarted {
        index: usize,
        total: usize,
        scenario_id: String,
    },
    /// One call finished, successfully or not.
    CallFinished {
        done: usize,
        total: usize,
        scenario_id: String,
        rep: u32,
        model: String,
        failed: bool,
    },
}

pub type ProgressSink = Arc<dyn Fn(&ProgressEvent) + Send + Sync>;
