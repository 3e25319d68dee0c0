//! Core of evalgrid: run a grid of chat-completion calls over
//! scenarios × replications × models against an OpenAI-compatible endpoint,
//! score each answer literally, and persist one record per call.
//!
//! The flow is [`config::load_config`] → [`engine::Runner::run_experiment`] →
//! [`report::save_outputs`].

pub mod client;
pub mod config;
pub mod engine;
pub mod error;
pub mod model;
pub mod payload;
pub mod prompt;
pub mod report;
pub mod retry;
pub mod scoring;
pub mod throttle;

pub use client::{ApiKey, ChatClient, Completion, HttpChatClient};
pub use config::{load_config, ExperimentConfig, ModelSpec, Scenario};
pub use engine::Runner;
pub use error::{CallError, CallErrorKind, HarnessError, HarnessResult};
pub use model::ResultRecord;
pub use report::save_outputs;
pub use retry::RetryPolicy;
