//! Error types for the harness.
//!
//! Two layers: [`HarnessError`] is fatal and aborts a run before (or instead
//! of) producing records; [`CallError`] belongs to a single API call and is
//! captured into that call's record.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Fatal setup errors. None of these are retried.
#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    /// Config file could not be read.
    #[error("failed to read config {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Config file is not valid YAML or is missing required keys.
    #[error("failed to parse config {path}: {message}")]
    ConfigParse { path: PathBuf, message: String },

    /// Config parsed but holds values the harness cannot run with.
    #[error("invalid config: {message}")]
    ConfigInvalid { message: String },

    /// API credential env var is unset or empty.
    #[error("missing API key in env var {var}")]
    MissingCredential { var: String },

    /// Prompt or template file could not be read.
    #[error("failed to read prompt file {path}: {source}")]
    PromptRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Template references a variable that was not provided.
    #[error("template {path} references undefined variable '{name}'")]
    UndefinedVariable { path: PathBuf, name: String },

    /// HTTP client could not be constructed.
    #[error("failed to create HTTP client: {message}")]
    HttpClient { message: String },

    /// Output directory or files could not be written.
    #[error("failed to write output {path}: {message}")]
    Output { path: PathBuf, message: String },
}

impl HarnessError {
    pub(crate) fn output(path: impl Into<PathBuf>, err: impl std::fmt::Display) -> Self {
        Self::Output {
            path: path.into(),
            message: err.to_string(),
        }
    }
}

/// Result type for fatal operations.
pub type HarnessResult<T> = Result<T, HarnessError>;

/// Normalized kind of a per-call failure, independent of the HTTP library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallErrorKind {
    /// Connection refused, reset, DNS failure, body read failure.
    Network,
    /// Request exceeded the configured timeout.
    Timeout,
    /// 429 from the provider.
    RateLimited,
    /// Any other non-2xx status.
    Status,
    /// 2xx response whose body is not a usable chat-completion envelope.
    MalformedResponse,
}

impl CallErrorKind {
    /// Whether a call failing with this kind may be attempted again.
    pub fn is_retryable(self) -> bool {
        !matches!(self, Self::MalformedResponse)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::Timeout => "timeout",
            Self::RateLimited => "rate_limited",
            Self::Status => "status",
            Self::MalformedResponse => "malformed_response",
        }
    }
}

impl std::fmt::Display for CallErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure of one chat-completion call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct CallError {
    pub kind: CallErrorKind,
    pub message: String,
    pub status: Option<u16>,
    /// Server-provided `Retry-After`, when present on a 429.
    pub retry_after: Option<Duration>,
}

impl CallError {
    pub fn new(kind: CallErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status: None,
            retry_after: None,
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(CallErrorKind::Network, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(CallErrorKind::Timeout, message)
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::new(CallErrorKind::MalformedResponse, message)
    }

    /// Map a non-2xx status into the matching kind.
    pub fn from_status(status: u16, body: &str, retry_after: Option<Duration>) -> Self {
        let kind = if status == 429 {
            CallErrorKind::RateLimited
        } else {
            CallErrorKind::Status
        };
        let body = body.trim();
        let message = if body.is_empty() {
            format!("HTTP {}", status)
        } else {
            format!("HTTP {}: {}", status, body)
        };
        Self {
            kind,
            message,
            status: Some(status),
            retry_after,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }
}

impl From<reqwest::Error> for CallError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::timeout(format!("request timed out: {}", err))
        } else if err.is_decode() {
            Self::malformed(format!("invalid response body: {}", err))
        } else if let Some(status) = err.status() {
            Self::from_status(status.as_u16(), "", None)
        } else {
            Self::network(err.to_string())
        }
    }
}
