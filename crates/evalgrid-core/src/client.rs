//! OpenAI-compatible chat-completion client.
//!
//! This is the only place that knows about HTTP status codes. Callers see a
//! typed [`Completion`] or a [`CallError`] with a normalized kind.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, USER_AGENT};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{CallError, HarnessError, HarnessResult};
use crate::payload::ChatRequest;
use crate::retry::RetryPolicy;

const USER_AGENT_VALUE: &str = concat!("evalgrid/", env!("CARGO_PKG_VERSION"));

/// Token counters reported by the provider. Any of them may be missing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub prompt_tokens: Option<u64>,
    #[serde(default)]
    pub completion_tokens: Option<u64>,
    #[serde(default)]
    pub total_tokens: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChoiceMessage {
    #[serde(default)]
    pub role: Option<String>,
    /// `null` content (e.g. refusals) is legitimately empty, not malformed.
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Choice {
    #[serde(default)]
    pub message: Option<ChoiceMessage>,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// Response envelope of `POST /chat/completions`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    pub choices: Vec<Choice>,
    #[serde(default)]
    pub usage: Option<Usage>,
}

/// The parts of a response the harness records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub content: String,
    pub finish_reason: String,
    pub usage: Usage,
}

impl ChatResponse {
    /// Extract the first choice. A response without a first choice or
    /// without its message object is malformed.
    pub fn into_completion(self) -> Result<Completion, CallError> {
        let choice = self
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| CallError::malformed("response contains no choices"))?;
        let message = choice
            .message
            .ok_or_else(|| CallError::malformed("first choice has no message"))?;
        Ok(Completion {
            content: message.content.unwrap_or_default(),
            finish_reason: choice.finish_reason.unwrap_or_default(),
            usage: self.usage.unwrap_or_default(),
        })
    }
}

/// One logical chat-completion call, retries included.
#[async_trait]
pub trait ChatClient: Send + Sync {
    async fn chat_completions(&self, request: &ChatRequest) -> Result<Completion, CallError>;
}

/// Bearer credential. Debug output never shows the secret.
#[derive(Clone)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Read the key from `var`. Unset or empty is fatal.
    pub fn from_env(var: &str) -> HarnessResult<Self> {
        match std::env::var(var) {
            Ok(key) if !key.trim().is_empty() => Ok(Self(key)),
            _ => Err(HarnessError::MissingCredential {
                var: var.to_string(),
            }),
        }
    }

    fn bearer(&self) -> String {
        format!("Bearer {}", self.0)
    }
}

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ApiKey(***)")
    }
}

/// reqwest-backed client with a fresh retry budget per call.
#[derive(Debug, Clone)]
pub struct HttpChatClient {
    client: reqwest::Client,
    endpoint: String,
    api_key: ApiKey,
    retry: RetryPolicy,
}

impl HttpChatClient {
    pub fn new(base_url: &str, api_key: ApiKey, timeout: Duration) -> HarnessResult<Self> {
        let mut default_headers = HeaderMap::new();
        default_headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE));

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .default_headers(default_headers)
            .build()
            .map_err(|e| HarnessError::HttpClient {
                message: e.to_string(),
            })?;

        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            api_key,
            retry: RetryPolicy::default(),
        })
    }

    /// Build from the experiment config; fails if the credential is missing.
    pub fn from_config(cfg: &crate::config::ExperimentConfig) -> HarnessResult<Self> {
        let key = ApiKey::from_env(&cfg.api_key_env)?;
        Self::new(&cfg.base_url, key, cfg.timeout())
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn post_once(&self, request: &ChatRequest) -> Result<ChatResponse, CallError> {
        let response = self
            .client
            .post(&self.endpoint)
            .header(AUTHORIZATION, self.api_key.bearer())
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(Duration::from_secs);
            let body = response.text().await.unwrap_or_default();
            return Err(CallError::from_status(status.as_u16(), &body, retry_after));
        }

        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes)
            .map_err(|e| CallError::malformed(format!("invalid chat completion body: {}", e)))
    }
}

#[async_trait]
impl ChatClient for HttpChatClient {
    async fn chat_completions(&self, request: &ChatRequest) -> Result<Completion, CallError> {
        debug!(endpoint = %self.endpoint, model = %request.model, "sending chat completion");
        self.retry
            .run(|_| async move { self.post_once(request).await?.into_completion() })
            .await
    }
}
