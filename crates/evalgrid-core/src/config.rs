//! Experiment configuration: YAML document → typed, validated structs.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{HarnessError, HarnessResult};

/// Generation parameters and operational knobs, keyed by name.
pub type Params = BTreeMap<String, serde_json::Value>;

pub const DEFAULT_TIMEOUT_S: f64 = 60.0;
pub const DEFAULT_REQUEST_DELAY_S: f64 = 1.0;

/// Top-level experiment document. Loaded once, never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentConfig {
    /// OpenAI-compatible API root, e.g. `https://api.groq.com/openai/v1`.
    pub base_url: String,

    /// Name of the env var holding the bearer credential.
    pub api_key_env: String,

    pub models: Vec<ModelSpec>,

    /// Shared generation parameters plus `timeout_s` / `request_delay_s`.
    #[serde(default, deserialize_with = "null_as_default")]
    pub defaults: Params,

    #[serde(default = "default_replications")]
    pub replications: u32,

    pub scenarios: Vec<Scenario>,

    /// Pacing strategy. Absent means a fixed `request_delay_s` delay.
    #[serde(default)]
    pub throttle: Option<ThrottleConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSpec {
    /// Wire model identifier.
    pub name: String,

    /// Informational only.
    pub provider: String,

    /// Overrides for `defaults`; model-level keys win.
    #[serde(default, deserialize_with = "null_as_default")]
    pub model_params: Params,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scenario {
    pub id: String,

    /// Path to the system prompt text. Empty means no system message.
    #[serde(default, deserialize_with = "null_as_default")]
    pub system_prompt: String,

    /// Path to the user prompt template.
    pub user_prompt_template: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum ThrottleConfig {
    /// Fixed pause between consecutive calls.
    Fixed {
        #[serde(default)]
        delay_s: Option<f64>,
    },
    /// Burst of `capacity` calls, then `refill_per_s` calls per second.
    TokenBucket { capacity: u32, refill_per_s: f64 },
    /// No pacing.
    None,
}

fn default_replications() -> u32 {
    1
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Read, parse and validate a config file.
pub fn load_config(path: &Path) -> HarnessResult<ExperimentConfig> {
    let text = std::fs::read_to_string(path).map_err(|source| HarnessError::ConfigRead {
        path: path.to_path_buf(),
        source,
    })?;
    let cfg = parse_config(&text, path)?;
    cfg.validate()?;
    tracing::debug!(
        path = %path.display(),
        models = cfg.models.len(),
        scenarios = cfg.scenarios.len(),
        replications = cfg.replications,
        "loaded experiment config"
    );
    Ok(cfg)
}

/// Parse YAML text. `origin` is only used in error messages.
pub fn parse_config(text: &str, origin: &Path) -> HarnessResult<ExperimentConfig> {
    serde_yaml::from_str(text).map_err(|e| HarnessError::ConfigParse {
        path: origin.to_path_buf(),
        message: e.to_string(),
    })
}

impl ExperimentConfig {
    pub fn validate(&self) -> HarnessResult<()> {
        if self.base_url.trim().is_empty() {
            return Err(invalid("base_url must not be empty"));
        }
        if self.api_key_env.trim().is_empty() {
            return Err(invalid("api_key_env must not be empty"));
        }
        if self.replications == 0 {
            return Err(invalid("replications must be >= 1"));
        }
        for (i, m) in self.models.iter().enumerate() {
            if m.name.trim().is_empty() {
                return Err(invalid(format!("models[{}].name must not be empty", i)));
            }
        }

        if let Some(t) = knob_seconds(&self.defaults, "timeout_s")? {
            if t <= 0.0 {
                return Err(invalid("defaults.timeout_s must be > 0"));
            }
            seconds_to_duration(t, "defaults.timeout_s")?;
        }
        if let Some(d) = knob_seconds(&self.defaults, "request_delay_s")? {
            seconds_to_duration(d.max(0.0), "defaults.request_delay_s")?;
        }

        match &self.throttle {
            Some(ThrottleConfig::TokenBucket {
                capacity,
                refill_per_s,
            }) => {
                if *capacity == 0 {
                    return Err(invalid("throttle.capacity must be >= 1"));
                }
                if !(*refill_per_s > 0.0 && refill_per_s.is_finite()) {
                    return Err(invalid("throttle.refill_per_s must be > 0"));
                }
                // an empty bucket waits up to one full refill interval
                seconds_to_duration(1.0 / refill_per_s, "throttle.refill_per_s interval")?;
            }
            Some(ThrottleConfig::Fixed { delay_s: Some(d) }) => {
                if !d.is_finite() {
                    return Err(invalid("throttle.delay_s must be a finite number"));
                }
                seconds_to_duration(d.max(0.0), "throttle.delay_s")?;
            }
            _ => {}
        }

        Ok(())
    }

    /// Whole-request timeout for the HTTP client.
    pub fn timeout(&self) -> Duration {
        let secs = knob_seconds(&self.defaults, "timeout_s")
            .ok()
            .flatten()
            .unwrap_or(DEFAULT_TIMEOUT_S);
        Duration::try_from_secs_f64(secs.max(0.0))
            .unwrap_or(Duration::from_secs_f64(DEFAULT_TIMEOUT_S))
    }

    /// Delay between calls for the fixed strategy. Non-positive values mean none.
    pub fn request_delay(&self) -> Duration {
        let secs = match &self.throttle {
            Some(ThrottleConfig::Fixed { delay_s: Some(d) }) => *d,
            _ => knob_seconds(&self.defaults, "request_delay_s")
                .ok()
                .flatten()
                .unwrap_or(DEFAULT_REQUEST_DELAY_S),
        };
        Duration::try_from_secs_f64(secs.max(0.0)).unwrap_or(Duration::ZERO)
    }

    /// `defaults` overlaid with the model's own params.
    pub fn effective_params(&self, model: &ModelSpec) -> Params {
        let mut merged = self.defaults.clone();
        merged.extend(
            model
                .model_params
                .iter()
                .map(|(k, v)| (k.clone(), v.clone())),
        );
        merged
    }

    /// Number of API calls a full run makes.
    pub fn total_calls(&self) -> usize {
        self.scenarios.len() * self.replications as usize * self.models.len()
    }
}

fn invalid(message: impl Into<String>) -> HarnessError {
    HarnessError::ConfigInvalid {
        message: message.into(),
    }
}

/// Seconds that must fit in a [`Duration`]; anything larger is a config error.
fn seconds_to_duration(secs: f64, field: &str) -> HarnessResult<Duration> {
    Duration::try_from_secs_f64(secs)
        .map_err(|_| invalid(format!("{} is out of range: {} seconds", field, secs)))
}

fn knob_seconds(params: &Params, key: &str) -> HarnessResult<Option<f64>> {
    match params.get(key) {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(v) => v
            .as_f64()
            .filter(|f| f.is_finite())
            .map(Some)
            .ok_or_else(|| invalid(format!("defaults.{} must be a number, got {}", key, v))),
    }
}
