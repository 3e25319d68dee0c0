//! Experiment driver: scenarios × replications × models, strictly sequential.

use std::sync::Arc;
use std::time::Instant;

use tracing::{info, warn};

use crate::client::{ChatClient, HttpChatClient};
use crate::config::{ExperimentConfig, ModelSpec, Params, Scenario};
use crate::error::HarnessResult;
use crate::model::{round_millis, CallOutcome, ResultRecord, ERROR_FINISH_REASON};
use crate::payload::build_payload;
use crate::prompt::{FilePromptSource, PromptSource, RenderedPrompt, Variables};
use crate::report::progress::{ProgressEvent, ProgressSink};
use crate::scoring::is_correct;
use crate::throttle::{limiter_for, RateLimiter};

pub struct Runner {
    pub client: Arc<dyn ChatClient>,
    pub prompts: Arc<dyn PromptSource>,
    pub limiter: Arc<dyn RateLimiter>,
}

impl Runner {
    pub fn new(
        client: Arc<dyn ChatClient>,
        prompts: Arc<dyn PromptSource>,
        limiter: Arc<dyn RateLimiter>,
    ) -> Self {
        Self {
            client,
            prompts,
            limiter,
        }
    }

    /// HTTP client, prompt files relative to the working directory, and the
    /// configured limiter. Fails if the API credential is missing.
    pub fn from_config(cfg: &ExperimentConfig) -> HarnessResult<Self> {
        let client = HttpChatClient::from_config(cfg)?;
        Ok(Self::new(
            Arc::new(client),
            Arc::new(FilePromptSource::new()),
            limiter_for(cfg),
        ))
    }

    pub async fn preflight(&self, cfg: &ExperimentConfig) -> HarnessResult<()> {
        preflight(self.prompts.as_ref(), cfg).await
    }

    /// Run the whole grid. Per-call failures end up in their record; only
    /// setup errors (prompt rendering) are returned as `Err`.
    pub async fn run_experiment(
        &self,
        cfg: &ExperimentConfig,
        progress: Option<ProgressSink>,
    ) -> HarnessResult<Vec<ResultRecord>> {
        self.preflight(cfg).await?;

        let total = cfg.total_calls();
        let mut records = Vec::with_capacity(total);
        // Always empty; prompts cannot vary per model.
        let vars = Variables::new();

        for (index, scenario) in cfg.scenarios.iter().enumerate() {
            info!(scenario_id = %scenario.id, index = index, "running scenario");
            emit(
                &progress,
                ProgressEvent::ScenarioStarted {
                    index,
                    total: cfg.scenarios.len(),
                    scenario_id: scenario.id.clone(),
                },
            );

            for rep in 0..cfg.replications {
                let rendered = self.prompts.render(scenario, &vars).await?;

                for model in &cfg.models {
                    let record = self.run_call(cfg, scenario, rep, model, &rendered).await;
                    let failed = record.is_error();
                    records.push(record);
                    emit(
                        &progress,
                        ProgressEvent::CallFinished {
                            done: records.len(),
                            total,
                            scenario_id: scenario.id.clone(),
                            rep,
                            model: model.name.clone(),
                            failed,
                        },
                    );
                }
            }
        }

        Ok(records)
    }

    async fn run_call(
        &self,
        cfg: &ExperimentConfig,
        scenario: &Scenario,
        rep: u32,
        model: &ModelSpec,
        rendered: &RenderedPrompt,
    ) -> ResultRecord {
        let params = cfg.effective_params(model);
        let request = build_payload(&model.name, &rendered.system, &rendered.user, &params);

        self.limiter.acquire().await;
        let started = Instant::now();
        let outcome = CallOutcome::from(self.client.chat_completions(&request).await);
        let latency_s = started.elapsed().as_secs_f64();

        if let CallOutcome::Failed { kind, message } = &outcome {
            warn!(
                scenario_id = %scenario.id,
                model = %model.name,
                rep = rep + 1,
                kind = %kind,
                error = %message,
                "request failed"
            );
        }

        build_record(scenario, rep, model, &params, rendered, outcome, latency_s)
    }
}

/// Render every scenario once so unreadable templates fail before any API
/// call. Needs no credential.
pub async fn preflight(prompts: &dyn PromptSource, cfg: &ExperimentConfig) -> HarnessResult<()> {
    let vars = Variables::new();
    for scenario in &cfg.scenarios {
        prompts.render(scenario, &vars).await?;
    }
    Ok(())
}

fn emit(progress: &Option<ProgressSink>, ev: ProgressEvent) {
    if let Some(sink) = progress {
        sink(&ev);
    }
}

fn build_record(
    scenario: &Scenario,
    rep: u32,
    model: &ModelSpec,
    params: &Params,
    rendered: &RenderedPrompt,
    outcome: CallOutcome,
    latency_s: f64,
) -> ResultRecord {
    let expected = rendered
        .expected_answer
        .as_deref()
        .map(|e| e.trim().to_string());
    let correct = is_correct(expected.as_deref(), outcome.content());

    let (response, finish_reason, usage, error, error_kind) = match outcome {
        CallOutcome::Completed {
            content,
            finish_reason,
            usage,
        } => (content, finish_reason, usage, None, None),
        CallOutcome::Failed { kind, message } => (
            String::new(),
            ERROR_FINISH_REASON.to_string(),
            Default::default(),
            Some(message),
            Some(kind),
        ),
    };

    ResultRecord {
        scenario_id: scenario.id.clone(),
        rep,
        model: model.name.clone(),
        provider: model.provider.clone(),
        temperature: params.get("temperature").and_then(|v| v.as_f64()),
        max_tokens: params.get("max_tokens").and_then(|v| v.as_u64()),
        top_p: params.get("top_p").and_then(|v| v.as_f64()),
        seed: params.get("seed").and_then(|v| v.as_i64()),
        latency_s: round_millis(latency_s),
        finish_reason,
        prompt_system: rendered.system.clone(),
        prompt_user: rendered.user.clone(),
        expected_answer: expected,
        response,
        is_correct: correct,
        usage_prompt_tokens: usage.prompt_tokens,
        usage_completion_tokens: usage.completion_tokens,
        usage_total_tokens: usage.total_tokens,
        error,
        error_kind,
    }
}
