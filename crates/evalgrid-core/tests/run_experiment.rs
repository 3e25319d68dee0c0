//! End-to-end: YAML config and prompt files on disk, a mocked endpoint,
//! a full run, and the persisted outputs read back.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use evalgrid_core::prompt::FilePromptSource;
use evalgrid_core::report::jsonl::read_jsonl;
use evalgrid_core::report::{RESULTS_FILE, SUMMARY_FILE};
use evalgrid_core::scoring::summarize;
use evalgrid_core::throttle::Unlimited;
use evalgrid_core::{
    load_config, save_outputs, ApiKey, CallErrorKind, HarnessError, HttpChatClient, RetryPolicy,
    Runner,
};
use serde_json::json;
use serial_test::serial;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const KEY_VAR: &str = "EVALGRID_IT_API_KEY";

fn write(dir: &Path, name: &str, text: &str) -> String {
    let p = dir.join(name);
    std::fs::write(&p, text).unwrap();
    p.display().to_string()
}

/// Two scenarios, two models, two replications, no pacing.
fn write_experiment(dir: &Path, base_url: &str) -> std::path::PathBuf {
    let system = write(dir, "system.txt", "Answer with one word.");
    let yes = write(
        dir,
        "yes.txt",
        "Expected Answer: yes\n---\nPrompt:\nIs water wet?",
    );
    let open = write(dir, "open.txt", "Name a color.");

    let yaml = format!(
        r#"
base_url: "{base_url}"
api_key_env: {KEY_VAR}
models:
  - name: good-model
    provider: mock
    model_params:
      temperature: 0.2
  - name: bad-model
    provider: mock
defaults:
  temperature: 0.0
  max_tokens: 8
  timeout_s: 5
  request_delay_s: 0
replications: 2
scenarios:
  - id: wet
    system_prompt: "{system}"
    user_prompt_template: "{yes}"
  - id: color
    user_prompt_template: "{open}"
"#
    );
    let cfg = dir.join("experiment.yaml");
    std::fs::write(&cfg, yaml).unwrap();
    cfg
}

async fn mount_models(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(json!({"model": "good-model"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"role": "assistant", "content": " yes\n"}, "finish_reason": "stop"}],
            "usage": {"prompt_tokens": 10, "completion_tokens": 1, "total_tokens": 11}
        })))
        .mount(server)
        .await;

    // Malformed envelope: not retried, recorded as an error row.
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(json!({"model": "bad-model"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
        .mount(server)
        .await;
}

#[tokio::test]
#[serial]
async fn full_run_persists_every_call() {
    let server = MockServer::start().await;
    mount_models(&server).await;

    let dir = tempfile::tempdir().unwrap();
    let cfg_path = write_experiment(dir.path(), &server.uri());
    std::env::set_var(KEY_VAR, "sk-test");

    let cfg = load_config(&cfg_path).expect("config should load");
    let runner = Runner::from_config(&cfg).expect("runner");
    let records = runner.run_experiment(&cfg, None).await.expect("run");
    std::env::remove_var(KEY_VAR);

    assert_eq!(records.len(), 2 * 2 * 2);
    assert_eq!(server.received_requests().await.unwrap().len(), 8);

    let good_wet: Vec<_> = records
        .iter()
        .filter(|r| r.model == "good-model" && r.scenario_id == "wet")
        .collect();
    assert_eq!(good_wet.len(), 2);
    for r in &good_wet {
        assert!(r.is_correct);
        assert_eq!(r.expected_answer.as_deref(), Some("yes"));
        assert_eq!(r.prompt_user, "Is water wet?");
        assert_eq!(r.prompt_system, "Answer with one word.");
        assert_eq!(r.temperature, Some(0.2));
        assert_eq!(r.max_tokens, Some(8));
        assert_eq!(r.usage_total_tokens, Some(11));
    }

    let color = records
        .iter()
        .find(|r| r.model == "good-model" && r.scenario_id == "color")
        .unwrap();
    assert_eq!(color.expected_answer, None);
    assert!(!color.is_correct);
    assert_eq!(color.prompt_system, "");

    for r in records.iter().filter(|r| r.model == "bad-model") {
        assert_eq!(r.finish_reason, "error");
        assert_eq!(r.error_kind, Some(CallErrorKind::MalformedResponse));
        assert_eq!(r.temperature, Some(0.0));
    }

    let out_root = dir.path().join("outputs");
    let out = save_outputs(&records, &out_root).expect("save");
    assert!(out.starts_with(&out_root));

    let reloaded = read_jsonl(&out.join(RESULTS_FILE)).unwrap();
    assert_eq!(reloaded.len(), records.len());
    for (a, b) in reloaded.iter().zip(&records) {
        assert_eq!(
            (&a.scenario_id, a.rep, &a.model, &a.response, a.is_correct, &a.error),
            (&b.scenario_id, b.rep, &b.model, &b.response, b.is_correct, &b.error)
        );
    }

    let csv = std::fs::read_to_string(out.join(SUMMARY_FILE)).unwrap();
    let mut lines = csv.lines();
    assert_eq!(
        lines.next(),
        Some("scenario_id,rep,model,latency_s,is_correct,expected_answer,response_preview,error")
    );
    assert_eq!(lines.count(), 8);

    let summaries = summarize(&records);
    assert_eq!(summaries[0].model, "good-model");
    assert_eq!(summaries[0].accuracy(), Some(1.0));
    assert_eq!(summaries[1].errors, 4);
}

#[tokio::test]
#[serial]
async fn missing_credential_fails_before_any_request() {
    let server = MockServer::start().await;
    mount_models(&server).await;

    let dir = tempfile::tempdir().unwrap();
    let cfg_path = write_experiment(dir.path(), &server.uri());
    std::env::remove_var(KEY_VAR);

    let cfg = load_config(&cfg_path).unwrap();
    let err = Runner::from_config(&cfg).err().expect("should fail");
    assert!(matches!(err, HarnessError::MissingCredential { .. }));
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
#[serial]
async fn missing_template_fails_before_any_request() {
    let server = MockServer::start().await;
    mount_models(&server).await;

    let dir = tempfile::tempdir().unwrap();
    let cfg_path = write_experiment(dir.path(), &server.uri());
    std::fs::remove_file(dir.path().join("open.txt")).unwrap();
    std::env::set_var(KEY_VAR, "sk-test");

    let cfg = load_config(&cfg_path).unwrap();
    let runner = Runner::from_config(&cfg).unwrap();
    let err = runner.run_experiment(&cfg, None).await.unwrap_err();
    std::env::remove_var(KEY_VAR);

    assert!(matches!(err, HarnessError::PromptRead { .. }));
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn unreachable_endpoint_yields_error_rows_that_still_save() {
    // Bind then drop to get a port nobody listens on.
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let base_url = format!("http://127.0.0.1:{port}");

    let dir = tempfile::tempdir().unwrap();
    let cfg = load_config(&write_experiment(dir.path(), &base_url)).unwrap();
    let client = HttpChatClient::new(&base_url, ApiKey::new("k"), Duration::from_secs(1))
        .unwrap()
        .with_retry(RetryPolicy::no_retry());
    let runner = Runner::new(
        Arc::new(client),
        Arc::new(FilePromptSource::new()),
        Arc::new(Unlimited),
    );

    let records = runner.run_experiment(&cfg, None).await.expect("run");
    assert_eq!(records.len(), 8);
    for r in &records {
        assert_eq!(r.finish_reason, "error");
        assert_eq!(r.error_kind, Some(CallErrorKind::Network));
        assert_eq!(r.usage_total_tokens, None);
    }

    let out = save_outputs(&records, &dir.path().join("outputs")).expect("save");
    let jsonl = std::fs::read_to_string(out.join(RESULTS_FILE)).unwrap();
    assert_eq!(jsonl.lines().count(), 8);
    assert!(jsonl.contains("\"error_kind\":\"network\""));
}
