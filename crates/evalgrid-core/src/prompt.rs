//! Prompt rendering: system text, user template, expected-answer header.
//!
//! A rendered user template may start with an answer header:
//!
//! ```text
//! Expected Answer: 42
//! ---
//! Prompt:
//! What is 6*7?
//! ```
//!
//! Everything after the separator is the prompt body. Without the separator
//! the whole rendered text is the body and there is no expected answer.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use async_trait::async_trait;
use regex::Regex;

use crate::config::Scenario;
use crate::error::{HarnessError, HarnessResult};

/// Separator between the answer header and the prompt body.
pub const PROMPT_DELIMITER: &str = "\n---\nPrompt:\n";
pub const EXPECTED_PREFIX: &str = "Expected Answer:";

/// Template variables. The runner always passes an empty map.
pub type Variables = BTreeMap<String, String>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedPrompt {
    pub system: String,
    pub user: String,
    pub expected_answer: Option<String>,
}

/// Source of rendered prompts for a scenario.
#[async_trait]
pub trait PromptSource: Send + Sync {
    async fn render(&self, scenario: &Scenario, vars: &Variables) -> HarnessResult<RenderedPrompt>;
}

/// Reads prompt files from disk. Relative paths resolve against the process
/// working directory unless a root is given.
#[derive(Debug, Clone, Default)]
pub struct FilePromptSource {
    root: Option<PathBuf>,
}

impl FilePromptSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
        }
    }

    fn resolve(&self, path: &str) -> PathBuf {
        match &self.root {
            Some(root) => root.join(path),
            None => PathBuf::from(path),
        }
    }
}

#[async_trait]
impl PromptSource for FilePromptSource {
    async fn render(&self, scenario: &Scenario, vars: &Variables) -> HarnessResult<RenderedPrompt> {
        let system = if scenario.system_prompt.is_empty() {
            String::new()
        } else {
            load_text(&self.resolve(&scenario.system_prompt)).await?
        };

        let template_path = self.resolve(&scenario.user_prompt_template);
        let template = load_text(&template_path).await?;
        let raw = render_template(&template, vars, &template_path)?;
        let (expected_answer, user) = parse_expected_and_prompt(&raw);

        Ok(RenderedPrompt {
            system,
            user,
            expected_answer,
        })
    }
}

async fn load_text(path: &Path) -> HarnessResult<String> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|source| HarnessError::PromptRead {
            path: path.to_path_buf(),
            source,
        })
}

fn placeholder_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\{\{\s*([A-Za-z_][A-Za-z0-9_]*)\s*\}\}").expect("placeholder regex")
    })
}

/// Substitute `{{ name }}` placeholders. Undefined names are an error.
pub fn render_template(template: &str, vars: &Variables, origin: &Path) -> HarnessResult<String> {
    let re = placeholder_re();
    if let Some(missing) = re
        .captures_iter(template)
        .map(|c| c[1].to_string())
        .find(|name| !vars.contains_key(name))
    {
        return Err(HarnessError::UndefinedVariable {
            path: origin.to_path_buf(),
            name: missing,
        });
    }
    Ok(re
        .replace_all(template, |c: &regex::Captures<'_>| vars[&c[1]].clone())
        .into_owned())
}

/// Split rendered text into (expected answer, prompt body).
pub fn parse_expected_and_prompt(text: &str) -> (Option<String>, String) {
    if let Some((header, body)) = text.split_once(PROMPT_DELIMITER) {
        if let Some(expected) = header.trim().strip_prefix(EXPECTED_PREFIX) {
            return (Some(expected.trim().to_string()), body.trim().to_string());
        }
    }
    (None, text.trim().to_string())
}
