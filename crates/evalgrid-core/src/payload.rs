//! Wire request body for `POST /chat/completions`.

use serde::{Deserialize, Serialize};

use crate::config::Params;

/// Generation parameters that may reach the wire. Everything else is dropped.
pub const ALLOWED_PARAMS: &[&str] = &[
    "temperature",
    "top_p",
    "max_tokens",
    "presence_penalty",
    "frequency_penalty",
    "seed",
    "stop",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    #[serde(flatten)]
    pub params: Params,
}

/// Build the request body. Pure; never fails.
pub fn build_payload(model: &str, system: &str, user: &str, params: &Params) -> ChatRequest {
    let mut messages = Vec::with_capacity(2);
    if !system.is_empty() {
        messages.push(ChatMessage {
            role: Role::System,
            content: system.to_string(),
        });
    }
    messages.push(ChatMessage {
        role: Role::User,
        content: user.to_string(),
    });

    let params = params
        .iter()
        .filter(|(k, v)| ALLOWED_PARAMS.contains(&k.as_str()) && !v.is_null())
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();

    ChatRequest {
        model: model.to_string(),
        messages,
        params,
    }
}
