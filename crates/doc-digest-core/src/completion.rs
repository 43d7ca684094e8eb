//! Completion capability consumed by the chunk processor and reducer.
//!
//! The pipeline never talks to a model provider directly. It builds a
//! [`CompletionRequest`] (a system message plus a user message and sampling
//! options) and hands it to a [`CompletionModel`] implementation supplied
//! by the application. Concrete HTTP providers live in the `doc-digest`
//! app crate.

use async_trait::async_trait;
use serde::Serialize;

use crate::error::ModelError;

/// Chat role of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// One message of a chat payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatMessage {
    pub role: Role,
    pub text: String,
}

impl ChatMessage {
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            text: text.into(),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
        }
    }
}

/// Sampling options for one call.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionOptions {
    /// Provider model name (e.g. `"yandexgpt-lite"`, `"gpt-4o-mini"`).
    pub model: String,
    pub temperature: f64,
    pub max_tokens: u32,
}

impl Default for CompletionOptions {
    fn default() -> Self {
        Self {
            model: "yandexgpt-lite".to_string(),
            temperature: 0.1,
            max_tokens: 1500,
        }
    }
}

/// A complete request: ordered messages plus options.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub messages: Vec<ChatMessage>,
    pub options: CompletionOptions,
}

impl CompletionRequest {
    /// The two-message payload used throughout the pipeline.
    pub fn new(system_prompt: &str, user_prompt: &str, options: &CompletionOptions) -> Self {
        Self {
            messages: vec![ChatMessage::system(system_prompt), ChatMessage::user(user_prompt)],
            options: options.clone(),
        }
    }

    /// Text of the last user message, if any.
    pub fn user_text(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.text.as_str())
    }
}

/// A language model that turns a request into text.
///
/// Implementations must not retry internally beyond their transport's own
/// behavior: the pipeline's resumability is the retry mechanism.
#[async_trait]
pub trait CompletionModel: Send + Sync {
    /// Provider identifier, used in logs.
    fn name(&self) -> &str;

    /// Run one completion.
    async fn complete(&self, request: &CompletionRequest) -> Result<String, ModelError>;
}
