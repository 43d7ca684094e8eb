//! Completion model implementations.
//!
//! Implements the core [`CompletionModel`] trait for:
//! - **[`DisabledModel`]**: always fails; analysis and `ask` report it per chunk.
//! - **[`OpenAIChatModel`]**: OpenAI-compatible `POST /chat/completions`.
//! - **[`YandexGptModel`]**: YandexGPT `foundationModels/v1/completion`.
//!
//! Completions are never retried here. A failed chunk stays unprocessed
//! and is picked up again by the next `digest analyze` run.
//!
//! # Credentials
//!
//! | Provider | Environment |
//! |----------|-------------|
//! | `openai` | `OPENAI_API_KEY` |
//! | `yandex` | `YANDEX_GPT_API_KEY`, `YANDEX_FOLDER_ID` |

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;

pub use doc_digest_core::completion::{CompletionModel, CompletionRequest};
use doc_digest_core::error::ModelError;

use crate::config::CompletionConfig;

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const YANDEX_COMPLETION_URL: &str =
    "https://llm.api.cloud.yandex.net/foundationModels/v1/completion";

fn build_client(timeout_secs: u64) -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()?)
}

fn required_env(name: &str) -> Result<String> {
    std::env::var(name).map_err(|_| anyhow!("{} environment variable not set", name))
}

/// POST `body` and return the JSON response, mapping failures to [`ModelError`].
async fn post_json(
    request: reqwest::RequestBuilder,
    body: &Value,
) -> Result<Value, ModelError> {
    let response = request
        .json(body)
        .send()
        .await
        .map_err(|e| ModelError::Request(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ModelError::Status {
            status: status.as_u16(),
            body,
        });
    }

    response
        .json::<Value>()
        .await
        .map_err(|e| ModelError::Malformed(e.to_string()))
}

fn non_empty(text: &str) -> Result<String, ModelError> {
    if text.trim().is_empty() {
        return Err(ModelError::Empty);
    }
    Ok(text.to_string())
}

// ============ Disabled ============

pub struct DisabledModel;

#[async_trait]
impl CompletionModel for DisabledModel {
    fn name(&self) -> &str {
        "disabled"
    }

    async fn complete(&self, _request: &CompletionRequest) -> Result<String, ModelError> {
        Err(ModelError::Disabled)
    }
}

// ============ OpenAI ============

/// Chat completions against OpenAI or any compatible server.
pub struct OpenAIChatModel {
    api_key: String,
    base_url: String,
    client: reqwest::Client,
}

impl OpenAIChatModel {
    pub fn new(config: &CompletionConfig) -> Result<Self> {
        Ok(Self {
            api_key: required_env("OPENAI_API_KEY")?,
            base_url: config
                .base_url
                .clone()
                .unwrap_or_else(|| OPENAI_BASE_URL.to_string()),
            client: build_client(config.timeout_secs)?,
        })
    }
}

fn openai_body(request: &CompletionRequest) -> Value {
    let messages: Vec<Value> = request
        .messages
        .iter()
        .map(|m| json!({"role": m.role.as_str(), "content": m.text}))
        .collect();
    json!({
        "model": request.options.model,
        "messages": messages,
        "temperature": request.options.temperature,
        "max_tokens": request.options.max_tokens,
    })
}

/// Extract `choices[0].message.content`.
fn parse_openai_response(json: &Value) -> Result<String, ModelError> {
    let text = json
        .pointer("/choices/0/message/content")
        .and_then(|c| c.as_str())
        .ok_or_else(|| ModelError::Malformed("missing choices[0].message.content".to_string()))?;
    non_empty(text)
}

#[async_trait]
impl CompletionModel for OpenAIChatModel {
    fn name(&self) -> &str {
        "openai"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, ModelError> {
        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
        let builder = self.client.post(&url).bearer_auth(&self.api_key);
        let json = post_json(builder, &openai_body(request)).await?;
        parse_openai_response(&json)
    }
}

// ============ YandexGPT ============

/// YandexGPT foundation models API.
pub struct YandexGptModel {
    api_key: String,
    folder_id: String,
    url: String,
    client: reqwest::Client,
}

impl YandexGptModel {
    pub fn new(config: &CompletionConfig) -> Result<Self> {
        Ok(Self {
            api_key: required_env("YANDEX_GPT_API_KEY")?,
            folder_id: required_env("YANDEX_FOLDER_ID")?,
            url: config
                .base_url
                .clone()
                .unwrap_or_else(|| YANDEX_COMPLETION_URL.to_string()),
            client: build_client(config.timeout_secs)?,
        })
    }
}

fn yandex_body(folder_id: &str, request: &CompletionRequest) -> Value {
    let messages: Vec<Value> = request
        .messages
        .iter()
        .map(|m| json!({"role": m.role.as_str(), "text": m.text}))
        .collect();
    json!({
        "modelUri": format!("gpt://{}/{}", folder_id, request.options.model),
        "completionOptions": {
            "stream": false,
            "temperature": request.options.temperature,
            "maxTokens": request.options.max_tokens.to_string(),
        },
        "messages": messages,
    })
}

/// Extract `result.alternatives[0].message.text`.
fn parse_yandex_response(json: &Value) -> Result<String, ModelError> {
    let text = json
        .pointer("/result/alternatives/0/message/text")
        .and_then(|t| t.as_str())
        .ok_or_else(|| {
            ModelError::Malformed("missing result.alternatives[0].message.text".to_string())
        })?;
    non_empty(text)
}

#[async_trait]
impl CompletionModel for YandexGptModel {
    fn name(&self) -> &str {
        "yandex"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, ModelError> {
        let builder = self
            .client
            .post(&self.url)
            .header("Authorization", format!("Api-Key {}", self.api_key))
            .header("x-folder-id", &self.folder_id);
        let json = post_json(builder, &yandex_body(&self.folder_id, request)).await?;
        parse_yandex_response(&json)
    }
}

/// Create a completion model from configuration.
pub fn create_model(config: &CompletionConfig) -> Result<Box<dyn CompletionModel>> {
    match config.provider.as_str() {
        "disabled" => Ok(Box::new(DisabledModel)),
        "openai" => Ok(Box::new(OpenAIChatModel::new(config)?)),
        "yandex" => Ok(Box::new(YandexGptModel::new(config)?)),
        other => bail!("Unknown completion provider: {}", other),
    }
}
