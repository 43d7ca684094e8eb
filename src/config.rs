//! TOML configuration for the `digest` CLI.
//!
//! Only `[db]` is required; every other section falls back to defaults.
//!
//! ```toml
//! [db]
//! path = "./data/digest.sqlite"
//!
//! [chunking]
//! max_chunk_size = 1500
//!
//! [analysis]
//! throttle_ms = 200
//! max_group_size = 10
//! max_final_groups = 20
//!
//! [completion]
//! provider = "yandex"          # disabled | openai | yandex
//! model = "yandexgpt-lite"
//! temperature = 0.1
//! max_tokens = 1500
//!
//! [embedding]
//! provider = "openai"          # disabled | openai
//! model = "text-embedding-3-small"
//! dims = 1536
//!
//! [retrieval]
//! top_k = 5
//!
//! [ingest]
//! allowed_extensions = ["txt", "md", "pdf", "docx", "rtf", "xlsx"]
//! max_file_size_mb = 10
//! ```
//!
//! API keys are never read from this file. Providers take them from the
//! environment (`OPENAI_API_KEY`, `YANDEX_GPT_API_KEY`, `YANDEX_FOLDER_ID`).

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use doc_digest_core::completion::CompletionOptions;
use doc_digest_core::pipeline::AnalysisOptions;
use doc_digest_core::process::ProcessOptions;
use doc_digest_core::reduce::ReduceOptions;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub completion: CompletionConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_max_chunk_size")]
    pub max_chunk_size: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_chunk_size: default_max_chunk_size(),
        }
    }
}

fn default_max_chunk_size() -> usize {
    doc_digest_core::chunk::DEFAULT_MAX_CHUNK_SIZE
}

#[derive(Debug, Deserialize, Clone)]
pub struct AnalysisConfig {
    /// System prompt sent with every chunk.
    #[serde(default)]
    pub analysis_prompt: Option<String>,
    /// System prompt for the summarization calls.
    #[serde(default)]
    pub report_prompt: Option<String>,
    #[serde(default)]
    pub summary_instruction: Option<String>,
    #[serde(default)]
    pub report_instruction: Option<String>,
    #[serde(default = "default_throttle_ms")]
    pub throttle_ms: u64,
    #[serde(default = "default_max_group_size")]
    pub max_group_size: usize,
    #[serde(default = "default_max_final_groups")]
    pub max_final_groups: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            analysis_prompt: None,
            report_prompt: None,
            summary_instruction: None,
            report_instruction: None,
            throttle_ms: default_throttle_ms(),
            max_group_size: default_max_group_size(),
            max_final_groups: default_max_final_groups(),
        }
    }
}

fn default_throttle_ms() -> u64 {
    200
}
fn default_max_group_size() -> usize {
    doc_digest_core::reduce::DEFAULT_MAX_GROUP_SIZE
}
fn default_max_final_groups() -> usize {
    doc_digest_core::reduce::DEFAULT_MAX_FINAL_GROUPS
}

#[derive(Debug, Deserialize, Clone)]
pub struct CompletionConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_completion_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_completion_timeout_secs")]
    pub timeout_secs: u64,
    /// Override for OpenAI-compatible endpoints.
    #[serde(default)]
    pub base_url: Option<String>,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_completion_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_completion_timeout_secs(),
            base_url: None,
        }
    }
}

fn default_completion_model() -> String {
    "yandexgpt-lite".to_string()
}
fn default_temperature() -> f64 {
    0.1
}
fn default_max_tokens() -> u32 {
    1500
}
fn default_completion_timeout_secs() -> u64 {
    120
}

impl CompletionConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }

    pub fn options(&self) -> CompletionOptions {
        CompletionOptions {
            model: self.model.clone(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub base_url: Option<String>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            dims: None,
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
            base_url: None,
        }
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// System prompt for question answering.
    #[serde(default = "default_qa_prompt")]
    pub qa_prompt: String,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            qa_prompt: default_qa_prompt(),
        }
    }
}

fn default_top_k() -> usize {
    doc_digest_core::retrieve::DEFAULT_TOP_K
}
fn default_qa_prompt() -> String {
    "You are an assistant that answers questions using only the provided context. \
     If the context does not contain the answer, say so."
        .to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct IngestConfig {
    #[serde(default = "default_allowed_extensions")]
    pub allowed_extensions: Vec<String>,
    /// Files above this size are ingested with a warning.
    #[serde(default = "default_max_file_size_mb")]
    pub max_file_size_mb: u64,
    /// Length of knowledge-entry titles, in characters.
    #[serde(default = "default_title_chars")]
    pub title_chars: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            allowed_extensions: default_allowed_extensions(),
            max_file_size_mb: default_max_file_size_mb(),
            title_chars: default_title_chars(),
        }
    }
}

fn default_allowed_extensions() -> Vec<String> {
    ["txt", "md", "pdf", "docx", "rtf", "xlsx"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}
fn default_max_file_size_mb() -> u64 {
    10
}
fn default_title_chars() -> usize {
    80
}

impl IngestConfig {
    pub fn is_allowed(&self, extension: &str) -> bool {
        self.allowed_extensions
            .iter()
            .any(|e| e.trim_start_matches('.').eq_ignore_ascii_case(extension))
    }
}

impl Config {
    /// Pipeline options assembled from `[analysis]` and `[completion]`.
    pub fn analysis_options(&self) -> AnalysisOptions {
        let defaults = AnalysisOptions::default();
        let completion = self.completion.options();
        let a = &self.analysis;

        AnalysisOptions {
            analysis_prompt: a
                .analysis_prompt
                .clone()
                .unwrap_or(defaults.analysis_prompt),
            report_prompt: a.report_prompt.clone().unwrap_or(defaults.report_prompt),
            process: ProcessOptions {
                completion: completion.clone(),
                throttle: Duration::from_millis(a.throttle_ms),
            },
            reduce: ReduceOptions {
                max_group_size: a.max_group_size,
                max_final_groups: a.max_final_groups,
                completion,
                summary_instruction: a
                    .summary_instruction
                    .clone()
                    .unwrap_or(defaults.reduce.summary_instruction),
                report_instruction: a
                    .report_instruction
                    .clone()
                    .unwrap_or(defaults.reduce.report_instruction),
            },
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    // Validate chunking
    if config.chunking.max_chunk_size == 0 {
        bail!("chunking.max_chunk_size must be > 0");
    }

    // Validate analysis
    if config.analysis.max_group_size < 2 {
        bail!("analysis.max_group_size must be >= 2");
    }
    if config.analysis.max_final_groups < 1 {
        bail!("analysis.max_final_groups must be >= 1");
    }

    // Validate completion
    match config.completion.provider.as_str() {
        "disabled" | "openai" | "yandex" => {}
        other => bail!(
            "Unknown completion provider: '{}'. Must be disabled, openai, or yandex.",
            other
        ),
    }
    if !(0.0..=2.0).contains(&config.completion.temperature) {
        bail!("completion.temperature must be in [0.0, 2.0]");
    }
    if config.completion.max_tokens == 0 {
        bail!("completion.max_tokens must be > 0");
    }

    // Validate embedding
    if config.embedding.is_enabled() {
        if config.embedding.dims.is_none() || config.embedding.dims == Some(0) {
            bail!(
                "embedding.dims must be > 0 when provider is '{}'",
                config.embedding.provider
            );
        }
        if config.embedding.model.is_none() {
            bail!(
                "embedding.model must be specified when provider is '{}'",
                config.embedding.provider
            );
        }
    }
    match config.embedding.provider.as_str() {
        "disabled" | "openai" => {}
        other => bail!(
            "Unknown embedding provider: '{}'. Must be disabled or openai.",
            other
        ),
    }

    // Validate retrieval
    if config.retrieval.top_k < 1 {
        bail!("retrieval.top_k must be >= 1");
    }

    Ok(config)
}
