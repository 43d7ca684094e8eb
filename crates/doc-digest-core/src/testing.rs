//! Test doubles for the embedding and completion capabilities.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;

use crate::completion::{CompletionModel, CompletionRequest};
use crate::embedding::EmbeddingProvider;
use crate::error::ModelError;

/// Embeds every text as the same vector and counts calls.
pub struct StaticEmbedder {
    vector: Vec<f32>,
    calls: AtomicUsize,
}

impl StaticEmbedder {
    pub fn new(vector: Vec<f32>) -> Self {
        Self {
            vector,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmbeddingProvider for StaticEmbedder {
    fn model_name(&self) -> &str {
        "static"
    }

    fn dims(&self) -> usize {
        self.vector.len()
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(texts.iter().map(|_| self.vector.clone()).collect())
    }
}

type Responder = Box<dyn Fn(usize, &CompletionRequest) -> Result<String, ModelError> + Send + Sync>;

/// Completion model driven by a closure over `(call_number, request)`.
/// Records every request it receives.
pub struct ScriptedModel {
    respond: Responder,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedModel {
    pub fn new<F>(respond: F) -> Self
    where
        F: Fn(usize, &CompletionRequest) -> Result<String, ModelError> + Send + Sync + 'static,
    {
        Self {
            respond: Box::new(respond),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Answers `"summary of: <user text>"` to everything.
    pub fn echo() -> Self {
        Self::new(|_, req| Ok(format!("summary of: {}", req.user_text().unwrap_or(""))))
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionModel for ScriptedModel {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, ModelError> {
        let n = {
            let mut requests = self.requests.lock().unwrap();
            requests.push(request.clone());
            requests.len() - 1
        };
        (self.respond)(n, request)
    }
}
