//! Resumable per-chunk analysis.
//!
//! Walks a document's chunks in index order and asks the model about every
//! chunk that has no recorded response yet:
//!
//! ```text
//! list_chunks ──▶ for each chunk
//!                   processed? ──yes──▶ Skipped
//!                       │ no
//!                   [throttle] ─▶ complete(system, chunk) ─▶ mark_chunk_processed
//!                                      │ err / empty             │ err
//!                                      ▼                         ▼
//!                                   Failed                    Failed
//! ```
//!
//! A chunk's response and its `processed` flag are written in one store
//! operation, so an interrupted run leaves every chunk either fully
//! processed or untouched. Re-running picks up exactly the chunks that are
//! still unprocessed.

use std::time::Duration;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::completion::{CompletionModel, CompletionOptions, CompletionRequest};
use crate::error::ModelError;
use crate::store::Store;

/// Delay between successive model calls.
pub const DEFAULT_THROTTLE: Duration = Duration::from_millis(200);

#[derive(Debug, Clone)]
pub struct ProcessOptions {
    pub completion: CompletionOptions,
    pub throttle: Duration,
}

impl Default for ProcessOptions {
    fn default() -> Self {
        Self {
            completion: CompletionOptions::default(),
            throttle: DEFAULT_THROTTLE,
        }
    }
}

/// What happened to one chunk during a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ChunkOutcome {
    /// Already processed by an earlier run; no model call was made.
    Skipped { chunk_index: i64 },
    Processed { chunk_index: i64 },
    /// The chunk stays unprocessed and will be retried on the next run.
    Failed { chunk_index: i64, error: String },
}

impl ChunkOutcome {
    pub fn chunk_index(&self) -> i64 {
        match self {
            ChunkOutcome::Skipped { chunk_index }
            | ChunkOutcome::Processed { chunk_index }
            | ChunkOutcome::Failed { chunk_index, .. } => *chunk_index,
        }
    }
}

/// Outcomes of one processing run, in chunk order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProcessReport {
    pub outcomes: Vec<ChunkOutcome>,
}

impl ProcessReport {
    pub fn total(&self) -> usize {
        self.outcomes.len()
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, ChunkOutcome::Skipped { .. }))
    }

    pub fn processed(&self) -> usize {
        self.count(|o| matches!(o, ChunkOutcome::Processed { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, ChunkOutcome::Failed { .. }))
    }

    /// True when every chunk now has a recorded response.
    pub fn is_complete(&self) -> bool {
        self.failed() == 0
    }

    fn count(&self, pred: impl Fn(&ChunkOutcome) -> bool) -> usize {
        self.outcomes.iter().filter(|o| pred(o)).count()
    }
}

/// Callback invoked after each chunk, used for progress reporting.
pub type ChunkObserver<'a> = &'a (dyn Fn(&ChunkOutcome) + Send + Sync);

/// Analyze every unprocessed chunk of `document_id`.
///
/// Only a failure to list the chunks is returned as an error. Everything
/// else is reported per chunk in the [`ProcessReport`].
pub async fn process_document(
    store: &dyn Store,
    document_id: &str,
    system_prompt: &str,
    model: &dyn CompletionModel,
    options: &ProcessOptions,
    observer: Option<ChunkObserver<'_>>,
) -> Result<ProcessReport> {
    let chunks = store
        .list_chunks(document_id)
        .await
        .with_context(|| format!("Failed to list chunks for document {}", document_id))?;

    let mut report = ProcessReport::default();
    let mut calls_made = 0usize;

    for chunk in &chunks {
        let outcome = if chunk.processed {
            ChunkOutcome::Skipped {
                chunk_index: chunk.chunk_index,
            }
        } else {
            if calls_made > 0 && !options.throttle.is_zero() {
                tokio::time::sleep(options.throttle).await;
            }
            calls_made += 1;

            let request = CompletionRequest::new(system_prompt, &chunk.content, &options.completion);
            match analyze_chunk(store, model, chunk.id, &request).await {
                Ok(()) => {
                    tracing::debug!(
                        document_id,
                        chunk_index = chunk.chunk_index,
                        model = model.name(),
                        "chunk processed"
                    );
                    ChunkOutcome::Processed {
                        chunk_index: chunk.chunk_index,
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        document_id,
                        chunk_index = chunk.chunk_index,
                        error = %e,
                        "chunk analysis failed"
                    );
                    ChunkOutcome::Failed {
                        chunk_index: chunk.chunk_index,
                        error: format!("{:#}", e),
                    }
                }
            }
        };

        if let Some(observe) = observer {
            observe(&outcome);
        }
        report.outcomes.push(outcome);
    }

    tracing::info!(
        document_id,
        total = report.total(),
        processed = report.processed(),
        skipped = report.skipped(),
        failed = report.failed(),
        "chunk processing finished"
    );
    Ok(report)
}

async fn analyze_chunk(
    store: &dyn Store,
    model: &dyn CompletionModel,
    chunk_id: i64,
    request: &CompletionRequest,
) -> Result<()> {
    let response = model.complete(request).await?;
    if response.trim().is_empty() {
        return Err(ModelError::Empty.into());
    }
    // A concurrent run may have recorded this chunk first; keep its answer.
    store
        .mark_chunk_processed(chunk_id, &response)
        .await
        .context("Failed to record chunk response")?;
    Ok(())
}
