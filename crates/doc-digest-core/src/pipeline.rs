//! End-to-end analysis of one document.
//!
//! Ties the chunk processor and the reducer together:
//!
//! 1. A document that already has a summary is left alone.
//! 2. Unprocessed chunks are sent to the model ([`process_document`]).
//! 3. If every chunk now has a response, the responses are reduced in
//!    index order and the result is stored as the document's summary.
//!
//! Running it again after a partial failure resumes where it stopped.

use anyhow::{Context, Result};

use crate::completion::CompletionModel;
use crate::error::ReduceError;
use crate::process::{process_document, ChunkObserver, ProcessOptions, ProcessReport};
use crate::reduce::{reduce, ReduceOptions};
use crate::store::Store;

#[derive(Debug, Clone)]
pub struct AnalysisOptions {
    /// System prompt for per-chunk analysis.
    pub analysis_prompt: String,
    /// System prompt for the summarization calls.
    pub report_prompt: String,
    pub process: ProcessOptions,
    pub reduce: ReduceOptions,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            analysis_prompt: "You are an expert analyst. Extract the key facts, claims, figures \
                              and conclusions of the following document fragment."
                .to_string(),
            report_prompt: "You are an expert analyst writing reports about documents."
                .to_string(),
            process: ProcessOptions::default(),
            reduce: ReduceOptions::default(),
        }
    }
}

#[derive(Debug)]
pub enum AnalysisOutcome {
    /// A summary already existed; nothing was called or written.
    AlreadySummarized,
    /// The document has no chunks to analyze.
    NoChunks,
    /// Some chunks are still unprocessed; run again to retry them.
    Incomplete(ProcessReport),
    /// The summary was produced and stored.
    Summarized { report: ProcessReport, summary: String },
    /// All chunks are processed but the final merge failed. Nothing was
    /// stored; `error.fallback_text()` holds the group summaries.
    MergeFailed {
        report: ProcessReport,
        error: ReduceError,
    },
}

/// Analyze `document_id` as far as possible.
pub async fn analyze_document(
    store: &dyn Store,
    document_id: &str,
    model: &dyn CompletionModel,
    options: &AnalysisOptions,
    observer: Option<ChunkObserver<'_>>,
) -> Result<AnalysisOutcome> {
    if store.get_summary(document_id).await?.is_some() {
        tracing::debug!(document_id, "summary exists, skipping analysis");
        return Ok(AnalysisOutcome::AlreadySummarized);
    }

    let report = process_document(
        store,
        document_id,
        &options.analysis_prompt,
        model,
        &options.process,
        observer,
    )
    .await?;

    if report.total() == 0 {
        return Ok(AnalysisOutcome::NoChunks);
    }
    if !report.is_complete() {
        return Ok(AnalysisOutcome::Incomplete(report));
    }

    let chunks = store
        .list_chunks(document_id)
        .await
        .with_context(|| format!("Failed to list chunks for document {}", document_id))?;
    let responses: Vec<String> = chunks
        .into_iter()
        .filter_map(|c| c.ai_response)
        .collect();

    let summary = match reduce(&responses, &options.report_prompt, model, &options.reduce).await {
        Ok(summary) => summary,
        Err(error @ ReduceError::FinalMerge { .. }) => {
            tracing::warn!(document_id, error = %error, "final merge failed");
            return Ok(AnalysisOutcome::MergeFailed { report, error });
        }
        Err(error) => {
            return Err(anyhow::Error::new(error)
                .context(format!("Failed to summarize document {}", document_id)))
        }
    };

    if !store.create_summary(document_id, &summary).await? {
        tracing::info!(document_id, "summary written concurrently, keeping the stored one");
        return Ok(AnalysisOutcome::AlreadySummarized);
    }
    tracing::info!(document_id, chunks = report.total(), "document summarized");

    Ok(AnalysisOutcome::Summarized { report, summary })
}
