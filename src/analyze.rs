//! `digest analyze`: run the chunk analysis and summary for a user's documents.
//!
//! Safe to run repeatedly. Summarized documents are skipped, and a
//! document interrupted mid-way resumes at its first unprocessed chunk.

use anyhow::{bail, Result};
use std::sync::atomic::{AtomicU64, Ordering};

use doc_digest_core::completion::CompletionModel;
use doc_digest_core::models::Document;
use doc_digest_core::pipeline::{analyze_document, AnalysisOptions, AnalysisOutcome};
use doc_digest_core::process::ChunkOutcome;
use doc_digest_core::store::Store;

use crate::completion;
use crate::config::Config;
use crate::db;
use crate::progress::{AnalysisProgressEvent, ProgressMode, ProgressReporter};
use crate::sqlite_store::SqliteStore;

/// Result for one document. Errors are kept per document so one failing
/// document does not stop the others.
#[derive(Debug)]
pub struct DocumentRun {
    pub document: Document,
    pub outcome: Result<AnalysisOutcome>,
}

/// Analyze `documents` one after another, reporting progress per chunk.
pub async fn analyze_documents(
    store: &dyn Store,
    model: &dyn CompletionModel,
    options: &AnalysisOptions,
    documents: Vec<Document>,
    reporter: &dyn ProgressReporter,
) -> Result<Vec<DocumentRun>> {
    let mut runs = Vec::with_capacity(documents.len());

    for document in documents {
        let file_id = document.file_id.clone();
        let total = store.list_chunks(&file_id).await?.len() as u64;
        reporter.report(AnalysisProgressEvent::Started {
            file_id: file_id.clone(),
            total,
        });

        let seen = AtomicU64::new(0);
        let failed = AtomicU64::new(0);
        let observer = |outcome: &ChunkOutcome| {
            let n = seen.fetch_add(1, Ordering::SeqCst) + 1;
            if matches!(outcome, ChunkOutcome::Failed { .. }) {
                failed.fetch_add(1, Ordering::SeqCst);
            }
            reporter.report(AnalysisProgressEvent::Chunk {
                file_id: file_id.clone(),
                n,
                total,
                outcome: outcome.clone(),
            });
            if n == total && failed.load(Ordering::SeqCst) == 0 {
                reporter.report(AnalysisProgressEvent::Reducing {
                    file_id: file_id.clone(),
                });
            }
        };

        let outcome = analyze_document(store, &file_id, model, options, Some(&observer)).await;
        if let Err(e) = &outcome {
            tracing::warn!(file_id = %file_id, error = %e, "document analysis failed");
        }
        runs.push(DocumentRun { document, outcome });
    }

    Ok(runs)
}

pub async fn run_analyze(
    config: &Config,
    user_id: &str,
    document_id: Option<String>,
    mode: ProgressMode,
) -> Result<()> {
    if !config.completion.is_enabled() {
        bail!("Completion provider is disabled. Set [completion] provider in config.");
    }
    let model = completion::create_model(&config.completion)?;
    let options = config.analysis_options();

    let pool = db::connect(config).await?;
    let store = SqliteStore::new(pool.clone());

    let documents = match document_id {
        Some(id) => match store.get_document(&id).await? {
            Some(doc) if doc.user_id == user_id => vec![doc],
            _ => bail!("document not found: {}", id),
        },
        None => store.list_documents(user_id).await?,
    };
    if documents.is_empty() {
        println!("analyze");
        println!("  no documents for user {}", user_id);
        pool.close().await;
        return Ok(());
    }

    let reporter = mode.reporter();
    let runs = analyze_documents(&store, model.as_ref(), &options, documents, reporter.as_ref())
        .await?;

    let mut incomplete = 0usize;
    println!("analyze");
    for run in &runs {
        let name = run.document.display_name();
        let outcome = match &run.outcome {
            Ok(outcome) => outcome,
            Err(e) => {
                incomplete += 1;
                println!("  {}: failed: {:#}", name, e);
                continue;
            }
        };
        match outcome {
            AnalysisOutcome::AlreadySummarized => {
                println!("  {}: already summarized", name);
            }
            AnalysisOutcome::NoChunks => {
                println!("  {}: no chunks", name);
            }
            AnalysisOutcome::Incomplete(report) => {
                incomplete += 1;
                println!(
                    "  {}: incomplete ({} of {} chunks failed, run again to retry)",
                    name,
                    report.failed(),
                    report.total()
                );
            }
            AnalysisOutcome::Summarized { report, .. } => {
                println!(
                    "  {}: summarized ({} chunks analyzed, {} already done)",
                    name,
                    report.processed(),
                    report.skipped()
                );
            }
            AnalysisOutcome::MergeFailed { error, .. } => {
                incomplete += 1;
                eprintln!("Warning: {}: {}", name, error);
                println!("  {}: final report failed, partial summaries follow", name);
                if let Some(text) = error.fallback_text() {
                    println!();
                    println!("{}", text);
                    println!();
                }
            }
        }
    }
    if incomplete == 0 {
        println!("ok");
    }

    pool.close().await;
    Ok(())
}
