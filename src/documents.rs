//! Document listing, status, reports, and deletion.
//!
//! Backs `digest documents`, `digest status`, `digest report`,
//! `digest reports`, and `digest delete`.

use anyhow::{bail, Result};

use doc_digest_core::models::{Document, DocumentStatus};
use doc_digest_core::store::Store;

use crate::config::Config;
use crate::db;
use crate::sqlite_store::SqliteStore;

/// Status of every document a user owns, oldest first.
pub async fn list_statuses(store: &dyn Store, user_id: &str) -> Result<Vec<DocumentStatus>> {
    let mut statuses = Vec::new();
    for doc in store.list_documents(user_id).await? {
        if let Some(status) = store.document_status(&doc.file_id).await? {
            statuses.push(status);
        }
    }
    Ok(statuses)
}

/// Fetch `file_id` if it exists and belongs to `user_id`.
///
/// Documents of other users are reported as not found.
pub async fn owned_document(store: &dyn Store, user_id: &str, file_id: &str) -> Result<Document> {
    match store.get_document(file_id).await? {
        Some(doc) if doc.user_id == user_id => Ok(doc),
        _ => bail!("document not found: {}", file_id),
    }
}

fn state_label(status: &DocumentStatus) -> &'static str {
    if status.has_summary {
        "summarized"
    } else if status.total_chunks == 0 {
        "empty"
    } else if status.is_fully_processed() {
        "analyzed"
    } else if status.processed_chunks > 0 {
        "partial"
    } else {
        "pending"
    }
}

pub async fn run_documents(config: &Config, user_id: &str) -> Result<()> {
    let pool = db::connect(config).await?;
    let store = SqliteStore::new(pool.clone());
    let statuses = list_statuses(&store, user_id).await?;

    if statuses.is_empty() {
        println!("No documents for user {}.", user_id);
    } else {
        println!(
            "{:<22} {:>8} {:>10}  {:<10}  TITLE",
            "FILE ID", "CHUNKS", "PROCESSED", "STATE"
        );
        for s in &statuses {
            println!(
                "{:<22} {:>8} {:>10}  {:<10}  {}",
                s.document.file_id,
                s.total_chunks,
                s.processed_chunks,
                state_label(s),
                s.document.title.as_deref().unwrap_or("(untitled)")
            );
        }
    }

    pool.close().await;
    Ok(())
}

pub async fn run_status(config: &Config, user_id: &str, file_id: &str) -> Result<()> {
    let pool = db::connect(config).await?;
    let store = SqliteStore::new(pool.clone());

    let status = match owned_status(&store, user_id, file_id).await {
        Ok(s) => s,
        Err(e) => {
            pool.close().await;
            return Err(e);
        }
    };

    println!("--- Document ---");
    println!("file_id:      {}", status.document.file_id);
    println!(
        "title:        {}",
        status.document.title.as_deref().unwrap_or("(untitled)")
    );
    println!("user:         {}", status.document.user_id);
    println!("origin:       {}", status.document.origin);
    println!(
        "uploaded_at:  {}",
        format_ts_iso(status.document.uploaded_at)
    );
    println!(
        "chunks:       {} / {} processed",
        status.processed_chunks, status.total_chunks
    );
    println!("state:        {}", state_label(&status));

    pool.close().await;
    Ok(())
}

pub async fn run_report(config: &Config, user_id: &str, file_id: &str) -> Result<()> {
    let pool = db::connect(config).await?;
    let store = SqliteStore::new(pool.clone());

    let status = match owned_status(&store, user_id, file_id).await {
        Ok(s) => s,
        Err(e) => {
            pool.close().await;
            return Err(e);
        }
    };

    match store.get_summary(file_id).await? {
        Some(summary) => {
            println!("{}", summary.text);
        }
        None => {
            pool.close().await;
            bail!(
                "no report for {} yet ({} / {} chunks processed). Run `digest analyze`.",
                file_id,
                status.processed_chunks,
                status.total_chunks
            );
        }
    }

    pool.close().await;
    Ok(())
}

pub async fn run_reports(config: &Config, user_id: &str) -> Result<()> {
    let pool = db::connect(config).await?;
    let store = SqliteStore::new(pool.clone());

    let mut printed = 0usize;
    for doc in store.list_documents(user_id).await? {
        if let Some(summary) = store.get_summary(&doc.file_id).await? {
            println!("=== {} ({}) ===", doc.display_name(), doc.file_id);
            println!("{}", summary.text);
            println!();
            printed += 1;
        }
    }
    if printed == 0 {
        println!("No reports for user {}.", user_id);
    }

    pool.close().await;
    Ok(())
}

pub async fn run_delete(config: &Config, user_id: &str, file_id: &str) -> Result<()> {
    let pool = db::connect(config).await?;
    let store = SqliteStore::new(pool.clone());

    let deleted = match owned_document(&store, user_id, file_id).await {
        Ok(_) => store.delete_document(file_id).await,
        Err(e) => Err(e),
    };
    pool.close().await;

    if !deleted? {
        bail!("document not found: {}", file_id);
    }
    println!("deleted {}", file_id);
    Ok(())
}

async fn owned_status(store: &dyn Store, user_id: &str, file_id: &str) -> Result<DocumentStatus> {
    owned_document(store, user_id, file_id).await?;
    match store.document_status(file_id).await? {
        Some(status) => Ok(status),
        None => bail!("document not found: {}", file_id),
    }
}

/// `2024-01-31T12:00:00Z`, or the raw number if out of range.
pub(crate) fn format_ts_iso(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%dT%H:%M:%SZ").to_string())
        .unwrap_or_else(|| ts.to_string())
}
