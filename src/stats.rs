//! Database statistics.
//!
//! `digest stats` prints how much has been ingested, how far analysis has
//! progressed, and how many knowledge entries still wait for a vector.

use anyhow::Result;
use sqlx::{Row, SqlitePool};

use crate::config::Config;
use crate::db;
use crate::documents::format_ts_iso;

#[derive(Debug, Default, PartialEq, Eq)]
pub struct Totals {
    pub documents: i64,
    pub chunks: i64,
    pub processed_chunks: i64,
    pub summaries: i64,
    pub entries: i64,
    pub embedded_entries: i64,
}

/// Per-user breakdown.
struct UserStats {
    user_id: String,
    doc_count: i64,
    summarized: i64,
    last_upload_ts: Option<i64>,
}

pub async fn totals(pool: &SqlitePool) -> Result<Totals> {
    let row = sqlx::query(
        r#"
        SELECT
            (SELECT COUNT(*) FROM documents) AS documents,
            (SELECT COUNT(*) FROM chunks) AS chunks,
            (SELECT COUNT(*) FROM chunks WHERE processed = 1) AS processed_chunks,
            (SELECT COUNT(*) FROM summaries) AS summaries,
            (SELECT COUNT(*) FROM knowledge_entries) AS entries,
            (SELECT COUNT(*) FROM knowledge_entries WHERE embedding IS NOT NULL) AS embedded_entries
        "#,
    )
    .fetch_one(pool)
    .await?;

    Ok(Totals {
        documents: row.get("documents"),
        chunks: row.get("chunks"),
        processed_chunks: row.get("processed_chunks"),
        summaries: row.get("summaries"),
        entries: row.get("entries"),
        embedded_entries: row.get("embedded_entries"),
    })
}

pub async fn run_stats(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    let t = totals(&pool).await?;

    let db_size = std::fs::metadata(&config.db.path)
        .map(|m| m.len())
        .unwrap_or(0);

    println!("doc-digest database stats");
    println!("=========================");
    println!();
    println!("  Database:    {}", config.db.path.display());
    println!("  Size:        {}", format_bytes(db_size));
    println!();
    println!("  Documents:   {}", t.documents);
    println!(
        "  Summarized:  {} / {}",
        t.summaries, t.documents
    );
    println!(
        "  Chunks:      {} processed / {} ({}%)",
        t.processed_chunks,
        t.chunks,
        percent(t.processed_chunks, t.chunks)
    );
    println!(
        "  Embedded:    {} / {} knowledge entries ({}%)",
        t.embedded_entries,
        t.entries,
        percent(t.embedded_entries, t.entries)
    );

    let user_rows = sqlx::query(
        r#"
        SELECT
            d.user_id,
            COUNT(*) AS doc_count,
            COUNT(s.document_id) AS summarized,
            MAX(d.uploaded_at) AS last_upload
        FROM documents d
        LEFT JOIN summaries s ON s.document_id = d.file_id
        GROUP BY d.user_id
        ORDER BY doc_count DESC, d.user_id
        "#,
    )
    .fetch_all(&pool)
    .await?;

    let users: Vec<UserStats> = user_rows
        .iter()
        .map(|row| UserStats {
            user_id: row.get("user_id"),
            doc_count: row.get("doc_count"),
            summarized: row.get("summarized"),
            last_upload_ts: row.get("last_upload"),
        })
        .collect();

    if !users.is_empty() {
        println!();
        println!("  By user:");
        println!(
            "  {:<24} {:>6} {:>11}   {}",
            "USER", "DOCS", "SUMMARIZED", "LAST UPLOAD"
        );
        println!("  {}", "-".repeat(62));
        for u in &users {
            let upload = match u.last_upload_ts {
                Some(ts) => format_ts_relative(ts),
                None => "never".to_string(),
            };
            println!(
                "  {:<24} {:>6} {:>11}   {}",
                u.user_id, u.doc_count, u.summarized, upload
            );
        }
    }

    println!();

    pool.close().await;
    Ok(())
}

fn percent(part: i64, whole: i64) -> i64 {
    if whole > 0 {
        (part * 100) / whole
    } else {
        0
    }
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

/// Format a Unix timestamp relative to now (e.g. "3 hours ago").
fn format_ts_relative(ts: i64) -> String {
    let delta = chrono::Utc::now().timestamp() - ts;

    if delta < 0 {
        return format_ts_iso(ts);
    }
    if delta < 60 {
        "just now".to_string()
    } else if delta < 3600 {
        let mins = delta / 60;
        format!("{} min{} ago", mins, if mins == 1 { "" } else { "s" })
    } else if delta < 86400 {
        let hours = delta / 3600;
        format!("{} hour{} ago", hours, if hours == 1 { "" } else { "s" })
    } else if delta < 86400 * 30 {
        let days = delta / 86400;
        format!("{} day{} ago", days, if days == 1 { "" } else { "s" })
    } else {
        format_ts_iso(ts)
    }
}
