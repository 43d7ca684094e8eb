//! Idempotent schema setup, run by `digest init`.
//!
//! ```text
//! documents ─┬─< chunks             (ON DELETE CASCADE)
//!            ├── summaries          (at most one per document)
//!            └─< knowledge_entries  (embedding BLOB, nullable)
//! ```

use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    apply(&pool).await?;
    pool.close().await;
    Ok(())
}

/// Create every table and index that does not exist yet.
pub async fn apply(pool: &SqlitePool) -> Result<()> {
    // Create documents table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS documents (
            file_id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            title TEXT,
            origin TEXT NOT NULL,
            uploaded_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create chunks table. A response is recorded iff the chunk is processed.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS chunks (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            document_id TEXT NOT NULL,
            chunk_index INTEGER NOT NULL,
            content TEXT NOT NULL,
            ai_response TEXT,
            processed INTEGER NOT NULL DEFAULT 0,
            UNIQUE(document_id, chunk_index),
            CHECK ((processed = 1) = (ai_response IS NOT NULL)),
            FOREIGN KEY (document_id) REFERENCES documents(file_id) ON DELETE CASCADE
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create summaries table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS summaries (
            document_id TEXT PRIMARY KEY,
            text TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            FOREIGN KEY (document_id) REFERENCES documents(file_id) ON DELETE CASCADE
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create knowledge entries table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS knowledge_entries (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id TEXT NOT NULL,
            document_id TEXT NOT NULL,
            title TEXT NOT NULL,
            content TEXT NOT NULL,
            embedding BLOB,
            created_at INTEGER NOT NULL,
            FOREIGN KEY (document_id) REFERENCES documents(file_id) ON DELETE CASCADE
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create indexes
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_documents_user_id ON documents(user_id)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_chunks_document_id ON chunks(document_id)")
        .execute(pool)
        .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_knowledge_entries_document_id ON knowledge_entries(document_id)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
