//! SQLite-backed [`Store`] implementation.
//!
//! Every multi-row write runs in one transaction, so the batch of chunks
//! for a document appears all at once or not at all. Single-row state
//! changes (`mark_chunk_processed`, `create_summary`) are one guarded
//! statement each: the `WHERE processed = 0` / `ON CONFLICT DO NOTHING`
//! guards make a second writer a no-op instead of an overwrite.

use anyhow::{bail, Result};
use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use doc_digest_core::embedding::{blob_to_vec, vec_to_blob};
use doc_digest_core::models::{
    Chunk, Document, DocumentInsert, KnowledgeEntry, NewKnowledgeEntry, Summary,
};
use doc_digest_core::store::Store;

/// SQLite implementation of the [`Store`] trait.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn document_from_row(row: &SqliteRow) -> Document {
    Document {
        file_id: row.get("file_id"),
        user_id: row.get("user_id"),
        title: row.get("title"),
        origin: row.get("origin"),
        uploaded_at: row.get("uploaded_at"),
    }
}

fn chunk_from_row(row: &SqliteRow) -> Chunk {
    let processed: i64 = row.get("processed");
    Chunk {
        id: row.get("id"),
        document_id: row.get("document_id"),
        chunk_index: row.get("chunk_index"),
        content: row.get("content"),
        ai_response: row.get("ai_response"),
        processed: processed != 0,
    }
}

fn entry_from_row(row: &SqliteRow) -> KnowledgeEntry {
    let blob: Option<Vec<u8>> = row.get("embedding");
    KnowledgeEntry {
        id: row.get("id"),
        user_id: row.get("user_id"),
        document_id: row.get("document_id"),
        title: row.get("title"),
        content: row.get("content"),
        embedding: blob.map(|b| blob_to_vec(&b)),
    }
}

#[async_trait]
impl Store for SqliteStore {
    async fn create_document(&self, doc: &Document) -> Result<DocumentInsert> {
        let mut tx = self.pool.begin().await?;

        let existing: Option<String> = sqlx::query_scalar(
            r#"
            SELECT file_id FROM documents
            WHERE file_id = ?
               OR (user_id = ? AND title IS NOT NULL AND title = ?)
            LIMIT 1
            "#,
        )
        .bind(&doc.file_id)
        .bind(&doc.user_id)
        .bind(&doc.title)
        .fetch_optional(&mut *tx)
        .await?;

        if existing.is_some() {
            return Ok(DocumentInsert::AlreadyExists);
        }

        let result = sqlx::query(
            r#"
            INSERT INTO documents (file_id, user_id, title, origin, uploaded_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(file_id) DO NOTHING
            "#,
        )
        .bind(&doc.file_id)
        .bind(&doc.user_id)
        .bind(&doc.title)
        .bind(&doc.origin)
        .bind(doc.uploaded_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        if result.rows_affected() == 0 {
            return Ok(DocumentInsert::AlreadyExists);
        }
        Ok(DocumentInsert::Created)
    }

    async fn get_document(&self, file_id: &str) -> Result<Option<Document>> {
        let row = sqlx::query(
            "SELECT file_id, user_id, title, origin, uploaded_at FROM documents WHERE file_id = ?",
        )
        .bind(file_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(document_from_row))
    }

    async fn list_documents(&self, user_id: &str) -> Result<Vec<Document>> {
        let rows = sqlx::query(
            r#"
            SELECT file_id, user_id, title, origin, uploaded_at
            FROM documents
            WHERE user_id = ?
            ORDER BY uploaded_at ASC, rowid ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(document_from_row).collect())
    }

    async fn delete_document(&self, file_id: &str) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM knowledge_entries WHERE document_id = ?")
            .bind(file_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM summaries WHERE document_id = ?")
            .bind(file_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM chunks WHERE document_id = ?")
            .bind(file_id)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM documents WHERE file_id = ?")
            .bind(file_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }

    async fn create_chunks(&self, document_id: &str, contents: &[String]) -> Result<Vec<Chunk>> {
        let mut tx = self.pool.begin().await?;

        let existing: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chunks WHERE document_id = ?")
            .bind(document_id)
            .fetch_one(&mut *tx)
            .await?;
        if existing > 0 {
            bail!("chunks already exist for document {}", document_id);
        }

        let mut created = Vec::with_capacity(contents.len());
        for (index, content) in contents.iter().enumerate() {
            let result = sqlx::query(
                "INSERT INTO chunks (document_id, chunk_index, content, processed) VALUES (?, ?, ?, 0)",
            )
            .bind(document_id)
            .bind(index as i64)
            .bind(content)
            .execute(&mut *tx)
            .await?;

            created.push(Chunk {
                id: result.last_insert_rowid(),
                document_id: document_id.to_string(),
                chunk_index: index as i64,
                content: content.clone(),
                ai_response: None,
                processed: false,
            });
        }

        tx.commit().await?;
        Ok(created)
    }

    async fn list_chunks(&self, document_id: &str) -> Result<Vec<Chunk>> {
        let rows = sqlx::query(
            r#"
            SELECT id, document_id, chunk_index, content, ai_response, processed
            FROM chunks
            WHERE document_id = ?
            ORDER BY chunk_index ASC
            "#,
        )
        .bind(document_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(chunk_from_row).collect())
    }

    async fn mark_chunk_processed(&self, chunk_id: i64, response: &str) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE chunks SET ai_response = ?, processed = 1 WHERE id = ? AND processed = 0",
        )
        .bind(response)
        .bind(chunk_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 1 {
            return Ok(true);
        }

        let exists: bool = sqlx::query_scalar("SELECT COUNT(*) > 0 FROM chunks WHERE id = ?")
            .bind(chunk_id)
            .fetch_one(&self.pool)
            .await?;
        if !exists {
            bail!("chunk not found: {}", chunk_id);
        }
        Ok(false)
    }

    async fn create_summary(&self, document_id: &str, text: &str) -> Result<bool> {
        let now = chrono::Utc::now().timestamp();
        let result = sqlx::query(
            r#"
            INSERT INTO summaries (document_id, text, created_at)
            VALUES (?, ?, ?)
            ON CONFLICT(document_id) DO NOTHING
            "#,
        )
        .bind(document_id)
        .bind(text)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn get_summary(&self, document_id: &str) -> Result<Option<Summary>> {
        let row = sqlx::query(
            "SELECT document_id, text, created_at FROM summaries WHERE document_id = ?",
        )
        .bind(document_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| Summary {
            document_id: r.get("document_id"),
            text: r.get("text"),
            created_at: r.get("created_at"),
        }))
    }

    async fn insert_knowledge_entries(&self, entries: &[NewKnowledgeEntry]) -> Result<usize> {
        let now = chrono::Utc::now().timestamp();
        let mut tx = self.pool.begin().await?;

        for entry in entries {
            let blob = entry.embedding.as_deref().map(vec_to_blob);
            sqlx::query(
                r#"
                INSERT INTO knowledge_entries (user_id, document_id, title, content, embedding, created_at)
                VALUES (?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&entry.user_id)
            .bind(&entry.document_id)
            .bind(&entry.title)
            .bind(&entry.content)
            .bind(blob)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(entries.len())
    }

    async fn list_knowledge_entries(
        &self,
        document_ids: &[String],
    ) -> Result<Vec<KnowledgeEntry>> {
        if document_ids.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = vec!["?"; document_ids.len()].join(", ");
        let sql = format!(
            r#"
            SELECT id, user_id, document_id, title, content, embedding
            FROM knowledge_entries
            WHERE embedding IS NOT NULL AND document_id IN ({})
            ORDER BY id ASC
            "#,
            placeholders
        );

        let mut query = sqlx::query(&sql);
        for id in document_ids {
            query = query.bind(id);
        }
        let rows = query.fetch_all(&self.pool).await?;

        Ok(rows.iter().map(entry_from_row).collect())
    }

    async fn list_unembedded_entries(&self, limit: Option<usize>) -> Result<Vec<KnowledgeEntry>> {
        let limit = limit.map(|l| l as i64).unwrap_or(-1);
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, document_id, title, content, embedding
            FROM knowledge_entries
            WHERE embedding IS NULL
            ORDER BY id ASC
            LIMIT ?
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(entry_from_row).collect())
    }

    async fn set_entry_embedding(&self, entry_id: i64, vector: &[f32]) -> Result<()> {
        let result = sqlx::query("UPDATE knowledge_entries SET embedding = ? WHERE id = ?")
            .bind(vec_to_blob(vector))
            .bind(entry_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            bail!("knowledge entry not found: {}", entry_id);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::{db, migrate};
    use tempfile::TempDir;

    fn test_config(tmp: &TempDir) -> Config {
        let db_path = tmp.path().join("data").join("digest.sqlite");
        toml::from_str(&format!("[db]\npath = {:?}\n", db_path.display().to_string())).unwrap()
    }

    async fn open(config: &Config) -> SqliteStore {
        migrate::run_migrations(config).await.unwrap();
        SqliteStore::new(db::connect(config).await.unwrap())
    }

    fn doc(file_id: &str, user: &str, title: Option<&str>) -> Document {
        Document {
            file_id: file_id.to_string(),
            user_id: user.to_string(),
            title: title.map(String::from),
            origin: "upload".to_string(),
            uploaded_at: 1_700_000_000,
        }
    }

    fn entry(document_id: &str, content: &str, embedding: Option<Vec<f32>>) -> NewKnowledgeEntry {
        NewKnowledgeEntry {
            user_id: "u1".to_string(),
            document_id: document_id.to_string(),
            title: content.to_string(),
            content: content.to_string(),
            embedding,
        }
    }

    #[tokio::test]
    async fn test_duplicate_detection() {
        let tmp = TempDir::new().unwrap();
        let store = open(&test_config(&tmp)).await;

        let created = store.create_document(&doc("f1", "u1", Some("a.pdf"))).await.unwrap();
        assert_eq!(created, DocumentInsert::Created);
        let same_id = store.create_document(&doc("f1", "u2", Some("b.pdf"))).await.unwrap();
        assert_eq!(same_id, DocumentInsert::AlreadyExists);
        let same_title = store.create_document(&doc("f2", "u1", Some("a.pdf"))).await.unwrap();
        assert_eq!(same_title, DocumentInsert::AlreadyExists);
        let untitled = store.create_document(&doc("f3", "u1", None)).await.unwrap();
        assert_eq!(untitled, DocumentInsert::Created);

        let docs = store.list_documents("u1").await.unwrap();
        assert_eq!(docs.len(), 2);
    }

    #[tokio::test]
    async fn test_progress_survives_reopen() {
        let tmp = TempDir::new().unwrap();
        let config = test_config(&tmp);

        {
            let store = open(&config).await;
            store.create_document(&doc("f1", "u1", None)).await.unwrap();
            let chunks = store
                .create_chunks("f1", &["a".to_string(), "b".to_string()])
                .await
                .unwrap();
            assert!(store.mark_chunk_processed(chunks[0].id, "answer").await.unwrap());
            store.pool().close().await;
        }

        let store = open(&config).await;
        let chunks = store.list_chunks("f1").await.unwrap();
        assert!(chunks[0].processed);
        assert_eq!(chunks[0].ai_response.as_deref(), Some("answer"));
        assert!(!chunks[1].processed);
        assert!(chunks[1].ai_response.is_none());

        assert!(!store.mark_chunk_processed(chunks[0].id, "other").await.unwrap());
        assert!(store.mark_chunk_processed(9999, "x").await.is_err());
    }

    #[tokio::test]
    async fn test_chunks_are_created_once() {
        let tmp = TempDir::new().unwrap();
        let store = open(&test_config(&tmp)).await;
        store.create_document(&doc("f1", "u1", None)).await.unwrap();
        store.create_chunks("f1", &["a".to_string()]).await.unwrap();
        assert!(store.create_chunks("f1", &["b".to_string()]).await.is_err());
        assert_eq!(store.list_chunks("f1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_summary_is_immutable() {
        let tmp = TempDir::new().unwrap();
        let store = open(&test_config(&tmp)).await;
        store.create_document(&doc("f1", "u1", None)).await.unwrap();

        assert!(store.create_summary("f1", "first").await.unwrap());
        assert!(!store.create_summary("f1", "second").await.unwrap());
        assert_eq!(store.get_summary("f1").await.unwrap().unwrap().text, "first");
    }

    #[tokio::test]
    async fn test_knowledge_listing_and_backfill() {
        let tmp = TempDir::new().unwrap();
        let store = open(&test_config(&tmp)).await;
        store.create_document(&doc("f1", "u1", None)).await.unwrap();
        store.create_document(&doc("f2", "u1", None)).await.unwrap();
        store
            .insert_knowledge_entries(&[
                entry("f1", "one", Some(vec![1.0, 0.0])),
                entry("f1", "two", None),
                entry("f2", "three", Some(vec![0.0, 1.0])),
            ])
            .await
            .unwrap();

        let listed = store.list_knowledge_entries(&["f1".to_string()]).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].content, "one");
        assert_eq!(listed[0].embedding, Some(vec![1.0, 0.0]));

        let pending = store.list_unembedded_entries(None).await.unwrap();
        assert_eq!(pending.len(), 1);
        store.set_entry_embedding(pending[0].id, &[0.5, 0.5]).await.unwrap();
        assert!(store.list_unembedded_entries(Some(10)).await.unwrap().is_empty());

        let both = store
            .list_knowledge_entries(&["f1".to_string(), "f2".to_string()])
            .await
            .unwrap();
        let contents: Vec<&str> = both.iter().map(|e| e.content.as_str()).collect();
        assert_eq!(contents, vec!["one", "two", "three"]);
    }

    #[tokio::test]
    async fn test_delete_cascades() {
        let tmp = TempDir::new().unwrap();
        let store = open(&test_config(&tmp)).await;
        store.create_document(&doc("f1", "u1", None)).await.unwrap();
        store.create_chunks("f1", &["a".to_string()]).await.unwrap();
        store.create_summary("f1", "s").await.unwrap();
        store
            .insert_knowledge_entries(&[entry("f1", "one", Some(vec![1.0]))])
            .await
            .unwrap();

        assert!(store.delete_document("f1").await.unwrap());
        assert!(store.get_document("f1").await.unwrap().is_none());
        assert!(store.list_chunks("f1").await.unwrap().is_empty());
        assert!(store.get_summary("f1").await.unwrap().is_none());
        assert!(store
            .list_knowledge_entries(&["f1".to_string()])
            .await
            .unwrap()
            .is_empty());
        assert!(!store.delete_document("f1").await.unwrap());
    }
}
