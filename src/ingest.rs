//! Document ingestion.
//!
//! Turns an uploaded file into a document, its chunks, and its knowledge
//! entries:
//!
//! ```text
//! bytes ─▶ extract ─▶ chunk::split ─┬─▶ create_document + create_chunks
//!                                   └─▶ embed (non-fatal) ─▶ insert_knowledge_entries
//! ```
//!
//! Extraction failures and documents without text are rejected before
//! anything is written. A document the user already owns (same file id or
//! same title) is reported as a duplicate and left untouched.

use anyhow::{bail, Context, Result};
use sha2::{Digest, Sha256};
use std::path::Path;

use doc_digest_core::chunk;
use doc_digest_core::models::{Document, DocumentInsert, NewKnowledgeEntry};
use doc_digest_core::store::Store;

use crate::config::Config;
use crate::db;
use crate::embed_cmd;
use crate::embedding::{self, EmbeddingProvider};
use crate::extract::{self, ExtractError};
use crate::sqlite_store::SqliteStore;

/// One file to ingest.
#[derive(Debug, Clone)]
pub struct IngestRequest<'a> {
    pub user_id: &'a str,
    pub bytes: &'a [u8],
    /// Lowercase extension without the dot.
    pub extension: &'a str,
    pub title: Option<String>,
    /// Defaults to [`derive_file_id`].
    pub file_id: Option<String>,
    pub origin: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestSummary {
    pub file_id: String,
    pub chunks: usize,
    pub entries: usize,
    pub embedded: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    Ingested(IngestSummary),
    AlreadyExists { file_id: String },
}

/// `doc-` followed by the first 16 hex digits of sha256(user, bytes).
pub fn derive_file_id(user_id: &str, bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(user_id.as_bytes());
    hasher.update([0u8]);
    hasher.update(bytes);
    let digest = format!("{:x}", hasher.finalize());
    format!("doc-{}", &digest[..16])
}

/// Ingest one file into `store`.
///
/// `embedder` is `None` when embeddings are disabled; entries are then
/// stored without vectors.
pub async fn ingest_bytes(
    store: &dyn Store,
    embedder: Option<&dyn EmbeddingProvider>,
    config: &Config,
    request: IngestRequest<'_>,
) -> Result<IngestOutcome> {
    if !config.ingest.is_allowed(request.extension) {
        return Err(ExtractError::UnsupportedFormat(request.extension.to_string()).into());
    }

    let limit_bytes = config.ingest.max_file_size_mb * 1024 * 1024;
    if request.bytes.len() as u64 > limit_bytes {
        tracing::warn!(
            size_mb = format!("{:.1}", request.bytes.len() as f64 / (1024.0 * 1024.0)),
            limit_mb = config.ingest.max_file_size_mb,
            "file is above the size limit, ingesting anyway"
        );
    }

    let text = extract::extract(request.bytes, request.extension)?;
    if text.trim().is_empty() {
        bail!("No text could be extracted from the document");
    }

    let chunks = chunk::split(&text, config.chunking.max_chunk_size);
    let file_id = request
        .file_id
        .clone()
        .unwrap_or_else(|| derive_file_id(request.user_id, request.bytes));

    let document = Document {
        file_id: file_id.clone(),
        user_id: request.user_id.to_string(),
        title: request.title.clone(),
        origin: request.origin.clone(),
        uploaded_at: chrono::Utc::now().timestamp(),
    };

    if store.create_document(&document).await? == DocumentInsert::AlreadyExists {
        tracing::info!(file_id = %file_id, user_id = request.user_id, "document already exists");
        return Ok(IngestOutcome::AlreadyExists { file_id });
    }

    if let Err(e) = store.create_chunks(&file_id, &chunks).await {
        // Do not leave a document behind that can never be analyzed.
        if let Err(cleanup) = store.delete_document(&file_id).await {
            tracing::warn!(file_id = %file_id, error = %cleanup, "failed to remove partial document");
        }
        return Err(e.context(format!("Failed to store chunks for {}", file_id)));
    }

    let vectors = match embedder {
        Some(provider) => {
            embed_cmd::embed_inline(provider, &chunks, config.embedding.batch_size).await
        }
        None => vec![None; chunks.len()],
    };
    let embedded = vectors.iter().filter(|v| v.is_some()).count();

    let entries: Vec<NewKnowledgeEntry> = chunks
        .iter()
        .zip(vectors)
        .map(|(content, embedding)| NewKnowledgeEntry {
            user_id: request.user_id.to_string(),
            document_id: file_id.clone(),
            title: chunk::make_title(content, config.ingest.title_chars),
            content: content.clone(),
            embedding,
        })
        .collect();
    let inserted = store
        .insert_knowledge_entries(&entries)
        .await
        .with_context(|| format!("Failed to store knowledge entries for {}", file_id))?;

    tracing::info!(file_id = %file_id, chunks = chunks.len(), embedded, "document ingested");

    Ok(IngestOutcome::Ingested(IngestSummary {
        file_id,
        chunks: chunks.len(),
        entries: inserted,
        embedded,
    }))
}

/// `digest ingest <path>`.
pub async fn run_ingest(
    config: &Config,
    path: &Path,
    user_id: &str,
    title: Option<String>,
    file_id: Option<String>,
    origin: Option<String>,
) -> Result<()> {
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read file: {}", path.display()))?;
    let extension = extract::extension_of(path).unwrap_or_default();
    let title = title.or_else(|| {
        path.file_name()
            .and_then(|n| n.to_str())
            .map(|n| n.to_string())
    });
    let origin = origin.unwrap_or_else(|| path.display().to_string());

    let provider = if config.embedding.is_enabled() {
        match embedding::create_provider(&config.embedding) {
            Ok(p) => Some(p),
            Err(e) => {
                eprintln!("Warning: could not create embedding provider: {}", e);
                None
            }
        }
    } else {
        None
    };

    let pool = db::connect(config).await?;
    let store = SqliteStore::new(pool.clone());

    let outcome = ingest_bytes(
        &store,
        provider.as_deref(),
        config,
        IngestRequest {
            user_id,
            bytes: &bytes,
            extension: &extension,
            title,
            file_id,
            origin,
        },
    )
    .await
    .with_context(|| format!("Failed to ingest {}", path.display()))?;

    match outcome {
        IngestOutcome::Ingested(summary) => {
            println!("ingest {}", path.display());
            println!("  file id: {}", summary.file_id);
            println!("  chunks: {}", summary.chunks);
            println!("  knowledge entries: {}", summary.entries);
            if config.embedding.is_enabled() {
                println!("  embeddings written: {}", summary.embedded);
                println!(
                    "  embeddings pending: {}",
                    summary.entries - summary.embedded
                );
            }
            println!("ok");
        }
        IngestOutcome::AlreadyExists { file_id } => {
            println!("ingest {}", path.display());
            println!("  already exists: {}", file_id);
        }
    }

    pool.close().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use doc_digest_core::store::memory::InMemoryStore;

    fn config() -> Config {
        toml::from_str("[db]\npath = \"unused.sqlite\"\n[chunking]\nmax_chunk_size = 40\n").unwrap()
    }

    fn request<'a>(bytes: &'a [u8], extension: &'a str, title: &str) -> IngestRequest<'a> {
        IngestRequest {
            user_id: "u1",
            bytes,
            extension,
            title: Some(title.to_string()),
            file_id: None,
            origin: format!("/tmp/{}", title),
        }
    }

    struct UnitEmbedder;

    #[async_trait]
    impl EmbeddingProvider for UnitEmbedder {
        fn model_name(&self) -> &str {
            "unit"
        }
        fn dims(&self) -> usize {
            1
        }
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|_| vec![1.0]).collect())
        }
    }

    #[test]
    fn test_file_id_depends_on_user_and_content() {
        let a = derive_file_id("u1", b"hello");
        assert!(a.starts_with("doc-"));
        assert_eq!(a.len(), 20);
        assert_eq!(a, derive_file_id("u1", b"hello"));
        assert_ne!(a, derive_file_id("u2", b"hello"));
        assert_ne!(a, derive_file_id("u1", b"hello!"));
    }

    #[tokio::test]
    async fn test_ingest_creates_chunks_and_entries() {
        let store = InMemoryStore::new();
        let text = b"First paragraph here.\n\nSecond paragraph is here too.";
        let outcome = ingest_bytes(&store, Some(&UnitEmbedder), &config(), request(text, "txt", "a.txt"))
            .await
            .unwrap();

        let summary = match outcome {
            IngestOutcome::Ingested(s) => s,
            other => panic!("unexpected outcome: {:?}", other),
        };
        assert_eq!(summary.chunks, 2);
        assert_eq!(summary.embedded, 2);

        let chunks = store.list_chunks(&summary.file_id).await.unwrap();
        assert_eq!(chunks[0].content, "First paragraph here.");
        assert!(chunks.iter().all(|c| !c.processed));
        let entries = store
            .list_knowledge_entries(&[summary.file_id.clone()])
            .await
            .unwrap();
        assert_eq!(entries.len(), 2);
    }

    #[tokio::test]
    async fn test_duplicate_upload_is_reported() {
        let store = InMemoryStore::new();
        let text = b"Same content.";
        ingest_bytes(&store, None, &config(), request(text, "txt", "a.txt"))
            .await
            .unwrap();
        let second = ingest_bytes(&store, None, &config(), request(text, "txt", "renamed.txt"))
            .await
            .unwrap();
        assert!(matches!(second, IngestOutcome::AlreadyExists { .. }));

        let same_title = ingest_bytes(&store, None, &config(), request(b"Other.", "txt", "a.txt"))
            .await
            .unwrap();
        assert!(matches!(same_title, IngestOutcome::AlreadyExists { .. }));
        assert_eq!(store.list_documents("u1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_rejections_write_nothing() {
        let store = InMemoryStore::new();

        let err = ingest_bytes(&store, None, &config(), request(b"MZ", "exe", "a.exe"))
            .await
            .unwrap_err();
        assert!(err.downcast_ref::<ExtractError>().is_some());

        let err = ingest_bytes(&store, None, &config(), request(b"  \n\n ", "txt", "blank.txt"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("No text"));

        assert!(store.list_documents("u1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_oversized_file_is_still_ingested() {
        let store = InMemoryStore::new();
        let config: Config =
            toml::from_str("[db]\npath = \"unused.sqlite\"\n[ingest]\nmax_file_size_mb = 0\n")
                .unwrap();
        let outcome = ingest_bytes(&store, None, &config, request(b"Big text.", "txt", "big.txt"))
            .await
            .unwrap();
        assert!(matches!(outcome, IngestOutcome::Ingested(ref s) if s.chunks == 1));
    }

    #[tokio::test]
    async fn test_without_embedder_entries_wait_for_backfill() {
        let store = InMemoryStore::new();
        let outcome = ingest_bytes(&store, None, &config(), request(b"Some text.", "md", "n.md"))
            .await
            .unwrap();
        assert!(matches!(outcome, IngestOutcome::Ingested(ref s) if s.embedded == 0));
        assert_eq!(store.list_unembedded_entries(None).await.unwrap().len(), 1);
    }
}
