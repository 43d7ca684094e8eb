//! Embedding of knowledge entries, inline during ingest and as a backfill.
//!
//! Embedding is never fatal. A fragment whose vector could not be computed
//! is stored with a null embedding, skipped by retrieval, and picked up by
//! `digest embed pending` later.

use anyhow::{bail, Result};

use doc_digest_core::store::Store;

use crate::config::Config;
use crate::db;
use crate::embedding::{self, EmbeddingProvider};
use crate::sqlite_store::SqliteStore;

/// Embed `texts` in batches of `batch_size`.
///
/// Returns one slot per input text. When a batch call fails, its texts are
/// retried one by one so a single bad fragment only loses its own vector.
pub async fn embed_inline(
    provider: &dyn EmbeddingProvider,
    texts: &[String],
    batch_size: usize,
) -> Vec<Option<Vec<f32>>> {
    let mut out = Vec::with_capacity(texts.len());

    for batch in texts.chunks(batch_size.max(1)) {
        match provider.embed(batch).await {
            Ok(vectors) if vectors.len() == batch.len() => {
                out.extend(vectors.into_iter().map(Some));
            }
            Ok(vectors) => {
                tracing::warn!(
                    returned = vectors.len(),
                    expected = batch.len(),
                    "embedding batch size mismatch, retrying per text"
                );
                out.extend(embed_each(provider, batch).await);
            }
            Err(e) => {
                tracing::debug!(error = %e, size = batch.len(), "batch embedding failed, retrying per text");
                out.extend(embed_each(provider, batch).await);
            }
        }
    }

    out
}

async fn embed_each(provider: &dyn EmbeddingProvider, texts: &[String]) -> Vec<Option<Vec<f32>>> {
    let mut out = Vec::with_capacity(texts.len());
    for text in texts {
        match provider.embed_one(text).await {
            Ok(vec) => out.push(Some(vec)),
            Err(e) => {
                tracing::warn!(error = %e, "fragment embedding failed");
                out.push(None);
            }
        }
    }
    out
}

/// Counts from one backfill run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BackfillReport {
    pub total: usize,
    pub embedded: usize,
    pub failed: usize,
}

/// Compute vectors for knowledge entries stored without one.
///
/// Failures are per entry, as in [`embed_inline`]: an entry that cannot be
/// embedded stays pending without holding back the rest of its batch.
pub async fn backfill_pending(
    store: &dyn Store,
    provider: &dyn EmbeddingProvider,
    limit: Option<usize>,
    batch_size: usize,
) -> Result<BackfillReport> {
    let pending = store.list_unembedded_entries(limit).await?;
    let mut report = BackfillReport {
        total: pending.len(),
        ..Default::default()
    };

    let texts: Vec<String> = pending.iter().map(|e| e.content.clone()).collect();
    let vectors = embed_inline(provider, &texts, batch_size).await;

    for (entry, vector) in pending.iter().zip(vectors) {
        match vector {
            Some(vec) => {
                store.set_entry_embedding(entry.id, &vec).await?;
                report.embedded += 1;
            }
            None => report.failed += 1,
        }
    }

    Ok(report)
}

/// `digest embed pending`.
pub async fn run_embed_pending(config: &Config, limit: Option<usize>, dry_run: bool) -> Result<()> {
    if !config.embedding.is_enabled() {
        bail!("Embedding provider is disabled. Set [embedding] provider in config.");
    }

    let pool = db::connect(config).await?;
    let store = SqliteStore::new(pool.clone());

    if dry_run {
        let pending = store.list_unembedded_entries(limit).await?;
        println!("embed pending (dry-run)");
        println!("  entries needing embeddings: {}", pending.len());
        pool.close().await;
        return Ok(());
    }

    let provider = embedding::create_provider(&config.embedding)?;
    let report =
        backfill_pending(&store, provider.as_ref(), limit, config.embedding.batch_size).await?;

    println!("embed pending");
    if report.total == 0 {
        println!("  all knowledge entries up to date");
    } else {
        println!("  total pending: {}", report.total);
        println!("  embedded: {}", report.embedded);
        println!("  failed: {}", report.failed);
    }

    pool.close().await;
    Ok(())
}
