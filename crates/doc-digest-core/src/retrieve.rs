//! Similarity retrieval over knowledge entries.
//!
//! The retriever only ranks. Callers are responsible for restricting the
//! candidate set to the documents a user selected; no authorization
//! happens here.
//!
//! # Ranking
//!
//! 1. Embed the question (skipped when there are no candidates).
//! 2. Drop candidates without a vector.
//! 3. Score the rest by cosine similarity to the question vector.
//! 4. Stable sort by score, descending: equal scores keep candidate order.
//! 5. Return the `content` of the first `top_k`.

use std::cmp::Ordering;

use anyhow::Result;

use crate::embedding::{cosine_similarity, EmbeddingProvider};
use crate::models::KnowledgeEntry;

/// Default number of fragments returned for a question.
pub const DEFAULT_TOP_K: usize = 5;

/// A candidate paired with its similarity to the query.
#[derive(Debug, Clone)]
pub struct ScoredEntry<'a> {
    pub entry: &'a KnowledgeEntry,
    pub score: f32,
}

/// Rank `candidates` against an already computed query vector.
pub fn rank<'a>(
    query_vec: &[f32],
    candidates: &'a [KnowledgeEntry],
    top_k: usize,
) -> Vec<ScoredEntry<'a>> {
    let mut scored: Vec<ScoredEntry<'a>> = candidates
        .iter()
        .filter_map(|entry| {
            entry.embedding.as_deref().map(|vec| ScoredEntry {
                entry,
                score: cosine_similarity(query_vec, vec),
            })
        })
        .collect();

    scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
    scored.truncate(top_k);
    scored
}

/// Embed `question` and return the contents of the `top_k` most similar
/// candidates, most similar first.
pub async fn retrieve(
    question: &str,
    candidates: &[KnowledgeEntry],
    embedder: &dyn EmbeddingProvider,
    top_k: usize,
) -> Result<Vec<String>> {
    if top_k == 0 || !candidates.iter().any(|c| c.embedding.is_some()) {
        return Ok(Vec::new());
    }

    let query_vec = embedder.embed_one(question).await?;
    let ranked = rank(&query_vec, candidates, top_k);
    tracing::debug!(
        candidates = candidates.len(),
        returned = ranked.len(),
        "ranked knowledge entries"
    );

    Ok(ranked.into_iter().map(|s| s.entry.content.clone()).collect())
}
