//! Question answering over a user's documents.
//!
//! ```text
//! question ─▶ retrieve top-K knowledge entries of the selected documents
//!          ─▶ "Context: …\nQuestion: …" ─▶ completion model ─▶ answer
//! ```

use anyhow::{bail, Context, Result};

use doc_digest_core::completion::{CompletionModel, CompletionOptions, CompletionRequest};
use doc_digest_core::retrieve::retrieve;
use doc_digest_core::store::Store;

use crate::completion;
use crate::config::Config;
use crate::db;
use crate::embedding::{self, EmbeddingProvider};
use crate::sqlite_store::SqliteStore;

#[derive(Debug, Clone)]
pub struct Answer {
    pub text: String,
    /// Retrieved fragments, most similar first.
    pub fragments: Vec<String>,
}

/// Document ids the question is scoped to.
///
/// An empty selection means every document of the user. Ids the user does
/// not own are rejected.
pub async fn resolve_scope(
    store: &dyn Store,
    user_id: &str,
    selected: &[String],
) -> Result<Vec<String>> {
    let owned: Vec<String> = store
        .list_documents(user_id)
        .await?
        .into_iter()
        .map(|d| d.file_id)
        .collect();

    if selected.is_empty() {
        return Ok(owned);
    }
    for id in selected {
        if !owned.contains(id) {
            bail!("document not found: {}", id);
        }
    }
    Ok(selected.to_vec())
}

pub fn build_prompt(fragments: &[String], question: &str) -> String {
    format!("Context: {}\nQuestion: {}", fragments.join("\n\n"), question)
}

#[allow(clippy::too_many_arguments)]
pub async fn answer_question(
    store: &dyn Store,
    embedder: &dyn EmbeddingProvider,
    model: &dyn CompletionModel,
    user_id: &str,
    selected: &[String],
    question: &str,
    top_k: usize,
    qa_prompt: &str,
    options: &CompletionOptions,
) -> Result<Answer> {
    let scope = resolve_scope(store, user_id, selected).await?;
    if scope.is_empty() {
        bail!("No documents for user {}", user_id);
    }

    let candidates = store.list_knowledge_entries(&scope).await?;
    let fragments = retrieve(question, &candidates, embedder, top_k)
        .await
        .context("Failed to retrieve context")?;
    if fragments.is_empty() {
        bail!("No embedded knowledge entries for the selected documents. Run `digest embed pending`.");
    }
    tracing::debug!(fragments = fragments.len(), "retrieved context");

    let request = CompletionRequest::new(qa_prompt, &build_prompt(&fragments, question), options);
    let text = model
        .complete(&request)
        .await
        .context("Failed to answer question")?;

    Ok(Answer { text, fragments })
}

/// `digest ask`.
pub async fn run_ask(
    config: &Config,
    user_id: &str,
    documents: &[String],
    question: &str,
    top_k: Option<usize>,
) -> Result<()> {
    if !config.embedding.is_enabled() {
        bail!("Embedding provider is disabled. Set [embedding] provider in config.");
    }
    if !config.completion.is_enabled() {
        bail!("Completion provider is disabled. Set [completion] provider in config.");
    }
    let embedder = embedding::create_provider(&config.embedding)?;
    let model = completion::create_model(&config.completion)?;

    let pool = db::connect(config).await?;
    let store = SqliteStore::new(pool.clone());

    let answer = answer_question(
        &store,
        embedder.as_ref(),
        model.as_ref(),
        user_id,
        documents,
        question,
        top_k.unwrap_or(config.retrieval.top_k),
        &config.retrieval.qa_prompt,
        &config.completion.options(),
    )
    .await?;

    println!("{}", answer.text);

    pool.close().await;
    Ok(())
}
