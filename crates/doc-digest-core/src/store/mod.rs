//! Storage abstraction for doc-digest.
//!
//! The [`Store`] trait is the pipeline's contract with its persistence
//! collaborator. Its transaction boundaries are part of that contract:
//!
//! - [`create_chunks`](Store::create_chunks) commits a document's whole
//!   chunk batch at once, and only once.
//! - [`mark_chunk_processed`](Store::mark_chunk_processed) records a
//!   response and flips the `processed` flag in one commit.
//! - [`create_summary`](Store::create_summary) commits the final report.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{
    Chunk, Document, DocumentInsert, DocumentStatus, KnowledgeEntry, NewKnowledgeEntry, Summary,
};

/// Abstract storage backend.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`create_document`](Store::create_document) | Register a document unless the user already has it |
/// | [`get_document`](Store::get_document) | Fetch one document |
/// | [`list_documents`](Store::list_documents) | A user's documents, oldest first |
/// | [`delete_document`](Store::delete_document) | Remove a document and everything derived from it |
/// | [`create_chunks`](Store::create_chunks) | Batch insert a document's chunks |
/// | [`list_chunks`](Store::list_chunks) | A document's chunks in index order |
/// | [`mark_chunk_processed`](Store::mark_chunk_processed) | Attach a response to a chunk |
/// | [`create_summary`](Store::create_summary) | Store the final report |
/// | [`get_summary`](Store::get_summary) | Fetch the final report |
/// | [`insert_knowledge_entries`](Store::insert_knowledge_entries) | Store retrieval fragments |
/// | [`list_knowledge_entries`](Store::list_knowledge_entries) | Embedded fragments of some documents |
/// | [`list_unembedded_entries`](Store::list_unembedded_entries) | Fragments missing a vector |
/// | [`set_entry_embedding`](Store::set_entry_embedding) | Backfill a fragment's vector |
#[async_trait]
pub trait Store: Send + Sync {
    /// Register a document.
    ///
    /// Returns [`DocumentInsert::AlreadyExists`] without writing when the
    /// same user already owns a document with this file id or title.
    async fn create_document(&self, doc: &Document) -> Result<DocumentInsert>;

    async fn get_document(&self, file_id: &str) -> Result<Option<Document>>;

    async fn list_documents(&self, user_id: &str) -> Result<Vec<Document>>;

    /// Delete a document with its chunks, summary, and knowledge entries.
    ///
    /// Returns `false` if the document did not exist.
    async fn delete_document(&self, file_id: &str) -> Result<bool>;

    /// Insert all chunks of a document in one commit, indexed from zero.
    ///
    /// Fails if the document already has chunks: chunks are created once.
    async fn create_chunks(&self, document_id: &str, contents: &[String]) -> Result<Vec<Chunk>>;

    /// All chunks of a document ordered by `chunk_index`.
    async fn list_chunks(&self, document_id: &str) -> Result<Vec<Chunk>>;

    /// Record `response` for an unprocessed chunk and set `processed`.
    ///
    /// Returns `false`, without writing, if the chunk was already processed.
    async fn mark_chunk_processed(&self, chunk_id: i64, response: &str) -> Result<bool>;

    /// Store the document's summary.
    ///
    /// Returns `false`, without writing, if a summary already exists.
    async fn create_summary(&self, document_id: &str, text: &str) -> Result<bool>;

    async fn get_summary(&self, document_id: &str) -> Result<Option<Summary>>;

    async fn insert_knowledge_entries(&self, entries: &[NewKnowledgeEntry]) -> Result<usize>;

    /// Entries of the given documents that carry an embedding, in
    /// insertion order.
    async fn list_knowledge_entries(&self, document_ids: &[String])
        -> Result<Vec<KnowledgeEntry>>;

    /// Entries without an embedding, oldest first.
    async fn list_unembedded_entries(&self, limit: Option<usize>) -> Result<Vec<KnowledgeEntry>>;

    async fn set_entry_embedding(&self, entry_id: i64, vector: &[f32]) -> Result<()>;

    /// Chunk and summary progress for one document.
    async fn document_status(&self, file_id: &str) -> Result<Option<DocumentStatus>> {
        let document = match self.get_document(file_id).await? {
            Some(d) => d,
            None => return Ok(None),
        };
        let chunks = self.list_chunks(file_id).await?;
        let has_summary = self.get_summary(file_id).await?.is_some();
        Ok(Some(DocumentStatus {
            document,
            total_chunks: chunks.len(),
            processed_chunks: chunks.iter().filter(|c| c.processed).count(),
            has_summary,
        }))
    }
}
