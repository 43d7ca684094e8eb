//! Core data models shared by the pipeline and its stores.
//!
//! These types represent the documents, chunks, summaries, and knowledge
//! entries that flow through ingestion, analysis, and retrieval.

use serde::Serialize;

/// A user-owned text source, keyed by an external file identifier.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Document {
    /// Unique external identifier (primary key).
    pub file_id: String,
    /// Owner. Documents are never shared across users.
    pub user_id: String,
    /// Optional display title (usually the original file name).
    pub title: Option<String>,
    /// Where the document came from (source-storage path or local path).
    pub origin: String,
    /// Upload time, unix seconds.
    pub uploaded_at: i64,
}

impl Document {
    /// Title if present, otherwise the file id.
    pub fn display_name(&self) -> &str {
        self.title.as_deref().unwrap_or(&self.file_id)
    }
}

/// An ordered slice of a document's text, the unit of model analysis.
///
/// `processed` is true iff `ai_response` has been durably recorded.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Chunk {
    /// Store-assigned identifier, used for the one-time mutation.
    pub id: i64,
    pub document_id: String,
    /// Zero-based position within the document.
    pub chunk_index: i64,
    pub content: String,
    pub ai_response: Option<String>,
    pub processed: bool,
}

/// The final reduced report for a document. At most one per document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub document_id: String,
    pub text: String,
    pub created_at: i64,
}

/// An embeddable text fragment used for similarity retrieval.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KnowledgeEntry {
    pub id: i64,
    pub user_id: String,
    pub document_id: String,
    /// Derived from a prefix of `content`.
    pub title: String,
    pub content: String,
    /// `None` when embedding failed; such entries are skipped by retrieval.
    #[serde(skip_serializing)]
    pub embedding: Option<Vec<f32>>,
}

/// A knowledge entry before the store assigns it an id.
#[derive(Debug, Clone)]
pub struct NewKnowledgeEntry {
    pub user_id: String,
    pub document_id: String,
    pub title: String,
    pub content: String,
    pub embedding: Option<Vec<f32>>,
}

/// Result of trying to register a new document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentInsert {
    Created,
    /// The user already owns a document with the same file id or title.
    AlreadyExists,
}

/// Progress view over one document's chunks and summary.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentStatus {
    pub document: Document,
    pub total_chunks: usize,
    pub processed_chunks: usize,
    pub has_summary: bool,
}

impl DocumentStatus {
    pub fn is_fully_processed(&self) -> bool {
        self.total_chunks > 0 && self.processed_chunks == self.total_chunks
    }
}
