//! In-memory [`Store`] implementation for tests and embedding in other tools.
//!
//! All tables live behind one `std::sync::RwLock`, so every operation is
//! atomic with respect to the others.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;

use crate::models::{
    Chunk, Document, DocumentInsert, KnowledgeEntry, NewKnowledgeEntry, Summary,
};

use super::Store;

#[derive(Default)]
struct Tables {
    documents: Vec<Document>,
    chunks: Vec<Chunk>,
    summaries: HashMap<String, Summary>,
    entries: Vec<KnowledgeEntry>,
    next_chunk_id: i64,
    next_entry_id: i64,
}

/// In-memory store.
#[derive(Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Tables>> {
        self.tables
            .read()
            .map_err(|_| anyhow!("in-memory store lock poisoned"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Tables>> {
        self.tables
            .write()
            .map_err(|_| anyhow!("in-memory store lock poisoned"))
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn create_document(&self, doc: &Document) -> Result<DocumentInsert> {
        let mut t = self.write()?;
        let duplicate = t.documents.iter().any(|d| {
            d.file_id == doc.file_id
                || (d.user_id == doc.user_id && doc.title.is_some() && d.title == doc.title)
        });
        if duplicate {
            return Ok(DocumentInsert::AlreadyExists);
        }
        t.documents.push(doc.clone());
        Ok(DocumentInsert::Created)
    }

    async fn get_document(&self, file_id: &str) -> Result<Option<Document>> {
        let t = self.read()?;
        Ok(t.documents.iter().find(|d| d.file_id == file_id).cloned())
    }

    async fn list_documents(&self, user_id: &str) -> Result<Vec<Document>> {
        let t = self.read()?;
        Ok(t.documents
            .iter()
            .filter(|d| d.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn delete_document(&self, file_id: &str) -> Result<bool> {
        let mut t = self.write()?;
        let before = t.documents.len();
        t.documents.retain(|d| d.file_id != file_id);
        if t.documents.len() == before {
            return Ok(false);
        }
        t.chunks.retain(|c| c.document_id != file_id);
        t.entries.retain(|e| e.document_id != file_id);
        t.summaries.remove(file_id);
        Ok(true)
    }

    async fn create_chunks(&self, document_id: &str, contents: &[String]) -> Result<Vec<Chunk>> {
        let mut t = self.write()?;
        if !t.documents.iter().any(|d| d.file_id == document_id) {
            bail!("document not found: {}", document_id);
        }
        if t.chunks.iter().any(|c| c.document_id == document_id) {
            bail!("chunks already exist for document {}", document_id);
        }

        let mut created = Vec::with_capacity(contents.len());
        for (index, content) in contents.iter().enumerate() {
            t.next_chunk_id += 1;
            let chunk = Chunk {
                id: t.next_chunk_id,
                document_id: document_id.to_string(),
                chunk_index: index as i64,
                content: content.clone(),
                ai_response: None,
                processed: false,
            };
            t.chunks.push(chunk.clone());
            created.push(chunk);
        }
        Ok(created)
    }

    async fn list_chunks(&self, document_id: &str) -> Result<Vec<Chunk>> {
        let t = self.read()?;
        let mut chunks: Vec<Chunk> = t
            .chunks
            .iter()
            .filter(|c| c.document_id == document_id)
            .cloned()
            .collect();
        chunks.sort_by_key(|c| c.chunk_index);
        Ok(chunks)
    }

    async fn mark_chunk_processed(&self, chunk_id: i64, response: &str) -> Result<bool> {
        let mut t = self.write()?;
        let chunk = t
            .chunks
            .iter_mut()
            .find(|c| c.id == chunk_id)
            .ok_or_else(|| anyhow!("chunk not found: {}", chunk_id))?;
        if chunk.processed {
            return Ok(false);
        }
        chunk.ai_response = Some(response.to_string());
        chunk.processed = true;
        Ok(true)
    }

    async fn create_summary(&self, document_id: &str, text: &str) -> Result<bool> {
        let mut t = self.write()?;
        if t.summaries.contains_key(document_id) {
            return Ok(false);
        }
        t.summaries.insert(
            document_id.to_string(),
            Summary {
                document_id: document_id.to_string(),
                text: text.to_string(),
                created_at: chrono::Utc::now().timestamp(),
            },
        );
        Ok(true)
    }

    async fn get_summary(&self, document_id: &str) -> Result<Option<Summary>> {
        let t = self.read()?;
        Ok(t.summaries.get(document_id).cloned())
    }

    async fn insert_knowledge_entries(&self, entries: &[NewKnowledgeEntry]) -> Result<usize> {
        let mut t = self.write()?;
        for e in entries {
            t.next_entry_id += 1;
            let id = t.next_entry_id;
            t.entries.push(KnowledgeEntry {
                id,
                user_id: e.user_id.clone(),
                document_id: e.document_id.clone(),
                title: e.title.clone(),
                content: e.content.clone(),
                embedding: e.embedding.clone(),
            });
        }
        Ok(entries.len())
    }

    async fn list_knowledge_entries(
        &self,
        document_ids: &[String],
    ) -> Result<Vec<KnowledgeEntry>> {
        let t = self.read()?;
        Ok(t.entries
            .iter()
            .filter(|e| e.embedding.is_some() && document_ids.contains(&e.document_id))
            .cloned()
            .collect())
    }

    async fn list_unembedded_entries(&self, limit: Option<usize>) -> Result<Vec<KnowledgeEntry>> {
        let t = self.read()?;
        Ok(t.entries
            .iter()
            .filter(|e| e.embedding.is_none())
            .take(limit.unwrap_or(usize::MAX))
            .cloned()
            .collect())
    }

    async fn set_entry_embedding(&self, entry_id: i64, vector: &[f32]) -> Result<()> {
        let mut t = self.write()?;
        let entry = t
            .entries
            .iter_mut()
            .find(|e| e.id == entry_id)
            .ok_or_else(|| anyhow!("knowledge entry not found: {}", entry_id))?;
        entry.embedding = Some(vector.to_vec());
        Ok(())
    }
}
