//! # doc-digest core
//!
//! The document analysis pipeline without any I/O of its own: data models,
//! chunking, the embedding and completion capabilities, similarity
//! retrieval, resumable per-chunk analysis, hierarchical summarization, and
//! the [`Store`](store::Store) abstraction with an in-memory implementation.
//!
//! ```text
//! raw text ─▶ chunk::split ─▶ Store::create_chunks
//!                                   │
//!                 process::process_document (one model call per chunk)
//!                                   │
//!                      reduce::reduce (groups of ≤ M, then merge)
//!                                   │
//!                          Store::create_summary
//! ```
//!
//! This crate contains no sqlx, HTTP client, or filesystem code. SQLite
//! persistence and the HTTP providers live in the `doc-digest` app crate.

pub mod chunk;
pub mod completion;
pub mod embedding;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod process;
pub mod reduce;
pub mod retrieve;
pub mod store;

#[cfg(test)]
pub(crate) mod testing;
