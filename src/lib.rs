//! # doc-digest
//!
//! Per-user document analysis and question answering.
//!
//! Users upload documents (txt, md, pdf, docx, xlsx, rtf). Each document is
//! split into chunks that a completion model analyzes one by one; the
//! responses are then folded into a single report by hierarchical
//! summarization. Every chunk is also stored as an embedded knowledge entry
//! so questions can be answered from the most similar fragments.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌─────────────┐   ┌──────────────┐
//! │  ingest  │──▶│   SQLite    │◀──│   analyze    │──▶ completion model
//! │ extract  │   │ documents   │   │ process +    │
//! │ + chunk  │   │ chunks      │   │ reduce       │
//! └────┬─────┘   │ summaries   │   └──────────────┘
//!      │         │ knowledge   │   ┌──────────────┐
//!      └────────▶│ _entries    │◀──│     ask      │──▶ embeddings + model
//!   embeddings   └─────────────┘   └──────────────┘
//! ```
//!
//! The storage-independent pipeline lives in the `doc-digest-core` crate;
//! this crate supplies SQLite storage, file extraction, the HTTP model
//! clients, configuration, and the `digest` CLI.
//!
//! ## Quick Start
//!
//! ```bash
//! digest init
//! digest ingest report.pdf --user alice
//! digest analyze --user alice
//! digest report doc-1a2b3c4d5e6f7a8b --user alice
//! digest ask --user alice "What are the payment terms?"
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`sqlite_store`] | SQLite implementation of the core `Store` trait |
//! | [`extract`] | Text extraction per file format |
//! | [`ingest`] | Upload handling: extract, chunk, store, embed |
//! | [`completion`] | OpenAI and YandexGPT completion clients |
//! | [`embedding`] | Embedding providers |
//! | [`embed_cmd`] | Inline embedding and backfill |
//! | [`analyze`] | Chunk analysis and report generation |
//! | [`progress`] | Analysis progress on stderr |
//! | [`ask`] | Retrieval-augmented question answering |
//! | [`documents`] | Listing, status, reports, deletion |
//! | [`stats`] | Database statistics |

pub mod analyze;
pub mod ask;
pub mod completion;
pub mod config;
pub mod db;
pub mod documents;
pub mod embed_cmd;
pub mod embedding;
pub mod extract;
pub mod ingest;
pub mod migrate;
pub mod progress;
pub mod sqlite_store;
pub mod stats;
