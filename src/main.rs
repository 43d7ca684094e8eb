//! # doc-digest CLI (`digest`)
//!
//! ## Usage
//!
//! ```bash
//! digest --config ./config/digest.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `digest init` | Create the SQLite database and run schema migrations |
//! | `digest ingest <path> --user <id>` | Upload a document |
//! | `digest documents --user <id>` | List a user's documents with progress |
//! | `digest analyze --user <id>` | Analyze chunks and build reports |
//! | `digest status <file-id> --user U` | Show chunk progress for one document |
//! | `digest report <file-id> --user U` | Print a document's report |
//! | `digest reports --user <id>` | Print every report of a user |
//! | `digest ask --user <id> "<question>"` | Answer a question from the user's documents |
//! | `digest embed pending` | Backfill missing embeddings |
//! | `digest delete <file-id> --user U` | Remove a document and everything derived from it |
//! | `digest stats` | Database statistics |
//!
//! Logging goes to stderr and is controlled by `RUST_LOG`
//! (e.g. `RUST_LOG=doc_digest=debug`).

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use doc_digest::progress::ProgressMode;
use doc_digest::{
    analyze, ask, config, documents, embed_cmd, ingest, migrate, stats,
};

/// doc-digest: per-user document analysis and question answering.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/digest.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "digest",
    about = "doc-digest: analyze uploaded documents and answer questions about them",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/digest.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Idempotent: running it multiple times is safe.
    Init,

    /// Upload a document for a user.
    ///
    /// Extracts the text, splits it into chunks, and stores the chunks and
    /// their knowledge entries. Re-uploading the same file (or a file with
    /// the same title) is reported and leaves the stored copy untouched.
    Ingest {
        /// File to ingest (txt, md, pdf, docx, xlsx, rtf).
        path: PathBuf,

        /// Owner of the document.
        #[arg(long)]
        user: String,

        /// Title shown in listings. Defaults to the file name.
        #[arg(long)]
        title: Option<String>,

        /// Explicit file id. Defaults to a hash of user and content.
        #[arg(long)]
        file_id: Option<String>,

        /// Where the file came from. Defaults to the path.
        #[arg(long)]
        origin: Option<String>,
    },

    /// List a user's documents with analysis progress.
    Documents {
        #[arg(long)]
        user: String,
    },

    /// Analyze a user's documents and build their reports.
    ///
    /// Resumes where a previous run stopped; documents that already have a
    /// report are skipped.
    Analyze {
        #[arg(long)]
        user: String,

        /// Only analyze this document.
        #[arg(long)]
        document: Option<String>,

        /// Progress output on stderr. Defaults to human when stderr is a TTY.
        #[arg(long, value_enum)]
        progress: Option<ProgressArg>,
    },

    /// Show chunk progress for one document.
    Status {
        /// Document file id.
        file_id: String,

        /// Owner of the document.
        #[arg(long)]
        user: String,
    },

    /// Print a document's report.
    Report {
        /// Document file id.
        file_id: String,

        /// Owner of the document.
        #[arg(long)]
        user: String,
    },

    /// Print every report of a user.
    Reports {
        #[arg(long)]
        user: String,
    },

    /// Answer a question from a user's documents.
    Ask {
        /// The question.
        question: String,

        #[arg(long)]
        user: String,

        /// Restrict retrieval to these documents (repeatable).
        #[arg(long = "document")]
        documents: Vec<String>,

        /// Number of fragments to retrieve. Defaults to `retrieval.top_k`.
        #[arg(long)]
        top_k: Option<usize>,
    },

    /// Manage embedding vectors.
    Embed {
        #[command(subcommand)]
        action: EmbedAction,
    },

    /// Delete a document with its chunks, report, and knowledge entries.
    Delete {
        /// Document file id.
        file_id: String,

        /// Owner of the document.
        #[arg(long)]
        user: String,
    },

    /// Show database statistics.
    Stats,
}

#[derive(Subcommand)]
enum EmbedAction {
    /// Embed knowledge entries that have no vector yet.
    Pending {
        /// Maximum number of entries to embed in this run.
        #[arg(long)]
        limit: Option<usize>,

        /// Show counts without performing any embedding.
        #[arg(long)]
        dry_run: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ProgressArg {
    Off,
    Human,
    Json,
}

impl From<ProgressArg> for ProgressMode {
    fn from(arg: ProgressArg) -> Self {
        match arg {
            ProgressArg::Off => ProgressMode::Off,
            ProgressArg::Human => ProgressMode::Human,
            ProgressArg::Json => ProgressMode::Json,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Ingest {
            path,
            user,
            title,
            file_id,
            origin,
        } => {
            ingest::run_ingest(&cfg, &path, &user, title, file_id, origin).await?;
        }
        Commands::Documents { user } => {
            documents::run_documents(&cfg, &user).await?;
        }
        Commands::Analyze {
            user,
            document,
            progress,
        } => {
            let mode = progress
                .map(ProgressMode::from)
                .unwrap_or_else(ProgressMode::default_for_tty);
            analyze::run_analyze(&cfg, &user, document, mode).await?;
        }
        Commands::Status { file_id, user } => {
            documents::run_status(&cfg, &user, &file_id).await?;
        }
        Commands::Report { file_id, user } => {
            documents::run_report(&cfg, &user, &file_id).await?;
        }
        Commands::Reports { user } => {
            documents::run_reports(&cfg, &user).await?;
        }
        Commands::Ask {
            question,
            user,
            documents,
            top_k,
        } => {
            ask::run_ask(&cfg, &user, &documents, &question, top_k).await?;
        }
        Commands::Embed { action } => match action {
            EmbedAction::Pending { limit, dry_run } => {
                embed_cmd::run_embed_pending(&cfg, limit, dry_run).await?;
            }
        },
        Commands::Delete { file_id, user } => {
            documents::run_delete(&cfg, &user, &file_id).await?;
        }
        Commands::Stats => {
            stats::run_stats(&cfg).await?;
        }
    }

    Ok(())
}
