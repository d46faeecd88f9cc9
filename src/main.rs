//! # doc-chat CLI (`docchat`)
//!
//! The `docchat` binary manages the documentation corpus and serves the
//! chat API.
//!
//! ## Usage
//!
//! ```bash
//! docchat --config ./config/docchat.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `docchat init` | Create the SQLite database and run schema migrations |
//! | `docchat import <path>` | Import a document file |
//! | `docchat chunk <document-id>` | Slice a document into overlapping chunks |
//! | `docchat import-chunks <dir>` | Bulk-import pre-chunked `.txt` files |
//! | `docchat list-chunks` | List stored chunks and their embedding status |
//! | `docchat embed pending` | Backfill missing embeddings |
//! | `docchat embed rebuild` | Delete and regenerate all embeddings |
//! | `docchat search "<query>"` | Rank stored chunks against a query |
//! | `docchat ask "<query>"` | Run one query through the chat pipeline |
//! | `docchat serve` | Start the HTTP API server |

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use doc_chat::{config, db, embed_cmd, ingest, migrate, pipeline, search, server};

/// doc-chat CLI — a retrieval-augmented chat backend for documentation Q&A.
#[derive(Parser)]
#[command(
    name = "docchat",
    about = "doc-chat — a retrieval-augmented chat backend for documentation Q&A",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/docchat.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and all required tables
    /// (documents, chunks, sessions, session_messages). Idempotent.
    Init,

    /// Import a document file into the corpus.
    Import {
        /// Path to the document file (markdown or plain text).
        path: PathBuf,
    },

    /// Slice a document into overlapping chunks.
    ///
    /// Replaces any existing chunks for the document. Embeddings are
    /// attached separately with `embed pending`.
    Chunk {
        /// Document UUID (printed by `import`).
        document_id: String,

        /// Override the chunk window size from config (characters).
        #[arg(long)]
        chunk_size: Option<usize>,

        /// Override the window overlap from config (characters).
        #[arg(long)]
        overlap: Option<usize>,
    },

    /// Bulk-import pre-chunked `.txt` files from a directory tree.
    ImportChunks {
        /// Directory containing chunk files.
        dir: PathBuf,
    },

    /// List stored chunks and their embedding status.
    ListChunks {
        /// Only list chunks belonging to this document.
        #[arg(long)]
        document: Option<String>,
    },

    /// Manage embedding vectors.
    Embed {
        #[command(subcommand)]
        action: EmbedAction,
    },

    /// Rank stored chunks against a query and print the results.
    Search {
        /// The search query string.
        query: String,

        /// Maximum number of results to return.
        #[arg(long)]
        top_k: Option<usize>,
    },

    /// Run one query through the chat pipeline and print the answer.
    Ask {
        /// The question to answer.
        query: String,

        /// Chat session id for history tracking.
        #[arg(long)]
        session: Option<String>,
    },

    /// Start the HTTP API server.
    Serve,
}

/// Embedding management subcommands.
#[derive(Subcommand)]
enum EmbedAction {
    /// Embed chunks that are missing embeddings.
    Pending {
        /// Maximum number of chunks to embed in this run.
        #[arg(long)]
        limit: Option<usize>,

        /// Number of chunks to embed between pauses.
        #[arg(long, default_value_t = 10)]
        batch_size: usize,

        /// Pause in seconds between batches, to stay under rate limits.
        #[arg(long, default_value_t = 1)]
        pause: u64,

        /// Show counts without performing any embedding.
        #[arg(long)]
        dry_run: bool,
    },

    /// Delete and regenerate all embeddings.
    Rebuild {
        /// Number of chunks to embed between pauses.
        #[arg(long, default_value_t = 10)]
        batch_size: usize,

        /// Pause in seconds between batches, to stay under rate limits.
        #[arg(long, default_value_t = 1)]
        pause: u64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Import { path } => {
            ingest::run_import(&cfg, &path).await?;
        }
        Commands::Chunk {
            document_id,
            chunk_size,
            overlap,
        } => {
            ingest::run_chunk(&cfg, &document_id, chunk_size, overlap).await?;
        }
        Commands::ImportChunks { dir } => {
            ingest::run_import_chunks(&cfg, &dir).await?;
        }
        Commands::ListChunks { document } => {
            ingest::run_list_chunks(&cfg, document.as_deref()).await?;
        }
        Commands::Embed { action } => match action {
            EmbedAction::Pending {
                limit,
                batch_size,
                pause,
                dry_run,
            } => {
                embed_cmd::run_embed_pending(&cfg, limit, batch_size, pause, dry_run).await?;
            }
            EmbedAction::Rebuild { batch_size, pause } => {
                embed_cmd::run_embed_rebuild(&cfg, batch_size, pause).await?;
            }
        },
        Commands::Search { query, top_k } => {
            let pool = db::connect(&cfg).await?;
            search::run_search(&cfg, pool, &query, top_k).await?;
        }
        Commands::Ask { query, session } => {
            let pool = db::connect(&cfg).await?;
            let (chat, _sessions) = pipeline::build_pipeline(&cfg, pool);
            let outcome = chat.process(&query, session.as_deref()).await;

            println!("{}", outcome.response);
            if !outcome.fragments.is_empty() {
                println!();
                println!("Sources:");
                for fragment in &outcome.fragments {
                    println!("  {} — {}", fragment.title, fragment.path);
                }
            }
        }
        Commands::Serve => {
            let pool = db::connect(&cfg).await?;
            let (chat, sessions) = pipeline::build_pipeline(&cfg, pool);
            server::run_server(&cfg, chat, sessions).await?;
        }
    }

    Ok(())
}
