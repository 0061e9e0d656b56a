//! # chatmem CLI
//!
//! ## Usage
//!
//! ```bash
//! chatmem --config ./config/chatmem.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `chatmem init` | Create the SQLite database and run schema migrations |
//! | `chatmem import <file>` | Load JSON-lines messages into the database |
//! | `chatmem chunk <file>` | Preview chunks for a message file |
//! | `chatmem ingest` | Chunk new messages and upsert them into the vector index |
//! | `chatmem query "<text>"` | Retrieve selected, de-duplicated hits |

use chatmem::query::QueryArgs;
use chatmem::{chunk_cmd, config, import, ingest, logging, migrate, query};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// chatmem: conversation memory for AI assistants.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/chatmem.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "chatmem",
    about = "Conversation memory for AI assistants",
    version,
    long_about = "chatmem cuts chat history into overlapping, timestamp-tagged chunks, \
    de-duplicates them by content fingerprint, and stores them in a vector index. \
    Queries return a short list of relevant, recent, non-redundant chunks."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/chatmem.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file with the `messages` and
    /// `processed_chunks` tables. Running it again is safe.
    Init,

    /// Import messages from a JSON-lines file.
    ///
    /// Each line is `{"session_id", "ts", "role", "content"}`. Messages
    /// already present are skipped.
    Import {
        /// Path to the JSON-lines file.
        file: PathBuf,
    },

    /// Preview chunking of a JSON-lines message file.
    ///
    /// Reads no database and writes nothing.
    Chunk {
        /// Path to the JSON-lines file.
        file: PathBuf,

        /// Print the records as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Chunk new messages and upsert them into the vector index.
    ///
    /// Resumes from the last checkpoint unless `--since` is given.
    Ingest {
        /// Process messages at or after this time (ISO-8601 or YYYY-MM-DD).
        #[arg(long)]
        since: Option<String>,

        /// Maximum number of messages to process.
        #[arg(long)]
        limit: Option<usize>,

        /// Show counts and the first records without writing anything.
        #[arg(long)]
        dry_run: bool,
    },

    /// Search the vector index.
    Query {
        /// The query text.
        text: String,

        /// Number of raw hits requested from the index.
        #[arg(long)]
        top_k: Option<usize>,

        /// Minimum hits returned regardless of score.
        #[arg(long)]
        rmin: Option<usize>,

        /// Maximum hits returned.
        #[arg(long)]
        rmax: Option<usize>,

        /// Ask the index to rerank hits.
        #[arg(long)]
        rerank: bool,

        /// Metadata filter as JSON, passed to the index unchanged.
        #[arg(long)]
        filter: Option<String>,

        /// Print results as JSON.
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init();

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Import { file } => {
            import::run_import(&cfg, &file).await?;
        }
        Commands::Chunk { file, json } => {
            chunk_cmd::run_chunk_preview(&cfg, &file, json)?;
        }
        Commands::Ingest {
            since,
            limit,
            dry_run,
        } => {
            ingest::run_ingest_cmd(&cfg, since, limit, dry_run).await?;
        }
        Commands::Query {
            text,
            top_k,
            rmin,
            rmax,
            rerank,
            filter,
            json,
        } => {
            let args = QueryArgs {
                top_k,
                rmin,
                rmax,
                rerank,
                filter,
                json,
            };
            query::run_query_cmd(&cfg, &text, &args).await?;
        }
    }

    Ok(())
}
