//! # GraphRAG CLI (`graphrag`)
//!
//! ## Usage
//!
//! ```bash
//! graphrag --config ./config/graphrag.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `graphrag init` | Create the SQLite database and schema |
//! | `graphrag extract <file>` | Print the extracted document as JSON |
//! | `graphrag chunk <file>` | Print the chunks a file would produce |
//! | `graphrag ingest <file>` | Extract, chunk, embed, store, and build the graph |
//! | `graphrag search "<query>"` | Rank stored chunks against a query |
//! | `graphrag ask "<question>"` | Answer a question from stored chunks |
//! | `graphrag serve` | Start the HTTP server |

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use graphrag::{config, ingest, migrate, search, server};

/// GraphRAG: ingest documents into a knowledge graph and answer questions
/// over them.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/graphrag.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "graphrag",
    about = "GraphRAG: document ingestion, knowledge-graph extraction and question answering",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/graphrag.toml")]
    config: PathBuf,

    /// Log at debug level (overridden by RUST_LOG).
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Idempotent; running it multiple times is safe.
    Init,

    /// Extract text from a file and print the document as JSON.
    Extract {
        file: PathBuf,

        /// File type: `pdf`, `txt` or `csv`. Inferred from the extension if omitted.
        #[arg(long = "type")]
        doc_type: Option<String>,
    },

    /// Show how a file would be chunked, without embedding or storing.
    Chunk {
        file: PathBuf,

        #[arg(long = "type")]
        doc_type: Option<String>,

        /// Override `[chunking].chunk_size` (characters).
        #[arg(long)]
        chunk_size: Option<usize>,

        /// Override `[chunking].overlap` (characters).
        #[arg(long)]
        overlap: Option<usize>,
    },

    /// Ingest a file: extract, chunk, embed, store, and extract its graph.
    Ingest {
        file: PathBuf,

        #[arg(long = "type")]
        doc_type: Option<String>,

        /// Store chunks only; skip entity and relationship extraction.
        #[arg(long)]
        skip_graph: bool,
    },

    /// Rank stored chunks by similarity to a query.
    Search {
        query: String,

        /// Maximum number of results (default `[retrieval].search_limit`).
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Answer a question from the most similar stored chunks.
    Ask {
        query: String,

        /// Number of chunks used as context (default `[retrieval].rag_limit`).
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Start the HTTP server on `[server].bind`.
    Serve,
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "graphrag=debug,graphrag_core=debug"
    } else {
        "graphrag=info,graphrag_core=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    // Extraction needs no config.
    if let Commands::Extract { file, doc_type } = &cli.command {
        ingest::run_extract(file, doc_type.as_deref())?;
        return Ok(());
    }

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Extract { .. } => {
            // Handled above (before config loading)
            unreachable!()
        }
        Commands::Chunk {
            file,
            doc_type,
            chunk_size,
            overlap,
        } => {
            ingest::run_chunk(&cfg, &file, doc_type.as_deref(), chunk_size, overlap)?;
        }
        Commands::Ingest {
            file,
            doc_type,
            skip_graph,
        } => {
            ingest::run_ingest(&cfg, &file, doc_type.as_deref(), skip_graph).await?;
        }
        Commands::Search { query, limit } => {
            search::run_search(&cfg, &query, limit).await?;
        }
        Commands::Ask { query, limit } => {
            search::run_ask(&cfg, &query, limit).await?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}
