//! `docent` command-line interface: upload documents, watch ingestion jobs and
//! ask questions grounded in the stored chunks.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use docent_core::Config;
use docent_core::config::resolve_config_path;

#[derive(Parser, Debug)]
#[command(name = "docent")]
#[command(about = "Document ingestion and retrieval-augmented answering")]
#[command(version)]
struct Cli {
    /// Path to config file (default: $DOCENT_CONFIG or config/default.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Upload a file and ingest it through the worker pool
    Ingest {
        path: PathBuf,

        /// Override the media type derived from the file extension
        #[arg(long)]
        content_type: Option<String>,

        /// Queue the job and exit; a later `docent worker` processes it
        #[arg(long)]
        no_wait: bool,
    },

    /// Show an ingestion job and the document it produced
    Status { task_id: i64 },

    /// List documents, newest first
    List,

    /// Show one document and its chunks
    Show {
        document_id: i64,

        /// Print chunk text as well as indices
        #[arg(long)]
        chunks: bool,
    },

    /// Delete a document and its chunks
    Delete { document_id: i64 },

    /// Nearest chunks for a question, without generation
    Search {
        question: String,

        #[arg(short = 'k', long)]
        top_k: Option<usize>,
    },

    /// Answer a question from the stored documents
    Ask {
        question: String,

        #[arg(short = 'k', long)]
        top_k: Option<usize>,

        /// Print the answer as it is generated
        #[arg(long)]
        stream: bool,
    },

    /// Fail documents stuck in `processing`
    Reconcile {
        /// Override `reconcile.stale_after_secs`
        #[arg(long)]
        stale_after_secs: Option<u64>,
    },

    /// Run ingestion workers until interrupted
    Worker,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_subscriber();

    let cli = Cli::parse();
    let config_path = resolve_config_path(cli.config.as_deref());
    let config = Config::load(&config_path)?;
    tracing::debug!(path = %config_path.display(), "configuration loaded");

    commands::run(cli.command, config).await
}

fn init_subscriber() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
