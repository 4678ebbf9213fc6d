//! Aura CLI — chunk documents and run retrieval queries from the terminal.

mod commands;

use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Aura: retrieval and context assembly for document question answering
#[derive(Parser, Debug)]
#[command(name = "aura", version, about, long_about = None)]
struct Cli {
    /// Workspace directory (holds `.aura/config.toml`)
    #[arg(short, long, default_value = ".")]
    workspace: PathBuf,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
pub enum Commands {
    /// Chunk a text file and print the chunks
    Chunk {
        /// File to chunk
        file: PathBuf,

        /// Target chunk size in tokens
        #[arg(long)]
        chunk_size: Option<usize>,

        /// Overlap between chunks in tokens
        #[arg(long)]
        overlap: Option<usize>,

        /// Chunk at detailed, standard and summary granularity
        #[arg(long)]
        hierarchical: bool,

        /// Print chunks as JSON
        #[arg(long)]
        json: bool,
    },
    /// Index a directory of documents and answer a query from it
    Query {
        /// Natural-language query
        query: String,

        /// Directory of .txt / .md documents to index
        #[arg(short, long)]
        docs: PathBuf,

        /// Category assigned to every indexed document
        #[arg(long)]
        category: Option<String>,

        /// Maximum chunks in the final selection
        #[arg(long)]
        max_chunks: Option<usize>,

        /// Print the full result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(clap::Subcommand, Debug)]
pub enum ConfigAction {
    /// Write a default config file to the workspace
    Init,
    /// Print the effective configuration
    Show,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // Set up tracing: human-readable stderr + JSON file logging
    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::new(filter));

    let log_dir = directories::ProjectDirs::from("dev", "aura", "aura")
        .map(|d| d.data_dir().join("logs"))
        .unwrap_or_else(|| PathBuf::from("."));
    let _ = std::fs::create_dir_all(&log_dir);
    let file_appender = tracing_appender::rolling::daily(&log_dir, "aura.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let json_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(non_blocking)
        .with_filter(EnvFilter::new("debug"));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let workspace = cli
        .workspace
        .canonicalize()
        .unwrap_or_else(|_| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));

    commands::handle_command(cli.command, &workspace).await
}
