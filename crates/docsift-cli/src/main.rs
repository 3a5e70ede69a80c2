//! docsift - classify documents and extract their fields.
//!
//! Uploads are stored on disk and tracked in SQLite. Processing extracts the
//! text of each document and fills the field schema of its type, either from
//! a language model or from regular-expression templates.

mod commands;

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use docsift::config::LogFormat;
use docsift::model::{DocumentStatus, ProcessingMode};
use docsift::Config;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{fmt, EnvFilter, Layer, Registry};

#[derive(Parser)]
#[command(name = "docsift", version, about = "Document classification and field extraction")]
struct Cli {
    /// Configuration file (JSON). Built-in defaults are used when omitted.
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    /// Overrides the configured SQLite database file.
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Store one file for processing.
    Upload {
        file: PathBuf,
        /// Document type the file is expected to be.
        #[arg(long = "type", short = 't', default_value = "invoice")]
        expected_type: String,
    },

    /// Extract text and fields from an uploaded document.
    Process { document_id: i64 },

    /// Show a document and its extracted data.
    Show { document_id: i64 },

    /// List documents, newest first.
    List {
        #[arg(long)]
        status: Option<DocumentStatus>,
        #[arg(long = "type")]
        expected_type: Option<String>,
        #[arg(long)]
        mode: Option<ProcessingMode>,
        #[arg(long)]
        batch: Option<String>,
        #[arg(long, default_value_t = 100)]
        limit: u64,
        #[arg(long, default_value_t = 0)]
        offset: u64,
    },

    /// Work with batches of documents.
    Batch {
        #[command(subcommand)]
        command: BatchCommand,
    },

    /// Per-type outcome counts and averages.
    Stats,

    /// List the supported document types and their fields.
    Types,
}

#[derive(Subcommand)]
enum BatchCommand {
    /// Store several files as one batch.
    Upload {
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Expected type for every file, or `auto` to use each detected type.
        #[arg(long = "type", short = 't', default_value = docsift::upload::AUTO_TYPE)]
        expected_type: String,
    },

    /// Process batches on the worker pool and wait for them to finish.
    Run {
        #[arg(required = true)]
        batch_ids: Vec<String>,
        /// Print progress events to stderr as JSON lines.
        #[arg(long)]
        progress: bool,
    },

    /// Show the progress of a batch.
    Status { batch_id: String },

    /// List batches, newest first.
    List {
        #[arg(long, default_value_t = 100)]
        limit: u64,
        #[arg(long, default_value_t = 0)]
        offset: u64,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match cli.config {
        Some(ref path) => docsift::load_config(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => Config::default(),
    };
    if let Some(ref path) = cli.database {
        config.database_path = Some(path.to_string_lossy().to_string());
    }

    init_logging(&config)?;

    commands::run(cli.command, &config)
}

/// Installs the tracing subscriber. `RUST_LOG` wins over the configured
/// level. Output goes to stderr so stdout stays machine-readable.
fn init_logging(config: &Config) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    let fmt_layer: Box<dyn Layer<Registry> + Send + Sync> = match config.logging.format {
        LogFormat::Text => fmt::layer().with_writer(std::io::stderr).boxed(),
        LogFormat::Json => fmt::layer().json().with_writer(std::io::stderr).boxed(),
    };

    let subscriber = tracing_subscriber::registry().with(fmt_layer).with(filter);
    tracing::subscriber::set_global_default(subscriber)
        .context("installing tracing subscriber")?;
    tracing_log::LogTracer::init().context("bridging log records into tracing")?;

    Ok(())
}
