//! CLI binary for pw3query.
//!
//! Runs the dispatcher or the worker against the local file-backed blob
//! store and queue under the configured data directory. All tracing output
//! goes to stderr; reports are printed to stdout.

use clap::{Parser, Subcommand};
use pw3_search::PublicWwwEngine;
use pw3query::queue::{FileQueue, MessageQueue};
use pw3query::store::{BlobStore, FsBlobStore};
use pw3query::{DispatchEvent, Dispatcher, PipelineConfig, Worker, WorkerOutcome};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Fan out PublicWWW query packs and store normalised results.
#[derive(Parser)]
#[command(name = "pw3query", version, about)]
struct Cli {
    /// Path to TOML configuration file.
    #[arg(short, long, env = "PW3QUERY_CONFIG")]
    config: Option<PathBuf>,

    /// Override the data directory for the local store and queue.
    #[arg(long, env = "PW3QUERY_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Subcommand to run.
    #[command(subcommand)]
    command: Command,
}

/// Available commands.
#[derive(Subcommand)]
enum Command {
    /// Enqueue every query from the notified packs, or sweep all packs.
    Dispatch {
        /// JSON event file with storage-change records. Omit to sweep.
        #[arg(long)]
        event: Option<PathBuf>,
    },

    /// Process one queued query.
    Work {
        /// Keep processing until the queue is empty.
        #[arg(long)]
        drain: bool,
    },

    /// Show queue depth.
    Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Users can override with RUST_LOG=debug to see everything.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("pw3query=info,pw3_search=info")),
        )
        .init();

    let cli = Cli::parse();

    let mut config = match cli.config {
        Some(ref path) => PipelineConfig::from_file(path)?,
        None => {
            let path = PipelineConfig::default_config_path();
            if path.exists() {
                PipelineConfig::from_file(&path)?
            } else {
                PipelineConfig::default()
            }
        }
    };
    config.apply_env();
    if let Some(dir) = cli.data_dir {
        config.data_dir = dir;
    }

    if let Err(e) = config.validate() {
        error!("PW3Query {e}");
        return Err(e.into());
    }

    let store: Arc<dyn BlobStore> =
        Arc::new(FsBlobStore::new(&config.data_dir, &config.bucket_name));
    let queue = Arc::new(FileQueue::new(&config.data_dir, &config.queue.name));

    match cli.command {
        Command::Dispatch { event } => run_dispatch(&config, store, queue, event).await,
        Command::Work { drain } => run_work(&config, store, queue, drain).await,
        Command::Status => {
            let (stored, in_flight) = queue.depth().await?;
            println!("{}: {stored} queued ({in_flight} in flight)", config.queue.name);
            Ok(())
        }
    }
}

async fn run_dispatch(
    config: &PipelineConfig,
    store: Arc<dyn BlobStore>,
    queue: Arc<dyn MessageQueue>,
    event: Option<PathBuf>,
) -> anyhow::Result<()> {
    let event = match event {
        Some(path) => {
            let raw = std::fs::read_to_string(&path)?;
            let payload: serde_json::Value = serde_json::from_str(&raw)?;
            DispatchEvent::from_value(&payload)
        }
        None => DispatchEvent::Sweep,
    };

    let report = Dispatcher::new(store, queue, config).run(&event).await;

    for pack in &report.packs {
        println!("{}: {}/{} queries dispatched", pack.name, pack.dispatched, pack.queries);
    }
    for failure in &report.pack_failures {
        println!("{}: skipped ({})", failure.name, failure.reason);
    }
    for failure in &report.enqueue_failures {
        println!("{}/{}: not dispatched ({})", failure.pack, failure.query_id, failure.reason);
    }
    info!(
        mode = %report.mode,
        dispatched = report.total_dispatched(),
        clean = report.is_clean(),
        "dispatch finished"
    );
    Ok(())
}

async fn run_work(
    config: &PipelineConfig,
    store: Arc<dyn BlobStore>,
    queue: Arc<dyn MessageQueue>,
    drain: bool,
) -> anyhow::Result<()> {
    let provider = PublicWwwEngine::new(config.provider.clone())?;
    let worker = Worker::new(queue, store, provider, config);

    let outcomes = if drain {
        worker.drain().await?
    } else {
        vec![worker.run_once().await?]
    };

    for outcome in &outcomes {
        println!("{}", describe(outcome));
    }
    Ok(())
}

fn describe(outcome: &WorkerOutcome) -> String {
    match outcome {
        WorkerOutcome::Idle => "queue empty".to_owned(),
        WorkerOutcome::Rejected { message_id, error } => {
            format!("{message_id}: rejected ({error})")
        }
        WorkerOutcome::NoResults { query_id } => format!("{query_id}: no results"),
        WorkerOutcome::Stored {
            query_id,
            key,
            records,
        } => format!("{query_id}: {records} records stored at {key}"),
        WorkerOutcome::StoreFailed {
            query_id,
            key,
            reason,
        } => format!("{query_id}: write to {key} failed ({reason})"),
    }
}
