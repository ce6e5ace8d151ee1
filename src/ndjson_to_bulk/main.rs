//! NDJSON to Elasticsearch bulk converter.
//!
//! Shifts each record's timestamp onto the current date and hour, keeping
//! its minute/second/microsecond, and writes `create` action pairs.

mod batch;
mod config;

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use feedkit::timestamp::{base_time, DEFAULT_FIELD};
use feedkit::Realigner;

use crate::batch::{run_jobs, Job, PushTarget};
use crate::config::Config;

#[derive(Parser, Debug)]
#[command(name = "ndjson-to-bulk")]
#[command(about = "Convert NDJSON files to Elasticsearch bulk format with fresh timestamps")]
struct Args {
    /// Input NDJSON file (plain or .gz)
    #[arg(required_unless_present = "config")]
    input: Option<PathBuf>,

    /// Output bulk file (created or truncated)
    #[arg(required_unless_present = "config")]
    output: Option<PathBuf>,

    /// Minutes to offset the base time from now
    #[arg(default_value_t = 0, allow_negative_numbers = true)]
    offset_minutes: i64,

    /// Field holding the event timestamp
    #[arg(long, default_value = DEFAULT_FIELD)]
    timestamp_field: String,

    /// Load the converted file into this Elasticsearch cluster
    #[arg(long)]
    es_url: Option<String>,

    /// Target index or data stream for --es-url
    #[arg(long, default_value = "logs-replay")]
    index: String,

    /// Batch size for bulk indexing
    #[arg(long, default_value = "5000")]
    batch_size: usize,

    /// TOML file listing several input/output pairs
    #[arg(long, conflicts_with_all = ["input", "output"])]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

/// Base time from `now + offset_minutes`, refusing offsets chrono cannot represent
fn build_realigner(offset_minutes: i64, field: String) -> Result<Realigner> {
    match base_time(offset_minutes) {
        Ok(base) => Ok(Realigner::new(base, field)),
        Err(e) => anyhow::bail!("Invalid OFFSET_MINUTES: {}", e),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(if args.verbose { Level::DEBUG } else { Level::INFO })
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("NDJSON to bulk converter");

    if let Some(path) = &args.config {
        info!("Loading config from {}", path.display());
        let config = Config::load_from_file(path)?;
        let jobs: Vec<Job> = config
            .files
            .iter()
            .map(|f| Job {
                input: f.input.clone(),
                output: f.output.clone(),
            })
            .collect();

        let realigner = build_realigner(
            config.global.offset_minutes,
            config.global.timestamp_field.clone(),
        )?;
        let push = config.global.es_url.or(args.es_url).map(|es_url| PushTarget {
            es_url,
            index: config.global.index.unwrap_or(args.index),
            batch_size: args.batch_size,
        });

        return run_jobs(&jobs, realigner, push).await;
    }

    let (Some(input), Some(output)) = (args.input, args.output) else {
        anyhow::bail!("Usage: ndjson-to-bulk <INPUT> <OUTPUT> [OFFSET_MINUTES]");
    };

    let realigner = build_realigner(args.offset_minutes, args.timestamp_field)?;
    let push = args.es_url.map(|es_url| PushTarget {
        es_url,
        index: args.index,
        batch_size: args.batch_size,
    });

    run_jobs(&[Job { input, output }], realigner, push).await
}
