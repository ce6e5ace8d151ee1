//! Raw UDP packet replayer.
//!
//! Reads `dst,src,sport,dport,payload` rows from CSV and sends one spoofed
//! IPv4/UDP datagram per row through a layer-3 raw socket.

use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use feedkit::packet::{ensure_root, replay, DryRun, RawSocketSender};

#[derive(Parser, Debug)]
#[command(name = "packet-replay")]
#[command(about = "Send raw UDP/IP packets described by a CSV file")]
struct Args {
    /// CSV with columns dst,src,sport,dport,payload
    #[arg(short, long, default_value = "artefacts/rsyslog_mapped_data/scapy_mapping.csv")]
    file: PathBuf,

    /// Build packets and log them as hex without sending
    #[arg(long)]
    dry_run: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(if args.verbose { Level::DEBUG } else { Level::INFO })
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    if !args.dry_run {
        ensure_root()?;
    }

    info!("Packet replay from {}", args.file.display());
    let file = File::open(&args.file)
        .with_context(|| format!("Failed to open {}", args.file.display()))?;
    let reader = BufReader::new(file);

    let stats = if args.dry_run {
        replay(reader, &mut DryRun)?
    } else {
        let mut sender = RawSocketSender::open().context("Failed to open raw socket")?;
        replay(reader, &mut sender)?
    };

    if stats.rows > 0 && stats.sent == 0 {
        anyhow::bail!("No packets were sent ({} rows skipped)", stats.skipped);
    }

    Ok(())
}
