//! # txgraph
//!
//! Exports the blocks of a bitcoind data directory as CSV files describing a graph of
//! blocks, transactions and addresses, ready for a bulk graph database import.
//!
//! The run has two phases:
//!
//! 1. Every transaction from genesis to the end height is scanned once and its outputs are
//!    written to an on-disk index (`--index-dir`), which is compacted at the end.
//! 2. The requested height range is scanned again. Each input is looked up in the index to
//!    find the address and value it spends, and the rows of the seven CSV files are written
//!    to `--out-dir`.
//!
//! A completed index can be reused by a later run with `--reuse-index`. Files left behind by
//! an interrupted run are incomplete and must be regenerated.

mod cli;
mod params;
mod progress;

use self::cli::App;
use self::progress::PhaseBars;
use clap::Parser;
use tracing_subscriber::EnvFilter;
use txgraph_export::{BitcoindBlockSource, Exporter, HostResources};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Export(#[from] txgraph_export::Error),

    #[error("No default bitcoind data directory on this platform, specify one with --datadir")]
    NoDefaultDataDir,

    #[error("Invalid log filter: {0}")]
    LogFilter(#[from] tracing_subscriber::filter::ParseError),
}

fn init_logging(log: &[String]) -> Result<(), Error> {
    let filter = if log.is_empty() {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    } else {
        EnvFilter::try_new(log.join(","))?
    };

    tracing_subscriber::fmt().with_env_filter(filter).init();

    Ok(())
}

fn main() -> Result<(), Error> {
    let app = App::parse();

    init_logging(&app.log)?;

    let datadir = app.chain_datadir()?;
    let config = app.export_config(&HostResources::probe());

    tracing::info!("Storing the output index in {}", config.index_dir.display());

    let source = BitcoindBlockSource::open(&datadir)?;
    let exporter = Exporter::new(source, config);

    let summary = exporter.run(&PhaseBars::default())?;

    println!(
        "Exported #{}..#{}: {} transactions, {} inputs resolved, {} missed, {} blocks skipped, {} rows",
        summary.range.start,
        summary.range.end,
        summary.resolve.stats.transactions,
        summary.resolve.stats.resolved_inputs,
        summary.resolve.stats.missed_inputs,
        summary.build.skipped_blocks + summary.resolve.stats.skipped_blocks,
        summary.resolve.rows,
    );

    Ok(())
}
