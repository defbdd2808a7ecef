use crate::params::{default_datadir, BitcoinChain};
use crate::Error;
use clap::Parser;
use std::path::PathBuf;
use txgraph_export::{ExportConfig, HostResources, ResourceLimits, DEFAULT_CHUNK_SIZE};
use txgraph_index::StoreTuning;

const MIB: u64 = 1024 * 1024;

/// txgraph
#[derive(Debug, Parser)]
#[clap(version, about = "Export the bitcoin ledger as graph-shaped CSV files")]
pub struct App {
    /// First block height to export.
    #[arg(long, default_value_t = 0)]
    pub start_block: u32,

    /// Height after the last block to export.
    ///
    /// Defaults to the number of blocks in the bitcoind database.
    #[arg(long)]
    pub end_block: Option<u32>,

    /// Path to the bitcoind data directory.
    ///
    /// This corresponds to the value of the `-datadir` argument in the bitcoind program. The
    /// chain subdirectory, such as `testnet3`, is appended for chains other than mainnet.
    /// Defaults to the platform's bitcoind data directory.
    #[arg(long, value_name = "PATH")]
    pub datadir: Option<PathBuf>,

    /// Directory the CSV files are written to.
    #[arg(long, value_name = "PATH", default_value = "./csv")]
    pub out_dir: PathBuf,

    /// Directory of the output index.
    #[arg(long, value_name = "PATH", default_value = "./transaction_db")]
    pub index_dir: PathBuf,

    /// Number of workers building the index.
    ///
    /// Defaults to one less than the available cores.
    #[arg(long)]
    pub cores: Option<usize>,

    /// Memory granted to the run, in MiB.
    ///
    /// Defaults to the available memory minus 4 GiB for the index and to the available memory
    /// for sizing resolution workers.
    #[arg(long, value_name = "MIB")]
    pub mem: Option<u64>,

    /// Memory ceiling of a single resolution worker, in MiB.
    #[arg(long, value_name = "MIB")]
    pub worker_mem: Option<u64>,

    /// Number of blocks handed to a worker at once.
    #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE)]
    pub chunk_size: u32,

    /// Specify the chain.
    #[arg(long, value_name = "CHAIN", default_value = "mainnet")]
    pub chain: BitcoinChain,

    /// Skip the build phase and reuse the completed index in `--index-dir`.
    #[arg(long)]
    pub reuse_index: bool,

    /// Delete outputs from the index once they are all spent.
    ///
    /// Keeps the index smaller during resolution, but the index cannot be reused afterwards.
    #[arg(long)]
    pub prune_spent: bool,

    /// Sets a custom logging filter (syntax: `<target>=<level>`).
    ///
    /// Log levels (least to most verbose) are `error`, `warn`, `info`, `debug`, and `trace`.
    ///
    /// By default, all targets log `info`. The global log level can be set with `-l<level>`.
    ///
    /// *Example*: `--log warn,txgraph_export=debug`.
    #[arg(short = 'l', long, value_name = "LOG_PATTERN", num_args = 1..)]
    pub log: Vec<String>,
}

impl App {
    /// Data directory holding the chain's `blocks/` directory.
    pub fn chain_datadir(&self) -> Result<PathBuf, Error> {
        let datadir = self
            .datadir
            .clone()
            .or_else(default_datadir)
            .ok_or(Error::NoDefaultDataDir)?;

        Ok(match self.chain.datadir_subdir() {
            Some(subdir) => datadir.join(subdir),
            None => datadir,
        })
    }

    pub fn resource_limits(&self) -> ResourceLimits {
        ResourceLimits {
            cores: self.cores,
            memory: self.mem.map(|mib| mib * MIB),
            worker_memory: self.worker_mem.map(|mib| mib * MIB),
        }
    }

    /// Export settings for the resources of `host`.
    pub fn export_config(&self, host: &HostResources) -> ExportConfig {
        let budget = self.resource_limits().plan(host);

        tracing::info!(
            cores = host.cores,
            available_mib = host.available_memory / MIB,
            build_workers = budget.build_workers,
            resolve_workers = budget.resolve_workers,
            db_mib = budget.db_memory / MIB,
            "Resource budget"
        );

        ExportConfig {
            start: self.start_block,
            end: self.end_block,
            chunk_size: self.chunk_size,
            network: self.chain.bitcoin_network(),
            out_dir: self.out_dir.clone(),
            index_dir: self.index_dir.clone(),
            build_workers: budget.build_workers,
            resolve_workers: budget.resolve_workers,
            tuning: StoreTuning::with_memory_budget(budget.db_memory),
            reuse_index: self.reuse_index,
            prune_spent: self.prune_spent,
        }
    }
}
