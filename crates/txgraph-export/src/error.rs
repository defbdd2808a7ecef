use std::path::PathBuf;

/// Fatal errors aborting an export run.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Index(#[from] txgraph_index::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The bitcoind block storage could not be opened.
    #[error("Failed to open block storage at {}: {reason}", path.display())]
    BlockSourceOpen { path: PathBuf, reason: String },

    #[error("Failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    /// Requested heights are empty or beyond the available blocks.
    #[error("Invalid height range #{start}..#{end}, {block_count} blocks available")]
    InvalidRange {
        start: u32,
        end: u32,
        block_count: u32,
    },
}

/// Per-height failure of a block source.
///
/// Workers absorb these by skipping the block, they never abort a run.
#[derive(Debug, thiserror::Error)]
pub enum BlockSourceError {
    #[error("Block #{0} is not available")]
    Missing(u32),

    #[error("Failed to read block #{height}: {reason}")]
    Read { height: u32, reason: String },

    #[error("Failed to decode block #{height}: {source}")]
    Decode {
        height: u32,
        #[source]
        source: bitcoin::consensus::encode::Error,
    },
}
