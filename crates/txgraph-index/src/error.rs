//! Error types for the output index.

use std::ops::Range;
use std::path::PathBuf;

/// Errors that can occur during index operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// RocksDB error.
    #[error("RocksDB error: {0}")]
    Rocksdb(#[from] rocksdb::Error),

    /// Bincode serialization/deserialization error.
    #[error("Bincode error: {0}")]
    Bincode(#[from] bincode::Error),

    /// Column family missing from an opened database.
    #[error("Column family `{0}` is missing")]
    MissingColumnFamily(&'static str),

    /// The directory does not hold a build that ran to completion.
    #[error("Index at {} has no completed build, rerun the build phase", .0.display())]
    IncompleteBuild(PathBuf),

    /// The completed build does not cover the heights about to be resolved.
    #[error("Index was built for heights {built:?}, which does not cover {requested:?}")]
    RangeNotCovered {
        built: Range<u32>,
        requested: Range<u32>,
    },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
