//! Disk-backed transaction output index.
//!
//! Maps every transaction id of the ledger to the list of its outputs (value, address,
//! position) so that inputs, which only reference a previous outpoint, can be attributed
//! to the address that funded them.
//!
//! ## Lifecycle
//!
//! The store is a two-mode handle:
//!
//! - [`IndexStore<Building>`]: bulk-load tuned RocksDB instance, written by a single
//!   coordinator through batched inserts. Auto compactions are disabled.
//! - [`IndexStore<Resolving>`]: obtained only through [`IndexStore::finish`] (one full
//!   compaction, then a completion marker is recorded) or [`IndexStore::open_completed`].
//!   Hands out snapshot readers for concurrent point lookups.
//!
//! A directory without a completion marker is never accepted as resolution input.

mod descriptor;
mod error;
mod limits;
mod prune;
mod store;

pub use descriptor::{resolve_address, IndexEntry, IndexedOutput, OutputDescriptor, UNKNOWN_ADDRESS};
pub use error::Error;
pub use limits::raise_fd_limit;
pub use prune::{PruneTracker, SpentOutput};
pub use store::{Building, IndexReader, IndexStore, Resolving, StoreTuning};

/// Result type for index operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Column family names for RocksDB.
mod cf {
    /// Output descriptors.
    /// Key: txid (32 bytes, raw)
    /// Value: OutputDescriptor (bincode)
    pub const OUTPUTS: &str = "outputs";

    /// Column family for metadata.
    /// Keys: "build_range"
    pub const META: &str = "meta";
}

/// Metadata keys.
mod meta_keys {
    /// Height range of a build that ran to completion, including the final compaction.
    pub const BUILD_RANGE: &[u8] = b"build_range";
}
