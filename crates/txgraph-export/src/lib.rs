//! Two-phase export of the bitcoin ledger into graph-shaped CSV files.
//!
//! The build phase scans `[0, end)` once and bulk-loads every transaction's outputs into
//! the [`txgraph_index`] store. After the store is compacted, the resolution phase rescans
//! `[start, end)` and attributes each input to the address and value of the output it
//! spends, emitting block, transaction, address and edge rows.
//!
//! Both phases share one execution model: the [`ChunkScheduler`] splits heights into
//! fixed-size chunks, a batch of chunks runs on a dedicated rayon pool, workers return
//! owned values, and the coordinating thread alone writes to the store and the files.

mod budget;
mod build;
mod error;
mod pipeline;
mod resolve;
mod rows;
mod scheduler;
mod source;
mod writer;

pub use budget::{Budget, HostResources, ResourceLimits, DEFAULT_WORKER_MEMORY};
pub use build::{build_chunk, BuiltChunk};
pub use error::{BlockSourceError, Error};
pub use pipeline::{
    BuildSummary, ExportConfig, ExportSummary, Exporter, NoProgress, Phase, Progress,
    ResolveSummary,
};
pub use resolve::{resolve_chunk, ResolveStats, ResolvedChunk};
pub use rows::{
    AddressRow, BelongsRow, BlockRow, Btc, ChunkRows, Label, PrecedesRow, ReceivesRow, SendsRow,
    TransactionRow, COINBASE_ADDRESS,
};
pub use scheduler::{Chunk, ChunkScheduler, DEFAULT_CHUNK_SIZE};
pub use source::{BitcoindBlockSource, BlockSource, MemoryBlockSource};
pub use writer::RowWriter;

/// Result type for export operations.
pub type Result<T> = std::result::Result<T, Error>;
