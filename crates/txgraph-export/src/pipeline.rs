//! Two-phase export driver.

use crate::scheduler::DEFAULT_CHUNK_SIZE;
use crate::{
    build_chunk, resolve_chunk, BlockSource, Chunk, ChunkScheduler, Error, ResolveStats, Result,
    RowWriter,
};
use bitcoin::Network;
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::fmt;
use std::ops::Range;
use std::path::PathBuf;
use std::time::Instant;
use txgraph_index::{IndexStore, PruneTracker, Resolving, StoreTuning};

/// Phase of an export run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Build,
    Resolve,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Build => write!(f, "build"),
            Self::Resolve => write!(f, "resolve"),
        }
    }
}

/// Observer of batch progress, called from the coordinating thread only.
pub trait Progress {
    fn phase_started(&self, _phase: Phase, _total_heights: u64) {}

    fn heights_done(&self, _phase: Phase, _heights: u64) {}

    fn phase_finished(&self, _phase: Phase) {}
}

/// Progress observer that ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl Progress for NoProgress {}

/// Settings of an export run.
#[derive(Debug, Clone)]
pub struct ExportConfig {
    /// First height to resolve.
    pub start: u32,
    /// One past the last height to resolve, the block count of the source if `None`.
    pub end: Option<u32>,
    pub chunk_size: u32,
    pub network: Network,
    pub out_dir: PathBuf,
    pub index_dir: PathBuf,
    pub build_workers: usize,
    pub resolve_workers: usize,
    pub tuning: StoreTuning,
    /// Skip the build phase when `index_dir` holds a completed build covering the run.
    pub reuse_index: bool,
    /// Delete descriptors from the index once all of their outputs have been spent.
    pub prune_spent: bool,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            start: 0,
            end: None,
            chunk_size: DEFAULT_CHUNK_SIZE,
            network: Network::Bitcoin,
            out_dir: PathBuf::from("csv"),
            index_dir: PathBuf::from("transaction_db"),
            build_workers: 1,
            resolve_workers: 1,
            tuning: StoreTuning::default(),
            reuse_index: false,
            prune_spent: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildSummary {
    pub blocks: u64,
    pub skipped_blocks: u64,
    pub descriptors: u64,
    /// The index of a previous run was reused and nothing was built.
    pub reused: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolveSummary {
    pub stats: ResolveStats,
    pub rows: u64,
    pub pruned: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportSummary {
    pub range: Range<u32>,
    pub build: BuildSummary,
    pub resolve: ResolveSummary,
}

fn worker_pool(phase: Phase, threads: usize) -> Result<ThreadPool> {
    Ok(ThreadPoolBuilder::new()
        .num_threads(threads.max(1))
        .thread_name(move |i| format!("txgraph-{phase}-{i}"))
        .build()?)
}

fn batch_heights(batch: &[Chunk]) -> u64 {
    batch.iter().map(|chunk| u64::from(chunk.len())).sum()
}

/// Drives the build and resolution phases over a [`BlockSource`].
pub struct Exporter<S> {
    source: S,
    config: ExportConfig,
}

impl<S: BlockSource> Exporter<S> {
    pub fn new(source: S, config: ExportConfig) -> Self {
        Self { source, config }
    }

    /// Heights to resolve, validated against the source.
    pub fn height_range(&self) -> Result<Range<u32>> {
        let block_count = self.source.block_count();
        let start = self.config.start;
        let end = self.config.end.unwrap_or(block_count);

        if start >= end || end > block_count {
            return Err(Error::InvalidRange {
                start,
                end,
                block_count,
            });
        }

        Ok(start..end)
    }

    /// Runs both phases, or only the resolution phase over a reused index.
    pub fn run(&self, progress: &dyn Progress) -> Result<ExportSummary> {
        let range = self.height_range()?;

        match txgraph_index::raise_fd_limit() {
            Ok(Some(limit)) => tracing::debug!("Open file limit: {limit}"),
            Ok(None) => tracing::debug!("Open file limit is not adjustable on this platform"),
            Err(err) => tracing::warn!("Failed to raise the open file limit: {err}"),
        }

        let (store, build) = if self.config.reuse_index {
            let store = IndexStore::open_completed(
                &self.config.index_dir,
                self.config.tuning.clone(),
                0..range.end,
            )?;
            let build = BuildSummary {
                descriptors: store.estimated_entries()?,
                reused: true,
                ..Default::default()
            };
            (store, build)
        } else {
            self.build_index(range.end, progress)?
        };

        let resolve = self.resolve(&store, range.clone(), progress)?;

        Ok(ExportSummary {
            range,
            build,
            resolve,
        })
    }

    /// Indexes the outputs of every transaction in `[0, end)`.
    ///
    /// Inputs of any resolved block may spend outputs created at any earlier height, so the
    /// build always starts from genesis.
    pub fn build_index(
        &self,
        end: u32,
        progress: &dyn Progress,
    ) -> Result<(IndexStore<Resolving>, BuildSummary)> {
        let workers = self.config.build_workers.max(1);
        let scheduler = ChunkScheduler::new(0..end, self.config.chunk_size);
        let total_batches = scheduler.batch_count(workers);

        let store = IndexStore::create(&self.config.index_dir, self.config.tuning.clone())?;
        let pool = worker_pool(Phase::Build, workers)?;

        tracing::info!(
            workers,
            chunks = scheduler.chunks().len(),
            "Building output index for #0..#{end}"
        );
        progress.phase_started(Phase::Build, scheduler.heights());

        let source = &self.source;
        let network = self.config.network;
        let started = Instant::now();
        let mut summary = BuildSummary::default();

        for (index, batch) in scheduler.batches(workers).enumerate() {
            let built = pool.install(|| {
                batch
                    .par_iter()
                    .map(|chunk| build_chunk(source, *chunk, network))
                    .collect::<Result<Vec<_>>>()
            })?;

            for chunk in built {
                summary.blocks += chunk.blocks;
                summary.skipped_blocks += chunk.skipped_blocks;
                summary.descriptors += store.insert_batch(chunk.entries)? as u64;
            }

            progress.heights_done(Phase::Build, batch_heights(batch));
            tracing::info!(
                batch = index + 1,
                total = total_batches,
                descriptors = summary.descriptors,
                "Indexed blocks up to #{}",
                batch.last().map_or(0, |chunk| chunk.end)
            );
        }

        let store = store.finish(0..end)?;
        progress.phase_finished(Phase::Build);

        tracing::info!(
            blocks = summary.blocks,
            skipped = summary.skipped_blocks,
            descriptors = summary.descriptors,
            "Output index built in {}s",
            started.elapsed().as_secs()
        );

        Ok((store, summary))
    }

    /// Resolves `range` against a completed index and writes the CSV files.
    pub fn resolve(
        &self,
        store: &IndexStore<Resolving>,
        range: Range<u32>,
        progress: &dyn Progress,
    ) -> Result<ResolveSummary> {
        let workers = self.config.resolve_workers.max(1);
        let scheduler = ChunkScheduler::new(range.clone(), self.config.chunk_size);
        let total_batches = scheduler.batch_count(workers);

        let mut writer = RowWriter::create(&self.config.out_dir)?;
        let mut prune_tracker = self.config.prune_spent.then(PruneTracker::new);
        let pool = worker_pool(Phase::Resolve, workers)?;

        tracing::info!(
            workers,
            chunks = scheduler.chunks().len(),
            prune = self.config.prune_spent,
            "Resolving #{}..#{}",
            range.start,
            range.end
        );
        progress.phase_started(Phase::Resolve, scheduler.heights());

        let source = &self.source;
        let network = self.config.network;
        let track_spends = prune_tracker.is_some();
        let started = Instant::now();
        let mut summary = ResolveSummary::default();

        for (index, batch) in scheduler.batches(workers).enumerate() {
            let resolved = pool.install(|| {
                batch
                    .par_iter()
                    .map(|chunk| -> Result<_> {
                        let reader = store.reader()?;
                        Ok(resolve_chunk(source, &reader, *chunk, network, track_spends))
                    })
                    .collect::<Result<Vec<_>>>()
            })?;

            for chunk in &resolved {
                writer.append(&chunk.rows)?;
                summary.stats.absorb(&chunk.stats);
            }
            writer.flush()?;

            if let Some(tracker) = prune_tracker.as_mut() {
                let exhausted = tracker.observe(resolved.into_iter().flat_map(|chunk| chunk.spent));
                summary.pruned += store.apply_prunes(&exhausted)? as u64;
            }

            progress.heights_done(Phase::Resolve, batch_heights(batch));
            tracing::info!(
                batch = index + 1,
                total = total_batches,
                rows = writer.rows_written(),
                "Resolved blocks up to #{}",
                batch.last().map_or(range.start, |chunk| chunk.end)
            );
        }

        summary.rows = writer.rows_written();
        progress.phase_finished(Phase::Resolve);

        tracing::info!(
            transactions = summary.stats.transactions,
            resolved = summary.stats.resolved_inputs,
            missed = summary.stats.missed_inputs,
            skipped = summary.stats.skipped_blocks,
            pruned = summary.pruned,
            "Resolution finished in {}s, output in {}",
            started.elapsed().as_secs(),
            writer.out_dir().display()
        );

        Ok(summary)
    }
}
