//! Worker counts and database memory derived from the host and user overrides.

use sysinfo::{MemoryRefreshKind, RefreshKind, System};

const MIB: u64 = 1024 * 1024;
const GIB: u64 = 1024 * MIB;

/// Memory left to the rest of the system when no explicit limit is given.
const HOST_RESERVE: u64 = 4 * GIB;

/// Lower bound of the database memory budget.
const MIN_DB_MEMORY: u64 = 256 * MIB;

/// Default memory ceiling of a single resolution worker.
pub const DEFAULT_WORKER_MEMORY: u64 = 15 * GIB;

/// What the host reports as available.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostResources {
    pub cores: usize,
    /// Available memory in bytes.
    pub available_memory: u64,
}

impl HostResources {
    pub fn probe() -> Self {
        let mut sys = System::new_with_specifics(
            RefreshKind::nothing().with_memory(MemoryRefreshKind::everything()),
        );
        sys.refresh_memory();

        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);

        Self {
            cores,
            available_memory: sys.available_memory(),
        }
    }
}

/// User overrides, all optional.
#[derive(Debug, Clone, Default)]
pub struct ResourceLimits {
    /// Build workers.
    pub cores: Option<usize>,
    /// Memory in bytes granted to the run.
    pub memory: Option<u64>,
    /// Memory ceiling in bytes of one resolution worker.
    pub worker_memory: Option<u64>,
}

/// Resolved concurrency and memory plan of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Budget {
    pub build_workers: usize,
    pub resolve_workers: usize,
    /// Bytes handed to the index store.
    pub db_memory: u64,
}

impl ResourceLimits {
    /// Applies the overrides that fit within `host`, falling back to host-derived defaults.
    ///
    /// The build phase is CPU-bound and keeps one core for the writer. The resolution phase
    /// is memory-bound, so its worker count is the memory divided by the per-worker ceiling.
    pub fn plan(&self, host: &HostResources) -> Budget {
        let build_workers = match self.cores {
            Some(cores) if cores > 0 && cores <= host.cores => cores,
            _ => host.cores.saturating_sub(1).max(1),
        };

        let explicit_memory = self
            .memory
            .filter(|memory| *memory > 0 && *memory <= host.available_memory);

        let db_memory = explicit_memory
            .unwrap_or_else(|| host.available_memory.saturating_sub(HOST_RESERVE))
            .max(MIN_DB_MEMORY);

        let worker_memory = self
            .worker_memory
            .filter(|memory| *memory > 0)
            .unwrap_or(DEFAULT_WORKER_MEMORY);

        let resolve_workers = (explicit_memory.unwrap_or(host.available_memory) / worker_memory)
            .max(1) as usize;

        Budget {
            build_workers,
            resolve_workers,
            db_memory,
        }
    }
}
