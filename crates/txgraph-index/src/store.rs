//! RocksDB-backed output index with a build mode and a resolution mode.

use crate::{cf, meta_keys, Error, IndexEntry, OutputDescriptor, Result};
use bitcoin::hashes::Hash;
use bitcoin::Txid;
use rocksdb::{
    BlockBasedOptions, Cache, ColumnFamily, ColumnFamilyDescriptor, DBCompressionType,
    MemtableFactory, Options, Snapshot, WriteBatch, WriteOptions, DB,
};
use serde::{Deserialize, Serialize};
use std::marker::PhantomData;
use std::ops::Range;
use std::path::{Path, PathBuf};

const MIB: u64 = 1024 * 1024;

/// Level-0 triggers high enough to never fire during a bulk load.
const UNREACHABLE_L0_TRIGGER: i32 = 1 << 30;

/// Memory and file layout tuning of the index.
#[derive(Debug, Clone)]
pub struct StoreTuning {
    /// Bytes RocksDB may use for memtables and block cache together.
    pub memory_budget: u64,
    /// Bloom filter bits per txid key.
    pub bloom_bits_per_key: f64,
    /// In-memory write buffers kept before a flush is forced.
    pub max_write_buffers: i32,
    /// Target size of each table file.
    pub target_file_size: u64,
    /// Background flush and compaction threads.
    pub background_jobs: i32,
}

impl Default for StoreTuning {
    fn default() -> Self {
        Self {
            memory_budget: 1024 * MIB,
            bloom_bits_per_key: 10.0,
            max_write_buffers: 10,
            target_file_size: 128 * MIB,
            background_jobs: 16,
        }
    }
}

impl StoreTuning {
    /// Tuning for a given memory budget in bytes, defaults elsewhere.
    pub fn with_memory_budget(memory_budget: u64) -> Self {
        Self {
            memory_budget,
            ..Default::default()
        }
    }

    fn write_buffer_size(&self) -> usize {
        (self.memory_budget * 3 / 10).max(64 * MIB) as usize
    }

    fn total_write_buffer_size(&self) -> usize {
        (self.memory_budget * 6 / 10).max(128 * MIB) as usize
    }

    fn block_cache_size(&self) -> usize {
        (self.memory_budget * 4 / 10).max(64 * MIB) as usize
    }

    fn table_options(&self) -> BlockBasedOptions {
        let mut block_opts = BlockBasedOptions::default();
        block_opts.set_bloom_filter(self.bloom_bits_per_key, false);
        block_opts.set_block_cache(&Cache::new_lru_cache(self.block_cache_size()));
        block_opts
    }

    /// Options for sequential bulk insertion.
    ///
    /// Vector memtables without concurrent writes, large and numerous write buffers, and
    /// no compaction at all until [`IndexStore::finish`].
    fn bulk_load_options(&self) -> Options {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);
        opts.set_max_open_files(-1);

        opts.set_memtable_factory(MemtableFactory::Vector);
        opts.set_allow_concurrent_memtable_write(false);
        opts.set_write_buffer_size(self.write_buffer_size());
        opts.set_db_write_buffer_size(self.total_write_buffer_size());
        opts.set_max_write_buffer_number(self.max_write_buffers);
        opts.set_target_file_size_base(self.target_file_size);

        opts.set_disable_auto_compactions(true);
        opts.set_max_background_jobs(self.background_jobs);
        opts.set_level_zero_file_num_compaction_trigger(UNREACHABLE_L0_TRIGGER);
        opts.set_level_zero_slowdown_writes_trigger(UNREACHABLE_L0_TRIGGER);
        opts.set_level_zero_stop_writes_trigger(UNREACHABLE_L0_TRIGGER);

        opts.set_compression_type(DBCompressionType::None);
        opts.set_block_based_table_factory(&self.table_options());
        opts
    }

    /// Options for concurrent point lookups over a compacted store.
    fn lookup_options(&self) -> Options {
        let mut opts = Options::default();
        opts.set_max_open_files(-1);
        opts.set_max_background_jobs(self.background_jobs);
        opts.set_target_file_size_base(self.target_file_size);
        opts.set_compression_type(DBCompressionType::None);
        opts.set_block_based_table_factory(&self.table_options());
        opts
    }
}

/// Index mode while descriptors are being bulk loaded.
#[derive(Debug)]
pub struct Building;

/// Index mode after the single full compaction, serving lookups.
#[derive(Debug)]
pub struct Resolving;

/// Completed build range, persisted in the meta column family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
struct BuildMarker {
    start: u32,
    end: u32,
}

impl BuildMarker {
    fn covers(&self, requested: &Range<u32>) -> bool {
        self.start <= requested.start && requested.end <= self.end
    }
}

/// Persistent txid -> [`OutputDescriptor`] index.
///
/// The mode parameter makes the phase barrier explicit: only an `IndexStore<Building>`
/// accepts descriptor inserts, and only an `IndexStore<Resolving>` hands out readers.
pub struct IndexStore<Mode> {
    db: DB,
    path: PathBuf,
    tuning: StoreTuning,
    _mode: PhantomData<Mode>,
}

impl<Mode> IndexStore<Mode> {
    fn outputs_cf(&self) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(cf::OUTPUTS)
            .ok_or(Error::MissingColumnFamily(cf::OUTPUTS))
    }

    fn meta_cf(&self) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(cf::META)
            .ok_or(Error::MissingColumnFamily(cf::META))
    }

    /// Range recorded by the last completed build, if any.
    pub fn built_range(&self) -> Result<Option<Range<u32>>> {
        Ok(self.build_marker()?.map(|BuildMarker { start, end }| start..end))
    }

    fn build_marker(&self) -> Result<Option<BuildMarker>> {
        Ok(self
            .db
            .get_cf(self.meta_cf()?, meta_keys::BUILD_RANGE)?
            .map(|bytes| bincode::deserialize::<BuildMarker>(&bytes))
            .transpose()?)
    }

    /// RocksDB's estimate of the number of stored descriptors.
    pub fn estimated_entries(&self) -> Result<u64> {
        Ok(self
            .db
            .property_int_value_cf(self.outputs_cf()?, "rocksdb.estimate-num-keys")?
            .unwrap_or(0))
    }
}

impl IndexStore<Building> {
    /// Creates an empty index for a bulk load.
    ///
    /// A database left in `path` by a previous run is destroyed first, so neither stale
    /// descriptors nor an old completion marker survive into the new build.
    pub fn create(path: &Path, tuning: StoreTuning) -> Result<Self> {
        if path.exists() {
            tracing::info!("Removing previous output index at {}", path.display());
            DB::destroy(&Options::default(), path)?;
        }
        std::fs::create_dir_all(path)?;

        let opts = tuning.bulk_load_options();
        let cf_descriptors = vec![
            ColumnFamilyDescriptor::new(cf::OUTPUTS, opts.clone()),
            ColumnFamilyDescriptor::new(cf::META, Options::default()),
        ];

        let db = DB::open_cf_descriptors(&opts, path, cf_descriptors)?;

        let store = Self {
            db,
            path: path.to_path_buf(),
            tuning,
            _mode: PhantomData,
        };

        tracing::info!(
            "Opened output index for bulk load at {}, write buffer {} MiB x {}",
            path.display(),
            store.tuning.write_buffer_size() as u64 / MIB,
            store.tuning.max_write_buffers,
        );

        Ok(store)
    }

    /// Writes one worker's descriptors as a single batch.
    ///
    /// The WAL is skipped; durability comes from the flush in [`Self::finish`].
    pub fn insert_batch(&self, entries: Vec<IndexEntry>) -> Result<usize> {
        let cf_outputs = self.outputs_cf()?;
        let count = entries.len();

        let mut batch = WriteBatch::default();
        for IndexEntry { txid, encoded } in entries {
            batch.put_cf(cf_outputs, txid.to_byte_array(), encoded);
        }

        let mut write_opts = WriteOptions::default();
        write_opts.disable_wal(true);
        self.db.write_opt(batch, &write_opts)?;

        Ok(count)
    }

    /// Ends the build: flushes, runs the one full compaction, records `range` as complete
    /// and reopens the store for lookups.
    pub fn finish(self, range: Range<u32>) -> Result<IndexStore<Resolving>> {
        let cf_outputs = self.outputs_cf()?;

        self.db.flush_cf(cf_outputs)?;

        tracing::info!("Compacting output index at {}", self.path.display());
        let started = std::time::Instant::now();
        self.db.compact_range_cf(cf_outputs, None::<&[u8]>, None::<&[u8]>);
        tracing::info!(
            "Compacted output index in {}s, ~{} descriptors",
            started.elapsed().as_secs(),
            self.estimated_entries()?
        );

        let marker = BuildMarker {
            start: range.start,
            end: range.end,
        };
        let cf_meta = self.meta_cf()?;
        self.db
            .put_cf(cf_meta, meta_keys::BUILD_RANGE, bincode::serialize(&marker)?)?;
        self.db.flush_cf(cf_meta)?;

        let Self { db, path, tuning, .. } = self;
        drop(db);

        IndexStore::<Resolving>::open_unchecked(&path, tuning)
    }
}

impl IndexStore<Resolving> {
    /// Reopens a completed index whose build covers `requested`.
    pub fn open_completed(path: &Path, tuning: StoreTuning, requested: Range<u32>) -> Result<Self> {
        if !path.exists() {
            return Err(Error::IncompleteBuild(path.to_path_buf()));
        }

        let store = Self::open_unchecked(path, tuning)?;

        let Some(marker) = store.build_marker()? else {
            return Err(Error::IncompleteBuild(path.to_path_buf()));
        };

        if !marker.covers(&requested) {
            return Err(Error::RangeNotCovered {
                built: marker.start..marker.end,
                requested,
            });
        }

        tracing::info!(
            "Reusing output index at {} built for #{}..#{}",
            path.display(),
            marker.start,
            marker.end
        );

        Ok(store)
    }

    fn open_unchecked(path: &Path, tuning: StoreTuning) -> Result<Self> {
        let opts = tuning.lookup_options();
        let cf_descriptors = vec![
            ColumnFamilyDescriptor::new(cf::OUTPUTS, opts.clone()),
            ColumnFamilyDescriptor::new(cf::META, Options::default()),
        ];

        let db = DB::open_cf_descriptors(&opts, path, cf_descriptors)?;

        Ok(Self {
            db,
            path: path.to_path_buf(),
            tuning,
            _mode: PhantomData,
        })
    }

    /// Returns a reader over a consistent snapshot of the index.
    ///
    /// Each worker takes its own reader; readers never block each other.
    pub fn reader(&self) -> Result<IndexReader<'_>> {
        Ok(IndexReader {
            snapshot: self.db.snapshot(),
            cf_outputs: self.outputs_cf()?,
        })
    }

    /// Deletes fully spent descriptors.
    ///
    /// Only the coordinator calls this, between scheduler batches. A pruned index no longer
    /// holds every descriptor of its build range, so the completion marker goes with the
    /// first deletion and the directory cannot be reused by a later run.
    pub fn apply_prunes(&self, txids: &[Txid]) -> Result<usize> {
        if txids.is_empty() {
            return Ok(0);
        }

        let cf_outputs = self.outputs_cf()?;
        let mut batch = WriteBatch::default();
        batch.delete_cf(self.meta_cf()?, meta_keys::BUILD_RANGE);
        for txid in txids {
            batch.delete_cf(cf_outputs, txid.to_byte_array());
        }
        self.db.write(batch)?;

        tracing::debug!("Pruned {} fully spent descriptors", txids.len());

        Ok(txids.len())
    }
}

/// Point-lookup handle over a snapshot of a completed index.
pub struct IndexReader<'a> {
    snapshot: Snapshot<'a>,
    cf_outputs: &'a ColumnFamily,
}

impl IndexReader<'_> {
    /// Looks up the descriptor of `txid`; `Ok(None)` when the index has no entry.
    pub fn get(&self, txid: &Txid) -> Result<Option<OutputDescriptor>> {
        self.snapshot
            .get_cf(self.cf_outputs, txid.to_byte_array())?
            .map(|bytes| OutputDescriptor::decode(&bytes))
            .transpose()
            .map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::IndexedOutput;

    fn tuning() -> StoreTuning {
        StoreTuning::with_memory_budget(64 * MIB)
    }

    fn descriptor(values: &[u64]) -> OutputDescriptor {
        OutputDescriptor {
            outputs: values
                .iter()
                .enumerate()
                .map(|(vout, value)| IndexedOutput {
                    value: *value,
                    address: Some(format!("addr{vout}")),
                    vout: vout as u32,
                })
                .collect(),
        }
    }

    fn txid(byte: u8) -> Txid {
        Txid::from_byte_array([byte; 32])
    }

    #[test]
    fn test_marker_covers() {
        let marker = BuildMarker { start: 0, end: 100 };

        assert!(marker.covers(&(0..100)));
        assert!(marker.covers(&(10..50)));
        assert!(!marker.covers(&(0..101)));
    }

    #[test]
    fn test_create_starts_from_an_empty_index() {
        let dir = tempfile::tempdir().unwrap();

        let store = IndexStore::create(dir.path(), tuning()).unwrap();
        store
            .insert_batch(vec![IndexEntry::new(txid(5), &descriptor(&[5])).unwrap()])
            .unwrap();
        let resolving = store.finish(0..10).unwrap();
        assert_eq!(resolving.built_range().unwrap(), Some(0..10));
        drop(resolving);

        let rebuilding = IndexStore::create(dir.path(), tuning()).unwrap();
        assert_eq!(rebuilding.built_range().unwrap(), None);

        let rebuilt = rebuilding.finish(0..10).unwrap();
        assert_eq!(rebuilt.reader().unwrap().get(&txid(5)).unwrap(), None);
    }

    #[test]
    fn test_prunes_remove_entries() {
        let dir = tempfile::tempdir().unwrap();

        let store = IndexStore::create(dir.path(), tuning()).unwrap();
        store
            .insert_batch(vec![
                IndexEntry::new(txid(1), &descriptor(&[1])).unwrap(),
                IndexEntry::new(txid(2), &descriptor(&[2, 3])).unwrap(),
            ])
            .unwrap();
        let store = store.finish(0..1).unwrap();

        assert_eq!(store.apply_prunes(&[]).unwrap(), 0);
        assert_eq!(store.built_range().unwrap(), Some(0..1));

        assert_eq!(store.apply_prunes(&[txid(1)]).unwrap(), 1);

        let reader = store.reader().unwrap();
        assert_eq!(reader.get(&txid(1)).unwrap(), None);
        assert_eq!(reader.get(&txid(2)).unwrap(), Some(descriptor(&[2, 3])));
        drop(reader);

        assert_eq!(store.built_range().unwrap(), None);
        drop(store);
        assert!(matches!(
            IndexStore::open_completed(dir.path(), tuning(), 0..1),
            Err(Error::IncompleteBuild(_))
        ));
    }

    #[test]
    fn test_reader_snapshot_is_isolated_from_prunes() {
        let dir = tempfile::tempdir().unwrap();

        let store = IndexStore::create(dir.path(), tuning()).unwrap();
        store
            .insert_batch(vec![IndexEntry::new(txid(9), &descriptor(&[9])).unwrap()])
            .unwrap();
        let store = store.finish(0..1).unwrap();

        let reader = store.reader().unwrap();
        store.apply_prunes(&[txid(9)]).unwrap();

        assert_eq!(reader.get(&txid(9)).unwrap(), Some(descriptor(&[9])));
        assert_eq!(store.reader().unwrap().get(&txid(9)).unwrap(), None);
    }
}
