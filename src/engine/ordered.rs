//! Ordered in-process engine
//!
//! ## Concurrency Model: Single-Writer / Multiple-Reader (SWMR)
//!
//! - **Writes** (put/del/batch flush/checkpoint): serialized by `write_lock`
//!   - Order: write_lock → WAL append → MemTable insert → publish `last_seq`
//!   - A batch is one WAL entry and one sequence number, so it becomes
//!     visible all at once
//!
//! - **Reads** (get/find): never take `write_lock`
//!   - Unbatched reads see the latest published sequence number
//!   - Batched reads and cursors go through a [`Snapshot`]
//!
//! ## Durability
//! ```text
//!   write ──► wal.log ──(size >= wal_size_limit)──► checkpoint + truncate
//!
//!   open:  IDENTITY check → load checkpoint → replay WAL entries newer
//!          than the checkpoint → checkpoint again if anything replayed
//! ```

use std::fmt::Write as _;
use std::fs;
use std::marker::PhantomData;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use super::context::Context;
use super::iterator::OrderedIterator;
use super::snapshot::{Snapshot, SnapshotList};
use super::{EngineIterator, KeyValueEngine};
use crate::comparator::{ArdbComparator, KeyComparator};
use crate::config::Config;
use crate::error::Result;
use crate::memtable::MemTable;
use crate::storage::{Checkpoint, Manifest, StorageManager};
use crate::wal::{Operation, WalRecovery, WalWriter};

/// Operation counters reported by [`KeyValueEngine::stats`]
#[derive(Debug, Default)]
struct EngineStats {
    puts: AtomicU64,
    deletes: AtomicU64,
    gets: AtomicU64,
    cache_fill_reads: AtomicU64,
    iterators: AtomicU64,
    batch_flushes: AtomicU64,
    checkpoints: AtomicU64,
    compactions: AtomicU64,
}

impl EngineStats {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// The storage engine, generic over the key order
pub struct OrderedEngine<C: KeyComparator = ArdbComparator> {
    /// Engine configuration
    config: Config,

    /// Whole keyspace, multi-versioned (internal RwLock)
    memtable: Arc<MemTable<C>>,

    /// Highest sequence number whose writes are fully applied
    last_seq: AtomicU64,

    /// Write-ahead log (exclusive access needed)
    wal: Mutex<WalWriter>,

    /// Checkpoint files
    storage: StorageManager,

    /// Live snapshots, consulted by garbage collection
    snapshots: Arc<SnapshotList>,

    /// Comparator identity the store was created with
    manifest: Manifest,

    /// Serializes write operations (put/del/flush/checkpoint)
    write_lock: Mutex<()>,

    stats: EngineStats,

    _cmp: PhantomData<fn() -> C>,
}

impl<C: KeyComparator> OrderedEngine<C> {
    // =========================================================================
    // Internal Path Constants
    // =========================================================================
    const WAL_FILENAME: &'static str = "wal.log";
    const CHECKPOINT_DIR: &'static str = "checkpoints";

    /// Open or create an engine with the given config
    ///
    /// On startup:
    /// 1. Create the data directory and check the comparator identity
    /// 2. Load the newest checkpoint
    /// 3. Replay WAL entries newer than the checkpoint
    /// 4. Checkpoint again if anything was replayed
    pub fn open(config: Config) -> Result<Self> {
        fs::create_dir_all(&config.data_dir)?;

        let manifest = Manifest::check_or_create(&config.data_dir, C::NAME)?;
        let storage = StorageManager::open(&config.data_dir.join(Self::CHECKPOINT_DIR))?;
        let wal_path = config.data_dir.join(Self::WAL_FILENAME);

        let memtable = Arc::new(MemTable::<C>::new());
        let mut last_seq = 0;
        if let Some((seq, entries)) = storage.load_latest()? {
            for (key, value) in entries {
                memtable.put(key, value, seq);
            }
            last_seq = seq;
        }

        let mut replayed = 0usize;
        let mut stale = 0usize;
        if wal_path.exists() {
            let (entries, result) = WalRecovery::recover(&wal_path)?;
            if result.entries_recovered > 0 || result.entries_corrupted > 0 {
                tracing::info!(
                    recovered = result.entries_recovered,
                    corrupted = result.entries_corrupted,
                    last_lsn = result.last_lsn,
                    "WAL recovery"
                );
            }
            for entry in entries {
                if entry.lsn <= last_seq {
                    stale += 1;
                    continue;
                }
                apply(&memtable, entry.operation, entry.lsn);
                last_seq = entry.lsn;
                replayed += 1;
            }
        }

        let wal = WalWriter::open(&wal_path, config.wal_sync_strategy, last_seq + 1)?;

        let engine = Self {
            config,
            memtable,
            last_seq: AtomicU64::new(last_seq),
            wal: Mutex::new(wal),
            storage,
            snapshots: Arc::new(SnapshotList::new()),
            manifest,
            write_lock: Mutex::new(()),
            stats: EngineStats::default(),
            _cmp: PhantomData,
        };

        if replayed > 0 {
            // Make the replayed writes durable in a checkpoint so the WAL can go
            let _guard = engine.write_lock.lock();
            engine.checkpoint_locked()?;
        } else if stale > 0 {
            engine.wal.lock().truncate()?;
        }

        tracing::info!(
            data_dir = %engine.config.data_dir.display(),
            comparator = C::NAME,
            last_seq,
            replayed,
            "Engine opened"
        );
        Ok(engine)
    }

    /// Open with a path (convenience method)
    ///
    /// Uses default config with the specified data directory
    pub fn open_path(path: &Path) -> Result<Self> {
        Self::open(Config::builder().data_dir(path).build())
    }

    /// Close the engine gracefully
    ///
    /// Checkpoints anything still only in the WAL and syncs to disk
    pub fn close(self) -> Result<()> {
        let _guard = self.write_lock.lock();
        let wal_bytes = self.wal.lock().size_bytes();
        if wal_bytes > 0 {
            self.checkpoint_locked()?;
        }
        self.wal.lock().sync()?;
        tracing::info!(last_seq = self.last_sequence(), "Engine closed");
        Ok(())
    }

    /// Remove every file of the store at `path`
    pub fn destroy(path: &Path) -> Result<()> {
        if path.exists() {
            fs::remove_dir_all(path)?;
            tracing::info!(path = %path.display(), "Store destroyed");
        }
        Ok(())
    }

    /// Force a checkpoint of the current state
    pub fn checkpoint(&self) -> Result<()> {
        let _guard = self.write_lock.lock();
        self.checkpoint_locked()
    }

    // =========================================================================
    // Snapshot reads
    // =========================================================================

    /// Pin the current state
    pub fn snapshot(&self) -> Arc<Snapshot> {
        Arc::new(self.snapshots.acquire(&self.last_seq))
    }

    /// Read `key` as of `snapshot`
    pub fn get_at(&self, snapshot: &Snapshot, key: &[u8]) -> Option<Vec<u8>> {
        self.memtable.get(key, snapshot.sequence())
    }

    /// Cursor over the state pinned by `snapshot`, positioned at `seek`
    pub fn iter_at(&self, snapshot: Arc<Snapshot>, seek: &[u8]) -> OrderedIterator<C> {
        let mut iter = OrderedIterator::new(Arc::clone(&self.memtable), snapshot);
        iter.seek(seek);
        iter
    }

    // =========================================================================
    // Write path (called with write_lock held unless noted)
    // =========================================================================

    /// Log, apply and publish one operation under a fresh sequence number
    ///
    /// A failed automatic checkpoint is logged and left for the next write
    /// to retry; the operation is already durable and visible, so the write
    /// still reports success.
    fn write_op(&self, op: Operation) -> Result<u64> {
        let _guard = self.write_lock.lock();
        let (seq, wal_bytes) = {
            let mut wal = self.wal.lock();
            let seq = wal.append(op.clone())?;
            (seq, wal.size_bytes())
        };
        apply(&self.memtable, op, seq);
        self.last_seq.store(seq, Ordering::Release);

        if wal_bytes >= self.config.wal_size_limit {
            tracing::debug!(wal_bytes, limit = self.config.wal_size_limit, "WAL over limit");
            if let Err(e) = self.checkpoint_locked() {
                tracing::error!(seq, error = %e, "Automatic checkpoint failed");
            }
        }
        Ok(seq)
    }

    /// Flush a context's buffered operations as one atomic write
    fn flush_batch(&self, ctx: &mut Context) -> Result<()> {
        let ops = ctx.batch.take();
        if ops.is_empty() {
            return Ok(());
        }
        let count = ops.len();
        let seq = self.write_op(Operation::Batch { ops })?;
        EngineStats::bump(&self.stats.batch_flushes);
        tracing::trace!(seq, count, "Batch flushed");
        Ok(())
    }

    /// Write the published state to a checkpoint, truncate the WAL and
    /// drop versions no snapshot can see
    fn checkpoint_locked(&self) -> Result<()> {
        let seq = self.last_seq.load(Ordering::Acquire);
        let entries = self.memtable.visible_entries(seq);
        self.storage.write_checkpoint(
            entries.iter().map(|e| (e.key.as_slice(), e.value.as_slice())),
            seq,
        )?;
        self.wal.lock().truncate()?;

        let horizon = self.snapshots.horizon(&self.last_seq);
        let removed = self.memtable.compact_range(None, None, horizon);
        EngineStats::bump(&self.stats.checkpoints);
        tracing::debug!(seq, horizon, removed, "Checkpoint complete");
        Ok(())
    }

    /// Read through the context snapshot, acquiring it on first use
    fn batch_snapshot(&self, ctx: &mut Context) -> Arc<Snapshot> {
        let snapshots = &self.snapshots;
        let published = &self.last_seq;
        Arc::clone(
            ctx.snapshot
                .get_or_insert_with(|| Arc::new(snapshots.acquire(published))),
        )
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    /// Get the data directory path
    pub fn data_dir(&self) -> &Path {
        &self.config.data_dir
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Highest published sequence number
    pub fn last_sequence(&self) -> u64 {
        self.last_seq.load(Ordering::Acquire)
    }

    /// Comparator identity recorded in the store
    pub fn comparator_name(&self) -> &str {
        self.manifest.comparator()
    }

    /// Stored versions in the MemTable, tombstones included
    pub fn memtable_entry_count(&self) -> usize {
        self.memtable.entry_count()
    }

    /// Approximate MemTable size in bytes
    pub fn memtable_size(&self) -> usize {
        self.memtable.size()
    }

    /// Bytes currently in the WAL
    pub fn wal_size(&self) -> u64 {
        self.wal.lock().size_bytes()
    }

    /// Live snapshot handles
    pub fn live_snapshots(&self) -> usize {
        self.snapshots.len()
    }

    /// Metadata of the newest checkpoint
    pub fn latest_checkpoint(&self) -> Option<Checkpoint> {
        self.storage.latest()
    }
}

/// Apply one logged operation to the MemTable at `seq`
fn apply<C: KeyComparator>(memtable: &MemTable<C>, op: Operation, seq: u64) {
    match op {
        Operation::Put { key, value } => {
            memtable.put(key, value, seq);
        }
        Operation::Delete { key } => {
            memtable.delete(key, seq);
        }
        Operation::Batch { ops } => {
            for op in ops {
                apply(memtable, op, seq);
            }
        }
    }
}

impl<C: KeyComparator> KeyValueEngine for OrderedEngine<C> {
    fn put(&self, ctx: &mut Context, key: &[u8], value: &[u8]) -> Result<()> {
        EngineStats::bump(&self.stats.puts);
        if ctx.in_batch() {
            ctx.batch.put(key, value);
            if ctx.batch.len() >= self.config.batch_commit_watermark {
                self.flush_batch(ctx)?;
            }
            return Ok(());
        }
        self.write_op(Operation::Put {
            key: key.to_vec(),
            value: value.to_vec(),
        })?;
        Ok(())
    }

    fn get(&self, ctx: &mut Context, key: &[u8], fill_cache: bool) -> Result<Option<Vec<u8>>> {
        EngineStats::bump(&self.stats.gets);
        if fill_cache {
            EngineStats::bump(&self.stats.cache_fill_reads);
        }
        if ctx.in_batch() {
            let snapshot = self.batch_snapshot(ctx);
            return Ok(self.memtable.get(key, snapshot.sequence()));
        }
        Ok(self.memtable.get_published(key, &self.last_seq))
    }

    fn del(&self, ctx: &mut Context, key: &[u8]) -> Result<()> {
        EngineStats::bump(&self.stats.deletes);
        if ctx.in_batch() {
            ctx.batch.delete(key);
            if ctx.batch.len() >= self.config.batch_commit_watermark {
                self.flush_batch(ctx)?;
            }
            return Ok(());
        }
        self.write_op(Operation::Delete { key: key.to_vec() })?;
        Ok(())
    }

    fn begin_batch_write(&self, ctx: &mut Context) {
        ctx.begin();
    }

    fn commit_batch_write(&self, ctx: &mut Context) -> Result<()> {
        if !ctx.release() {
            return Ok(());
        }
        ctx.snapshot = None;
        self.flush_batch(ctx)
    }

    fn discard_batch_write(&self, ctx: &mut Context) {
        if !ctx.pending().is_empty() {
            tracing::debug!(dropped = ctx.pending().len(), "Batch discarded");
        }
        ctx.reset();
    }

    fn find(&self, ctx: &mut Context, seek: &[u8], fill_cache: bool) -> Result<Box<dyn EngineIterator>> {
        EngineStats::bump(&self.stats.iterators);
        if fill_cache {
            EngineStats::bump(&self.stats.cache_fill_reads);
        }
        let snapshot = if ctx.in_batch() {
            self.batch_snapshot(ctx)
        } else {
            self.snapshot()
        };
        Ok(Box::new(self.iter_at(snapshot, seek)))
    }

    fn stats(&self) -> String {
        let counter = |c: &AtomicU64| c.load(Ordering::Relaxed);
        let checkpoint = self
            .storage
            .latest()
            .map_or_else(|| "none".to_string(), |c| format!("{} (seq {})", c.id, c.last_seq));

        let mut out = String::new();
        let _ = writeln!(out, "comparator: {}", C::NAME);
        let _ = writeln!(out, "sequence: {}", self.last_sequence());
        let _ = writeln!(out, "memtable.versions: {}", self.memtable.entry_count());
        let _ = writeln!(out, "memtable.bytes: {}", self.memtable.size());
        let _ = writeln!(out, "snapshots.live: {}", self.snapshots.len());
        let _ = writeln!(out, "wal.bytes: {}", self.wal_size());
        let _ = writeln!(out, "checkpoint: {}", checkpoint);
        let _ = writeln!(out, "ops.put: {}", counter(&self.stats.puts));
        let _ = writeln!(out, "ops.del: {}", counter(&self.stats.deletes));
        let _ = writeln!(out, "ops.get: {}", counter(&self.stats.gets));
        let _ = writeln!(out, "ops.iterators: {}", counter(&self.stats.iterators));
        let _ = writeln!(out, "ops.fill_cache: {}", counter(&self.stats.cache_fill_reads));
        let _ = writeln!(out, "batch.flushes: {}", counter(&self.stats.batch_flushes));
        let _ = writeln!(out, "checkpoints: {}", counter(&self.stats.checkpoints));
        let _ = write!(out, "compactions: {}", counter(&self.stats.compactions));
        out
    }

    fn compact_range(&self, begin: Option<&[u8]>, end: Option<&[u8]>) -> Result<()> {
        let _guard = self.write_lock.lock();
        let horizon = self.snapshots.horizon(&self.last_seq);
        let removed = self.memtable.compact_range(begin, end, horizon);
        EngineStats::bump(&self.stats.compactions);
        tracing::info!(horizon, removed, "Compacted range");
        self.checkpoint_locked()
    }
}
