//! Configuration for AtlasRDB
//!
//! Centralized configuration with sensible defaults.

use std::path::PathBuf;

/// Main configuration for an AtlasRDB engine instance
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Root directory for all data files
    /// Internal structure:
    ///   {data_dir}/
    ///     ├── IDENTITY         (comparator identity, fixed at creation)
    ///     ├── wal.log          (write-ahead log)
    ///     └── checkpoints/     (checkpoint SSTables)
    pub data_dir: PathBuf,

    // -------------------------------------------------------------------------
    // WAL Configuration
    // -------------------------------------------------------------------------
    /// Sync strategy: how often to fsync WAL
    pub wal_sync_strategy: WalSyncStrategy,

    /// WAL size (in bytes) after which the engine writes a checkpoint and
    /// truncates the log
    pub wal_size_limit: u64,

    // -------------------------------------------------------------------------
    // Batch Configuration
    // -------------------------------------------------------------------------
    /// Number of buffered operations in a context's pending batch that
    /// triggers an automatic flush
    pub batch_commit_watermark: usize,
}

/// WAL sync strategy
#[derive(Debug, Clone, Copy)]
pub enum WalSyncStrategy {
    /// fsync after every write (safest, slowest)
    EveryWrite,

    /// fsync after N uncommitted entries (balanced durability/performance)
    EveryNEntries { count: usize },
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./atlasrdb_data"),
            wal_sync_strategy: WalSyncStrategy::EveryNEntries { count: 100 },
            wal_size_limit: 64 * 1024 * 1024, // 64 MB
            batch_commit_watermark: 1024,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the data directory (root for all storage)
    pub fn data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.data_dir = path.into();
        self
    }

    /// Set the WAL sync strategy
    pub fn wal_sync_strategy(mut self, strategy: WalSyncStrategy) -> Self {
        self.config.wal_sync_strategy = strategy;
        self
    }

    /// Set the WAL size that triggers a checkpoint (in bytes)
    pub fn wal_size_limit(mut self, size: u64) -> Self {
        self.config.wal_size_limit = size;
        self
    }

    /// Set the batch auto-flush watermark (in buffered operations)
    ///
    /// A watermark of zero is treated as one.
    pub fn batch_commit_watermark(mut self, count: usize) -> Self {
        self.config.batch_commit_watermark = count.max(1);
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
