//! Storage Manager
//!
//! Owns the checkpoint directory.
//!
//! ## Responsibilities
//! - Discover existing checkpoints on startup, dropping unfinished ones
//! - Load the newest checkpoint for recovery
//! - Write new checkpoints atomically (temp file + rename)
//! - Remove checkpoints superseded by a newer one

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

use crate::error::Result;

use super::{Checkpoint, SSTableBuilder, SSTableReader};

/// Manages the storage layer
///
/// ## Concurrency:
/// - `latest`: Protected by RwLock (many concurrent readers, exclusive writer)
/// - `next_checkpoint_id`: Atomic counter (lock-free)
/// - Checkpoint writes are serialized by the engine's write lock
pub struct StorageManager {
    /// Directory where checkpoints are stored
    dir: PathBuf,

    /// Newest complete checkpoint, if any
    latest: RwLock<Option<Checkpoint>>,

    /// Next ID for creating new checkpoints (atomic, lock-free)
    next_checkpoint_id: AtomicU64,
}

impl StorageManager {
    /// Open or create storage in the given directory
    ///
    /// On startup:
    /// 1. Create directory if it doesn't exist
    /// 2. Remove temp files left by an interrupted checkpoint
    /// 3. Discover finished checkpoint files
    /// 4. Keep the newest, remove any older ones
    pub fn open(path: &Path) -> Result<Self> {
        fs::create_dir_all(path)?;

        let mut ids: Vec<u64> = Vec::new();
        for entry in fs::read_dir(path)? {
            let file_path = entry?.path();
            if !file_path.is_file() {
                continue;
            }
            if file_path.extension().map_or(false, |ext| ext == "tmp") {
                tracing::warn!(path = %file_path.display(), "Removing unfinished checkpoint");
                fs::remove_file(&file_path)?;
                continue;
            }
            if let Some(id) = Self::parse_checkpoint_id(&file_path) {
                ids.push(id);
            }
        }
        ids.sort_unstable();

        let latest = match ids.last() {
            Some(&id) => {
                let checkpoint_path = Self::checkpoint_path_with_dir(path, id);
                let reader = SSTableReader::open(&checkpoint_path)?;
                let file_size = fs::metadata(&checkpoint_path)?.len();
                Some(Checkpoint {
                    id,
                    path: checkpoint_path,
                    entry_count: reader.entry_count(),
                    last_seq: reader.last_seq(),
                    file_size,
                })
            }
            None => None,
        };
        for &old in ids.iter().rev().skip(1) {
            fs::remove_file(Self::checkpoint_path_with_dir(path, old))?;
        }

        // Next ID = max + 1, or 1 if no checkpoints exist
        let next_id = ids.last().map(|&id| id + 1).unwrap_or(1);

        Ok(Self {
            dir: path.to_path_buf(),
            latest: RwLock::new(latest),
            next_checkpoint_id: AtomicU64::new(next_id),
        })
    }

    /// Read the newest checkpoint
    ///
    /// Returns `(last_seq, entries)`, or `None` for a store that was never
    /// checkpointed. A damaged checkpoint is an error: the WAL it replaced is
    /// gone, so there is nothing to fall back to.
    pub fn load_latest(&self) -> Result<Option<(u64, Vec<(Vec<u8>, Vec<u8>)>)>> {
        let latest = match self.latest.read().clone() {
            Some(c) => c,
            None => return Ok(None),
        };
        let mut reader = SSTableReader::open(&latest.path)?;
        let entries = reader.read_all()?;
        tracing::info!(
            id = latest.id,
            entries = entries.len(),
            last_seq = latest.last_seq,
            "Loaded checkpoint"
        );
        Ok(Some((latest.last_seq, entries)))
    }

    /// Write a new checkpoint from entries in comparator order
    ///
    /// The file becomes visible under its final name only once complete;
    /// the previous checkpoint is removed afterwards.
    pub fn write_checkpoint<'a, I>(&self, entries: I, last_seq: u64) -> Result<Checkpoint>
    where
        I: IntoIterator<Item = (&'a [u8], &'a [u8])>,
    {
        let id = self.next_checkpoint_id.fetch_add(1, Ordering::SeqCst);
        let final_path = self.checkpoint_path(id);
        let tmp_path = final_path.with_extension("sst.tmp");

        let mut builder = SSTableBuilder::new(&tmp_path, last_seq)?;
        for (key, value) in entries {
            builder.add(key, value)?;
        }
        let mut checkpoint = builder.finish()?;
        fs::rename(&tmp_path, &final_path)?;
        sync_dir(&self.dir)?;

        checkpoint.id = id;
        checkpoint.path = final_path;

        let previous = self.latest.write().replace(checkpoint.clone());
        if let Some(old) = previous {
            if let Err(e) = fs::remove_file(&old.path) {
                tracing::warn!(path = %old.path.display(), error = %e, "Failed to remove old checkpoint");
            }
        }

        tracing::info!(
            id,
            entries = checkpoint.entry_count,
            last_seq,
            bytes = checkpoint.file_size,
            "Checkpoint written"
        );
        Ok(checkpoint)
    }

    /// Metadata of the newest checkpoint
    pub fn latest(&self) -> Option<Checkpoint> {
        self.latest.read().clone()
    }

    /// Get the checkpoint directory path
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Get the next checkpoint ID (for testing/debugging)
    pub fn next_checkpoint_id(&self) -> u64 {
        self.next_checkpoint_id.load(Ordering::SeqCst)
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn checkpoint_path(&self, id: u64) -> PathBuf {
        Self::checkpoint_path_with_dir(&self.dir, id)
    }

    fn checkpoint_path_with_dir(dir: &Path, id: u64) -> PathBuf {
        dir.join(format!("checkpoint_{:06}.sst", id))
    }

    /// "checkpoint_000042.sst" → Some(42)
    fn parse_checkpoint_id(path: &Path) -> Option<u64> {
        if path.extension()? != "sst" {
            return None;
        }
        let name = path.file_stem()?.to_string_lossy();
        let id_str = name.strip_prefix("checkpoint_")?;
        id_str.parse().ok()
    }
}

/// Persist a rename by syncing its directory
fn sync_dir(dir: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        fs::File::open(dir)?.sync_all()?;
    }
    #[cfg(not(unix))]
    {
        let _ = dir;
    }
    Ok(())
}
