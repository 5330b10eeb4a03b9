//! WAL Writer
//!
//! Handles appending entries to the WAL file.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use super::{Operation, WalEntry, WalReader};
use crate::config::WalSyncStrategy;
use crate::error::Result;

/// Writes entries to the WAL file
pub struct WalWriter {
    file: BufWriter<File>,
    path: PathBuf,
    /// LSN the next append will receive
    current_lsn: u64,
    sync_strategy: WalSyncStrategy,
    /// Entries appended since the last fsync
    unsynced: usize,
    size_bytes: u64,
}

impl WalWriter {
    /// Open or create a WAL file
    ///
    /// The first LSN handed out is the larger of `next_lsn` and one past the
    /// last valid entry already in the file. Run [`WalRecovery`](super::WalRecovery)
    /// first if the file may end in a torn frame.
    pub fn open(path: &Path, sync_strategy: WalSyncStrategy, next_lsn: u64) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .read(true)
            .open(path)?;
        let size_bytes = file.metadata()?.len();

        let mut last_lsn = 0;
        if size_bytes > 0 {
            for entry in WalReader::open(path)?.entries() {
                match entry {
                    Ok(e) => last_lsn = e.lsn,
                    Err(_) => break,
                }
            }
        }

        Ok(Self {
            file: BufWriter::new(file),
            path: path.to_path_buf(),
            current_lsn: next_lsn.max(last_lsn + 1).max(1),
            sync_strategy,
            unsynced: 0,
            size_bytes,
        })
    }

    /// Append an operation, returning the LSN it was logged under
    pub fn append(&mut self, operation: Operation) -> Result<u64> {
        let lsn = self.current_lsn;
        let frame = WalEntry::new(lsn, operation).serialize()?;
        self.file.write_all(&frame)?;
        self.size_bytes += frame.len() as u64;
        self.current_lsn += 1;
        self.unsynced += 1;

        let due = match self.sync_strategy {
            WalSyncStrategy::EveryWrite => true,
            WalSyncStrategy::EveryNEntries { count } => self.unsynced >= count.max(1),
        };
        if due {
            self.sync()?;
        }
        Ok(lsn)
    }

    /// Force sync to disk
    pub fn sync(&mut self) -> Result<()> {
        self.file.flush()?;
        self.file.get_ref().sync_data()?;
        self.unsynced = 0;
        Ok(())
    }

    /// Discard every entry once their effects are durable elsewhere
    ///
    /// The LSN keeps counting from where it was, so sequence numbers stay
    /// monotonic across checkpoints.
    pub fn truncate(&mut self) -> Result<()> {
        self.file.flush()?;
        self.file.get_ref().set_len(0)?;
        self.file.get_ref().sync_all()?;
        self.size_bytes = 0;
        self.unsynced = 0;
        tracing::debug!(path = %self.path.display(), next_lsn = self.current_lsn, "WAL truncated");
        Ok(())
    }

    /// Get the LSN the next append will receive
    pub fn current_lsn(&self) -> u64 {
        self.current_lsn
    }

    /// Bytes currently in the log
    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
