//! Snapshots
//!
//! A snapshot pins a sequence number: reads through it see exactly the
//! writes published at or before that number. The engine keeps a registry
//! of live snapshots so compaction never drops a version one of them can
//! still see.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

/// Registry of live snapshot sequence numbers
#[derive(Debug, Default)]
pub struct SnapshotList {
    /// seq -> number of live handles
    live: Mutex<BTreeMap<u64, usize>>,
}

impl SnapshotList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pin the currently published sequence number
    ///
    /// The number is read under the registry lock, so a concurrent
    /// [`SnapshotList::horizon`] either sees this snapshot or returns a
    /// horizon no greater than its sequence number.
    pub fn acquire(self: &Arc<Self>, published: &AtomicU64) -> Snapshot {
        let mut live = self.live.lock();
        let seq = published.load(Ordering::Acquire);
        *live.entry(seq).or_insert(0) += 1;
        Snapshot {
            seq,
            list: Arc::clone(self),
        }
    }

    fn release(&self, seq: u64) {
        let mut live = self.live.lock();
        if let Some(count) = live.get_mut(&seq) {
            *count -= 1;
            if *count == 0 {
                live.remove(&seq);
            }
        }
    }

    /// Oldest sequence number any reader can still ask for
    pub fn horizon(&self, published: &AtomicU64) -> u64 {
        let live = self.live.lock();
        let current = published.load(Ordering::Acquire);
        live.keys().next().map_or(current, |&oldest| oldest.min(current))
    }

    /// Number of live snapshot handles
    pub fn len(&self) -> usize {
        self.live.lock().values().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.live.lock().is_empty()
    }
}

/// A pinned read view; deregisters itself when dropped
#[derive(Debug)]
pub struct Snapshot {
    seq: u64,
    list: Arc<SnapshotList>,
}

impl Snapshot {
    /// Sequence number this snapshot reads at
    pub fn sequence(&self) -> u64 {
        self.seq
    }
}

impl Drop for Snapshot {
    fn drop(&mut self) {
        self.list.release(self.seq);
    }
}
