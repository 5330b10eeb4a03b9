//! Snapshot-pinned cursor over the MemTable

use std::sync::Arc;

use super::snapshot::Snapshot;
use super::EngineIterator;
use crate::comparator::KeyComparator;
use crate::memtable::{MemTable, MemTableEntry};

/// Cursor over an [`OrderedEngine`](super::OrderedEngine) at a fixed sequence number
///
/// Holds its snapshot for its whole lifetime, so compaction keeps every
/// version it can reach.
pub struct OrderedIterator<C: KeyComparator> {
    memtable: Arc<MemTable<C>>,
    snapshot: Arc<Snapshot>,
    current: Option<MemTableEntry>,
}

impl<C: KeyComparator> OrderedIterator<C> {
    /// Unpositioned cursor; call one of the seek methods before reading
    pub(crate) fn new(memtable: Arc<MemTable<C>>, snapshot: Arc<Snapshot>) -> Self {
        Self {
            memtable,
            snapshot,
            current: None,
        }
    }

    /// Sequence number this cursor reads at
    pub fn sequence(&self) -> u64 {
        self.snapshot.sequence()
    }
}

impl<C: KeyComparator> EngineIterator for OrderedIterator<C> {
    fn valid(&self) -> bool {
        self.current.is_some()
    }

    fn next(&mut self) {
        if let Some(cur) = self.current.take() {
            self.current = self.memtable.next_after(&cur.key, self.sequence());
        }
    }

    fn prev(&mut self) {
        if let Some(cur) = self.current.take() {
            self.current = self.memtable.prev_before(&cur.key, self.sequence());
        }
    }

    fn seek_to_first(&mut self) {
        self.current = self.memtable.first(self.sequence());
    }

    fn seek_to_last(&mut self) {
        self.current = self.memtable.last(self.sequence());
    }

    fn seek(&mut self, target: &[u8]) {
        self.current = self.memtable.seek(target, self.sequence());
    }

    fn key(&self) -> &[u8] {
        match &self.current {
            Some(entry) => &entry.key,
            None => &[],
        }
    }

    fn value(&self) -> &[u8] {
        match &self.current {
            Some(entry) => &entry.value,
            None => &[],
        }
    }
}
