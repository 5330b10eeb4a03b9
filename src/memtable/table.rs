//! MemTable implementation
//!
//! BTreeMap keyed by [`InternalKey`] behind a parking_lot RwLock.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::marker::PhantomData;
use std::ops::Bound;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering as AtomicOrdering};

use parking_lot::RwLock;

use super::MemTableEntry;
use crate::comparator::KeyComparator;

/// Fixed per-version overhead counted towards the approximate size
const VERSION_OVERHEAD: usize = 16;

/// A user key plus the sequence number of the write that produced it
///
/// Ordered by the comparator `C` on the user key, then by sequence number
/// descending so the newest version of a key comes first.
pub struct InternalKey<C> {
    pub user_key: Vec<u8>,
    pub seq: u64,
    _cmp: PhantomData<fn() -> C>,
}

impl<C> InternalKey<C> {
    pub fn new(user_key: Vec<u8>, seq: u64) -> Self {
        Self {
            user_key,
            seq,
            _cmp: PhantomData,
        }
    }
}

impl<C> Clone for InternalKey<C> {
    fn clone(&self) -> Self {
        Self::new(self.user_key.clone(), self.seq)
    }
}

impl<C> std::fmt::Debug for InternalKey<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InternalKey")
            .field("user_key", &self.user_key)
            .field("seq", &self.seq)
            .finish()
    }
}

impl<C: KeyComparator> Ord for InternalKey<C> {
    fn cmp(&self, other: &Self) -> Ordering {
        C::compare(&self.user_key, &other.user_key).then_with(|| other.seq.cmp(&self.seq))
    }
}

impl<C: KeyComparator> PartialOrd for InternalKey<C> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<C: KeyComparator> PartialEq for InternalKey<C> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<C: KeyComparator> Eq for InternalKey<C> {}

type VersionMap<C> = BTreeMap<InternalKey<C>, Option<Vec<u8>>>;
type VersionIter<'a, C> = Box<dyn Iterator<Item = (&'a InternalKey<C>, &'a Option<Vec<u8>>)> + 'a>;

/// In-memory multi-version table
pub struct MemTable<C: KeyComparator> {
    data: RwLock<VersionMap<C>>,
    /// Approximate size in bytes of all stored versions
    size: AtomicUsize,
    /// Number of stored versions, tombstones included
    entry_count: AtomicUsize,
}

impl<C: KeyComparator> MemTable<C> {
    /// Create a new empty MemTable
    pub fn new() -> Self {
        Self {
            data: RwLock::new(BTreeMap::new()),
            size: AtomicUsize::new(0),
            entry_count: AtomicUsize::new(0),
        }
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Insert a version of `key` written at `seq`
    ///
    /// Returns the new approximate size in bytes.
    pub fn put(&self, key: Vec<u8>, value: Vec<u8>, seq: u64) -> usize {
        self.insert(key, Some(value), seq)
    }

    /// Insert a tombstone for `key` at `seq`
    pub fn delete(&self, key: Vec<u8>, seq: u64) -> usize {
        self.insert(key, None, seq)
    }

    fn insert(&self, key: Vec<u8>, value: Option<Vec<u8>>, seq: u64) -> usize {
        let added = version_size(&key, &value);
        let mut data = self.data.write();
        let ik = InternalKey::new(key, seq);
        // a batch writing one key twice replaces the version at the same seq
        let removed = data.get(&ik).map(|old| version_size(&ik.user_key, old));
        data.insert(ik, value);
        match removed {
            Some(old_size) => {
                self.size.fetch_sub(old_size, AtomicOrdering::Relaxed);
            }
            None => {
                self.entry_count.fetch_add(1, AtomicOrdering::Relaxed);
            }
        }
        self.size.fetch_add(added, AtomicOrdering::Relaxed) + added
    }

    // =========================================================================
    // Reads at a sequence number
    // =========================================================================

    /// Newest value of `key` visible at `snapshot`; `None` if absent or deleted
    pub fn get(&self, key: &[u8], snapshot: u64) -> Option<Vec<u8>> {
        let data = self.data.read();
        let start = InternalKey::new(key.to_vec(), snapshot);
        let (ik, value) = data.range(start..).next()?;
        if C::compare(&ik.user_key, key) != Ordering::Equal {
            return None;
        }
        value.clone()
    }

    /// Newest value of `key` at the currently published sequence number
    ///
    /// `published` is read under the table lock, so a concurrent
    /// [`MemTable::compact_range`] cannot drop the version this read needs.
    pub fn get_published(&self, key: &[u8], published: &AtomicU64) -> Option<Vec<u8>> {
        let data = self.data.read();
        let snapshot = published.load(AtomicOrdering::Acquire);
        let start = InternalKey::new(key.to_vec(), snapshot);
        let (ik, value) = data.range(start..).next()?;
        if C::compare(&ik.user_key, key) != Ordering::Equal {
            return None;
        }
        value.clone()
    }

    /// First visible entry with user key >= `target`
    pub fn seek(&self, target: &[u8], snapshot: u64) -> Option<MemTableEntry> {
        let data = self.data.read();
        let start = InternalKey::new(target.to_vec(), u64::MAX);
        first_visible::<C, _>(data.range(start..), snapshot)
    }

    /// First visible entry with user key > `key`
    pub fn next_after(&self, key: &[u8], snapshot: u64) -> Option<MemTableEntry> {
        let data = self.data.read();
        let start = Bound::Excluded(InternalKey::new(key.to_vec(), 0));
        first_visible::<C, _>(data.range((start, Bound::Unbounded)), snapshot)
    }

    /// Last visible entry with user key < `key`
    pub fn prev_before(&self, key: &[u8], snapshot: u64) -> Option<MemTableEntry> {
        let data = self.data.read();
        let end = InternalKey::new(key.to_vec(), u64::MAX);
        last_visible::<C, _>(data.range(..end).rev(), snapshot)
    }

    pub fn first(&self, snapshot: u64) -> Option<MemTableEntry> {
        let data = self.data.read();
        first_visible::<C, _>(data.iter(), snapshot)
    }

    pub fn last(&self, snapshot: u64) -> Option<MemTableEntry> {
        let data = self.data.read();
        last_visible::<C, _>(data.iter().rev(), snapshot)
    }

    /// Every live entry visible at `snapshot`, in comparator order
    pub fn visible_entries(&self, snapshot: u64) -> Vec<MemTableEntry> {
        let data = self.data.read();
        let mut out = Vec::new();
        let mut resolved: Option<&[u8]> = None;
        for (ik, value) in data.iter() {
            if ik.seq > snapshot {
                continue;
            }
            if let Some(done) = resolved {
                if C::compare(&ik.user_key, done) == Ordering::Equal {
                    continue;
                }
            }
            resolved = Some(ik.user_key.as_slice());
            if let Some(v) = value {
                out.push(MemTableEntry {
                    key: ik.user_key.clone(),
                    value: v.clone(),
                });
            }
        }
        out
    }

    // =========================================================================
    // Garbage collection
    // =========================================================================

    /// Drop versions in `[begin, end]` that no reader at or after `horizon` can see
    ///
    /// Per user key, every version newer than `horizon` is kept, plus the
    /// newest version at or below it unless that version is a tombstone.
    /// Returns the number of versions removed.
    pub fn compact_range(&self, begin: Option<&[u8]>, end: Option<&[u8]>, horizon: u64) -> usize {
        let mut data = self.data.write();

        let mut doomed = Vec::new();
        {
            let iter: VersionIter<'_, C> = match begin {
                Some(b) => Box::new(data.range(InternalKey::new(b.to_vec(), u64::MAX)..)),
                None => Box::new(data.iter()),
            };
            let mut resolved: Option<&[u8]> = None;
            for (ik, value) in iter {
                if let Some(e) = end {
                    if C::compare(&ik.user_key, e) == Ordering::Greater {
                        break;
                    }
                }
                if ik.seq > horizon {
                    continue;
                }
                let shadowed = resolved
                    .map_or(false, |done| C::compare(&ik.user_key, done) == Ordering::Equal);
                if shadowed || value.is_none() {
                    doomed.push(ik.clone());
                }
                resolved = Some(ik.user_key.as_slice());
            }
        }

        for ik in &doomed {
            if let Some(value) = data.remove(ik) {
                self.size
                    .fetch_sub(version_size(&ik.user_key, &value), AtomicOrdering::Relaxed);
                self.entry_count.fetch_sub(1, AtomicOrdering::Relaxed);
            }
        }
        doomed.len()
    }

    // =========================================================================
    // Accounting
    // =========================================================================

    /// Approximate size in bytes
    pub fn size(&self) -> usize {
        self.size.load(AtomicOrdering::Relaxed)
    }

    /// Stored versions, tombstones included
    pub fn entry_count(&self) -> usize {
        self.entry_count.load(AtomicOrdering::Relaxed)
    }

    pub fn is_empty(&self) -> bool {
        self.entry_count() == 0
    }
}

impl<C: KeyComparator> Default for MemTable<C> {
    fn default() -> Self {
        Self::new()
    }
}

fn version_size(key: &[u8], value: &Option<Vec<u8>>) -> usize {
    key.len() + value.as_ref().map_or(0, |v| v.len()) + VERSION_OVERHEAD
}

/// Forward scan: the first user key whose newest version at `snapshot` is live
fn first_visible<'a, C, I>(iter: I, snapshot: u64) -> Option<MemTableEntry>
where
    C: KeyComparator,
    I: Iterator<Item = (&'a InternalKey<C>, &'a Option<Vec<u8>>)>,
{
    let mut resolved: Option<&[u8]> = None;
    for (ik, value) in iter {
        if ik.seq > snapshot {
            continue;
        }
        if let Some(done) = resolved {
            if C::compare(&ik.user_key, done) == Ordering::Equal {
                continue;
            }
        }
        match value {
            Some(v) => {
                return Some(MemTableEntry {
                    key: ik.user_key.clone(),
                    value: v.clone(),
                })
            }
            None => resolved = Some(ik.user_key.as_slice()),
        }
    }
    None
}

/// Reverse scan: versions of one user key arrive oldest first, so the last
/// one at or below `snapshot` is the visible one
fn last_visible<'a, C, I>(iter: I, snapshot: u64) -> Option<MemTableEntry>
where
    C: KeyComparator,
    I: Iterator<Item = (&'a InternalKey<C>, &'a Option<Vec<u8>>)>,
{
    let mut current: Option<&'a [u8]> = None;
    let mut candidate: Option<&'a Option<Vec<u8>>> = None;
    for (ik, value) in iter {
        let same = current.map_or(false, |c| C::compare(c, &ik.user_key) == Ordering::Equal);
        if !same {
            if let (Some(key), Some(Some(v))) = (current, candidate) {
                return Some(MemTableEntry {
                    key: key.to_vec(),
                    value: v.clone(),
                });
            }
            current = Some(ik.user_key.as_slice());
            candidate = None;
        }
        if ik.seq <= snapshot {
            candidate = Some(value);
        }
    }
    match (current, candidate) {
        (Some(key), Some(Some(v))) => Some(MemTableEntry {
            key: key.to_vec(),
            value: v.clone(),
        }),
        _ => None,
    }
}
