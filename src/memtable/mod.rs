//! MemTable Module
//!
//! In-memory, multi-version, comparator-ordered table holding the whole
//! keyspace between checkpoints.
//!
//! ## Responsibilities
//! - Ordered storage under a pluggable [`KeyComparator`](crate::comparator::KeyComparator)
//! - One version per write, tagged with the sequence number that wrote it
//! - Reads and cursor moves at a sequence number (snapshot reads)
//! - Garbage collection of versions no snapshot can see
//!
//! ## Layout
//! ```text
//!   BTreeMap<InternalKey, Option<value>>
//!
//!   InternalKey = (user key by comparator, seq descending)
//!
//!   ("a", 9) -> Some(v3)      newest first, so a seek to ("a", snap)
//!   ("a", 5) -> None          lands on the newest version <= snap
//!   ("a", 2) -> Some(v1)
//!   ("b", 7) -> Some(w1)
//! ```
//!
//! `None` is a tombstone.

mod table;

pub use table::{InternalKey, MemTable};

/// A visible entry returned by MemTable reads
#[derive(Debug, Clone, PartialEq)]
pub struct MemTableEntry {
    pub key: Vec<u8>,
    pub value: Vec<u8>,
}
