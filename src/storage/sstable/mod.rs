//! SSTable Module
//!
//! Sorted String Table - an immutable on-disk image of the keyspace.
//!
//! ## File Format
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │ Header (22 bytes)                                                    │
//! │   Magic: "ARDB" (4) | Version: u16 (2) | Count: u64 (8) | Seq: u64 (8) │
//! ├──────────────────────────────────────────────────────────────────────┤
//! │ Data Block (variable)                                                │
//! │   [KeyLen: u32][ValLen: u32][Key][Value]                             │
//! │   ... repeated for each entry, in comparator order ...               │
//! ├──────────────────────────────────────────────────────────────────────┤
//! │ Footer (16 bytes)                                                    │
//! │   DataLen: u64 (8) | DataCRC: u32 (4) | Padding (4)                  │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! All integers are little-endian. A checkpoint holds live values only, so
//! there are no tombstones, and it is always read front to back, so there
//! is no index block.

mod builder;
mod iterator;
mod reader;

use std::path::PathBuf;

pub use builder::SSTableBuilder;
pub use iterator::SSTableIterator;
pub use reader::SSTableReader;

// =============================================================================
// Shared Constants (used by builder, reader, iterator)
// =============================================================================

/// Magic bytes identifying an AtlasRDB checkpoint file
pub(crate) const MAGIC: &[u8; 4] = b"ARDB";

/// Current SSTable format version
pub(crate) const VERSION: u16 = 1;

/// Header size: Magic (4) + Version (2) + EntryCount (8) + LastSeq (8) = 22 bytes
pub(crate) const HEADER_SIZE: u64 = 22;

/// Footer size: DataLen (8) + DataCRC (4) + Padding (4) = 16 bytes
pub(crate) const FOOTER_SIZE: u64 = 16;

pub(crate) fn le_u16(b: &[u8]) -> u16 {
    let mut raw = [0u8; 2];
    raw.copy_from_slice(&b[..2]);
    u16::from_le_bytes(raw)
}

pub(crate) fn le_u32(b: &[u8]) -> u32 {
    let mut raw = [0u8; 4];
    raw.copy_from_slice(&b[..4]);
    u32::from_le_bytes(raw)
}

pub(crate) fn le_u64(b: &[u8]) -> u64 {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&b[..8]);
    u64::from_le_bytes(raw)
}

// =============================================================================
// Checkpoint Metadata
// =============================================================================

/// Metadata of a finished checkpoint file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Checkpoint {
    /// Monotonic checkpoint id (from the file name)
    pub id: u64,
    /// Path to the SSTable file
    pub path: PathBuf,
    /// Number of entries in this checkpoint
    pub entry_count: u64,
    /// Sequence number the image is consistent with
    pub last_seq: u64,
    /// File size in bytes
    pub file_size: u64,
}
