//! Engine Module
//!
//! The storage-engine contract the data-structure layer programs against,
//! plus the ordered in-process backend that implements it.
//!
//! ## Responsibilities
//! - Point reads and writes of encoded keys
//! - Per-context batches with nested begin/commit and auto-flush
//! - Snapshot-consistent reads while a batch is pending
//! - Ordered cursors positioned by the key comparator
//! - Administrative compaction and statistics
//!
//! ## Architecture
//! ```text
//!   caller (one Context per connection / transaction)
//!      │
//!      ▼
//!   ┌──────────────────────────┐
//!   │  dyn KeyValueEngine      │  put / get / del / find / batches
//!   └────────────┬─────────────┘
//!                ▼
//!   ┌──────────────────────────┐        ┌──────────────┐
//!   │  OrderedEngine<C>        │───────►│  WAL         │  every write
//!   │   last_seq (published)   │        └──────────────┘
//!   │   SnapshotList           │        ┌──────────────┐
//!   │   MemTable<C>            │───────►│  Checkpoint  │  full image
//!   └──────────────────────────┘        └──────────────┘
//! ```

mod batch;
mod context;
mod iterator;
mod ordered;
mod snapshot;

pub use batch::WriteBatch;
pub use context::Context;
pub use iterator::OrderedIterator;
pub use ordered::OrderedEngine;
pub use snapshot::{Snapshot, SnapshotList};

use crate::codec::key::{decode_key, KeyObject, KeyType};
use crate::error::Result;

/// Storage contract over encoded keys
///
/// Every call takes the caller's [`Context`]; batch state lives there and
/// never in the engine.
pub trait KeyValueEngine: Send + Sync {
    /// Write `value` under `key`, buffered when a batch is pending
    fn put(&self, ctx: &mut Context, key: &[u8], value: &[u8]) -> Result<()>;

    /// Read `key`; inside a batch the read goes through the context snapshot
    fn get(&self, ctx: &mut Context, key: &[u8], fill_cache: bool) -> Result<Option<Vec<u8>>>;

    /// Delete `key`, buffered when a batch is pending
    fn del(&self, ctx: &mut Context, key: &[u8]) -> Result<()>;

    fn begin_batch_write(&self, ctx: &mut Context);

    /// Release one nesting level; the outermost commit flushes the batch
    fn commit_batch_write(&self, ctx: &mut Context) -> Result<()>;

    /// Drop every buffered write and reset the nesting level
    fn discard_batch_write(&self, ctx: &mut Context);

    /// Cursor positioned at the first key >= `seek`
    fn find(&self, ctx: &mut Context, seek: &[u8], fill_cache: bool) -> Result<Box<dyn EngineIterator>>;

    /// Human-readable statistics report
    fn stats(&self) -> String;

    /// Reclaim space for keys in `[begin, end]`; `None` is unbounded
    fn compact_range(&self, begin: Option<&[u8]>, end: Option<&[u8]>) -> Result<()>;
}

/// Stateful cursor in comparator order
///
/// Moving past either end makes the cursor invalid; `key` and `value` are
/// then empty until it is re-seeked.
pub trait EngineIterator: Send {
    fn valid(&self) -> bool;
    fn next(&mut self);
    fn prev(&mut self);
    fn seek_to_first(&mut self);
    fn seek_to_last(&mut self);
    fn seek(&mut self, target: &[u8]);
    fn key(&self) -> &[u8];
    fn value(&self) -> &[u8];
}

/// Type of the stored key sharing `key`'s db, type and user key
///
/// Seeks to the encoded key and decodes whatever the cursor lands on with
/// `key` as the expected shape. `None` when nothing matches.
pub fn probe_key_type(
    engine: &dyn KeyValueEngine,
    ctx: &mut Context,
    key: &KeyObject,
) -> Result<Option<KeyType>> {
    let iter = engine.find(ctx, &key.encode(), true)?;
    if !iter.valid() {
        return Ok(None);
    }
    Ok(decode_key(iter.key(), Some(key)).map(|k| k.key_type()))
}
