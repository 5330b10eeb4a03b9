//! Per-execution-context batch state
//!
//! Each connection or transaction owns one [`Context`] and passes it to
//! every engine call. Nested `begin` calls share one pending batch through a
//! reference count; only the outermost `commit` flushes it.
//!
//! ```text
//!   begin    refs 0 -> 1      writes buffer into the batch
//!   begin    refs 1 -> 2
//!   commit   refs 2 -> 1      nothing flushed
//!   commit   refs 1 -> 0      batch flushed atomically, snapshot released
//!
//!   discard  refs * -> 0      batch dropped, snapshot released
//! ```

use std::sync::Arc;

use super::batch::WriteBatch;
use super::snapshot::Snapshot;

/// Batch and snapshot state private to one execution context
///
/// Not shared between threads; every engine call takes it by `&mut`.
#[derive(Debug, Default)]
pub struct Context {
    pub(crate) batch: WriteBatch,
    pub(crate) refs: u32,
    pub(crate) snapshot: Option<Arc<Snapshot>>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether writes are currently buffered instead of applied
    pub fn in_batch(&self) -> bool {
        self.refs > 0
    }

    /// Nesting depth of `begin_batch_write` calls
    pub fn batch_refs(&self) -> u32 {
        self.refs
    }

    /// Writes buffered and not yet flushed
    pub fn pending(&self) -> &WriteBatch {
        &self.batch
    }

    /// Whether a batch read snapshot is currently held
    pub fn has_snapshot(&self) -> bool {
        self.snapshot.is_some()
    }

    pub(crate) fn begin(&mut self) {
        self.refs = self.refs.saturating_add(1);
    }

    /// Drop one nesting level; true when the outermost level was released
    pub(crate) fn release(&mut self) -> bool {
        if self.refs == 0 {
            return false;
        }
        self.refs -= 1;
        self.refs == 0
    }

    pub(crate) fn reset(&mut self) {
        self.batch.clear();
        self.refs = 0;
        self.snapshot = None;
    }
}
