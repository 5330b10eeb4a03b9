//! Write batches
//!
//! An ordered list of puts and deletes applied atomically under a single
//! sequence number.

use crate::wal::Operation;

/// Pending writes of one context
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteBatch {
    ops: Vec<Operation>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, key: &[u8], value: &[u8]) {
        self.ops.push(Operation::Put {
            key: key.to_vec(),
            value: value.to_vec(),
        });
    }

    pub fn delete(&mut self, key: &[u8]) {
        self.ops.push(Operation::Delete { key: key.to_vec() });
    }

    /// Buffered operations
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn clear(&mut self) {
        self.ops.clear();
    }

    pub fn operations(&self) -> &[Operation] {
        &self.ops
    }

    /// Move the buffered operations out, leaving the batch empty
    pub fn take(&mut self) -> Vec<Operation> {
        std::mem::take(&mut self.ops)
    }
}
