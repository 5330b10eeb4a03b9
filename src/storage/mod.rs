//! Storage Module
//!
//! Persistent checkpoints of the keyspace.
//!
//! ## Responsibilities
//! - Persist full keyspace images in comparator order
//! - Record the sequence number each image is consistent with
//! - Keep only the newest complete image on disk
//! - Pin the comparator identity a store was created with
//!
//! ## Layout
//! ```text
//! {data_dir}/
//!   ├── IDENTITY                         comparator=<name>
//!   ├── wal.log
//!   └── checkpoints/
//!         └── checkpoint_000007.sst      newest complete image
//! ```

mod manager;
mod manifest;
mod sstable;

pub use manager::StorageManager;
pub use manifest::Manifest;
pub use sstable::{Checkpoint, SSTableBuilder, SSTableIterator, SSTableReader};
