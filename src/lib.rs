//! # AtlasRDB
//!
//! Storage core for a Redis data model on an ordered key-value store:
//! - Binary codec flattening strings, hashes, lists, sets, sorted sets,
//!   bitsets and expirations into one ordered keyspace
//! - Semantic key comparator (score-ordered lists and sorted sets)
//! - Engine contract with per-context nested batches and snapshot reads
//! - Ordered in-process engine with WAL durability and checkpoints
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │               Data-structure / command layer                │
//! │        (KeyObject, MetaValue, ValueData, options)           │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │ encoded keys / values
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │              dyn KeyValueEngine  (+ Context)                │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!          ┌────────────┴────────────┐
//!          │                         │
//!          ▼                         ▼
//!   ┌─────────────┐          ┌──────────────────┐
//!   │     WAL     │          │ MemTable<C>      │
//!   │  (Append)   │          │ ordered by C     │
//!   └─────────────┘          └────────┬─────────┘
//!                                     │
//!                                     ▼
//!                             ┌─────────────┐
//!                             │ Checkpoint  │
//!                             │  (SSTable)  │
//!                             └─────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod codec;
pub mod comparator;
pub mod options;

pub mod wal;
pub mod memtable;
pub mod storage;
pub mod engine;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{AtlasError, Result};
pub use config::Config;
pub use comparator::{ArdbComparator, BytewiseComparator, KeyComparator};
pub use engine::{probe_key_type, Context, EngineIterator, KeyValueEngine, OrderedEngine};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of AtlasRDB
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
