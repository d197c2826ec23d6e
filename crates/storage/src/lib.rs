//! Storage layer for kvtoolbox
//!
//! This crate implements the reference backend for the `Store` trait:
//! - MemoryStore: BTreeMap-based ordered storage with RwLock
//! - Native atomic commits with versionstamp checks and sum/min/max
//! - Native per-commit limits (`StoreLimits`)
//! - Logical expiry and an in-memory message queue
//! - Paged list cursors and access counters for tests
//!
//! It is not a durable engine: there is no WAL and nothing touches disk.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod memory;
pub mod queue;
pub mod stored_value;

pub use memory::{MemoryStore, StoreStatsSnapshot, DEFAULT_LIST_BATCH_SIZE};
pub use queue::{MessageQueue, QueuedMessage};
pub use stored_value::StoredValue;
