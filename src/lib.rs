//! kvtoolbox - batched transactions and blob storage for ordered key-value stores
//!
//! kvtoolbox layers three things on top of any store implementing [`Store`]:
//! atomic operations of unbounded size, payloads of unbounded size, and
//! helpers for navigating hierarchical keys.
//!
//! # Quick Start
//!
//! ```
//! use kvtoolbox::{batched_atomic, blob, key, BatchedAtomicOptions, BlobSetOptions, MemoryStore};
//!
//! let store = MemoryStore::new();
//!
//! // Any number of operations, committed in size-bounded batches
//! let mut op = batched_atomic(&store, BatchedAtomicOptions::default());
//! for i in 0..5_000i64 {
//!     op.set(key!["items", i], i);
//! }
//! let results = op.commit()?;
//! assert_eq!(results.len(), 6);
//!
//! // Payloads larger than one value, chunked across keys
//! let file = vec![0u8; 1_000_000];
//! blob::set(&store, &key!["files", "big"], file.clone().into(), BlobSetOptions::default())?;
//! assert_eq!(blob::get(&store, &key!["files", "big"], Default::default())?, Some(file));
//! # Ok::<(), kvtoolbox::Error>(())
//! ```
//!
//! # Architecture
//!
//! - `kvtoolbox-core`: keys, values, the `Store` contract and errors
//! - `kvtoolbox-storage`: `MemoryStore`, the in-memory reference store
//! - `kvtoolbox-engine`: batching, blobs, key utilities, encryption, config

pub use kvtoolbox_core::{
    key, AtomicBuilder, AtomicCheck, AtomicOperation, BatchLimits, CommitResult, Enqueue,
    EnqueueOptions, Entry, Error, Key, KeyPart, KvU64, ListIterator, ListOptions, ListSelector,
    MaybeEntry, Mutation, MutationKind, Result, SetOptions, Store, StoreLimits, Value,
    Versionstamp,
};
pub use kvtoolbox_engine::{
    batched_atomic, blob, estimate, generate_key, keys, AesGcmEncryptor, BatchState,
    BatchedAtomicOperation, BatchedAtomicOptions, BlobKind, BlobMeta, BlobPayload,
    BlobReadOptions, BlobSetOptions, BlobStream, BlobValue, CryptoStore, Encryptor, KeyTree,
    KeyTreeNode, Operation, ToolboxConfig, UniqueChild, BLOB_KEY, BLOB_META_KEY, CHUNK_SIZE,
    CONFIG_FILE_NAME,
};
pub use kvtoolbox_storage::{MemoryStore, StoreStatsSnapshot};
