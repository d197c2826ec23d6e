//! Batching, blob and key utilities for kvtoolbox
//!
//! This crate layers on any `Store`:
//! - BatchedAtomicOperation: unbounded atomic operations split into
//!   size-bounded native commits
//! - Blob storage: payloads of any size chunked across many keys
//! - Key utilities: equality, prefix tests, unique children, trees
//! - Size estimation for values and keys
//! - CryptoStore: AES-GCM encrypted blobs
//! - ToolboxConfig: batch ceilings from `kvtoolbox.toml`

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod batched_atomic;
pub mod blob;
pub mod config;
pub mod crypto;
pub mod estimate;
pub mod keys;

pub use batched_atomic::{
    batched_atomic, BatchAccumulator, BatchState, BatchedAtomicOperation, BatchedAtomicOptions,
    Operation,
};
pub use blob::{
    BlobKind, BlobMeta, BlobPayload, BlobReadOptions, BlobSetOptions, BlobStream, BlobValue,
    BLOB_KEY, BLOB_META_KEY, CHUNK_SIZE,
};
pub use config::{ToolboxConfig, CONFIG_FILE_NAME};
pub use crypto::{generate_key, AesGcmEncryptor, CryptoStore, Encryptor};
pub use estimate::{estimate_key_size, estimate_size};
pub use keys::{KeyTree, KeyTreeNode, UniqueChild};
