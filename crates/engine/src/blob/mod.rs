//! Chunked blob storage
//!
//! A blob stored at key `K` occupies:
//! - `K ++ [BLOB_KEY, n]` for n = 1, 2, ...: chunks of at most `CHUNK_SIZE`
//!   bytes, contiguous from 1
//! - `K ++ [BLOB_META_KEY]`: a `BlobMeta` object describing the payload
//!
//! Nothing is stored at `K` itself. Writes and deletes go through
//! `BatchedAtomicOperation`, so a blob larger than one native commit spans
//! several commits. A reader racing a write may see a mix of old and new
//! chunks.

mod codec;
pub(crate) mod read;

use std::fmt;
use std::io::Read;
use std::time::Duration;

use kvtoolbox_core::{CommitResult, Error, Key, KeyPart, Result, Store, Value};
use std::collections::BTreeMap;

use crate::batched_atomic::{batched_atomic, BatchedAtomicOptions};

pub use codec::{encode_blob_delete, encode_blob_write};
pub use read::BlobStream;

/// Maximum bytes per chunk
pub const CHUNK_SIZE: usize = 63_000;

/// Key part marking the chunk sub-space of a blob
pub const BLOB_KEY: &str = "__kvtoolbox_blob__";

/// Key part marking the metadata entry of a blob
pub const BLOB_META_KEY: &str = "__kvtoolbox_meta__";

// ============================================================================
// Key layout
// ============================================================================

/// Prefix under which the chunks of `key` live
pub fn chunk_prefix(key: &Key) -> Key {
    key.with(BLOB_KEY)
}

/// Key of chunk `index` (1-based)
pub fn chunk_key(key: &Key, index: usize) -> Key {
    chunk_prefix(key).with(KeyPart::Float(index as f64))
}

/// Key of the metadata entry of `key`
pub fn meta_key(key: &Key) -> Key {
    key.with(BLOB_META_KEY)
}

// ============================================================================
// Payloads
// ============================================================================

/// Bytes to store as a blob
pub enum BlobPayload {
    /// An in-memory buffer
    Bytes(Vec<u8>),
    /// A finite byte stream, consumed in chunk-sized reads
    Reader(Box<dyn Read + Send>),
    /// A typed blob
    Blob {
        /// Payload
        data: Vec<u8>,
        /// Media type
        content_type: String,
    },
    /// A named file
    File {
        /// Payload
        data: Vec<u8>,
        /// Media type
        content_type: String,
        /// File name
        name: String,
        /// Last modification time, milliseconds since the epoch
        last_modified: i64,
    },
}

impl BlobPayload {
    /// Wrap a reader
    pub fn reader(reader: impl Read + Send + 'static) -> Self {
        BlobPayload::Reader(Box::new(reader))
    }
}

impl fmt::Debug for BlobPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlobPayload::Bytes(data) => f.debug_tuple("Bytes").field(&data.len()).finish(),
            BlobPayload::Reader(_) => f.write_str("Reader(..)"),
            BlobPayload::Blob { data, content_type } => f
                .debug_struct("Blob")
                .field("len", &data.len())
                .field("content_type", content_type)
                .finish(),
            BlobPayload::File {
                data,
                content_type,
                name,
                last_modified,
            } => f
                .debug_struct("File")
                .field("len", &data.len())
                .field("content_type", content_type)
                .field("name", name)
                .field("last_modified", last_modified)
                .finish(),
        }
    }
}

impl From<Vec<u8>> for BlobPayload {
    fn from(data: Vec<u8>) -> Self {
        BlobPayload::Bytes(data)
    }
}

impl From<&[u8]> for BlobPayload {
    fn from(data: &[u8]) -> Self {
        BlobPayload::Bytes(data.to_vec())
    }
}

// ============================================================================
// Metadata
// ============================================================================

/// Shape of the payload a blob was written from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlobKind {
    /// Raw bytes or a stream
    Buffer,
    /// Typed blob
    Blob,
    /// Named file
    File,
}

impl BlobKind {
    fn as_str(self) -> &'static str {
        match self {
            BlobKind::Buffer => "buffer",
            BlobKind::Blob => "blob",
            BlobKind::File => "file",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "buffer" => Some(BlobKind::Buffer),
            "blob" => Some(BlobKind::Blob),
            "file" => Some(BlobKind::File),
            _ => None,
        }
    }
}

/// Metadata stored alongside a blob's chunks
#[derive(Debug, Clone, PartialEq)]
pub struct BlobMeta {
    /// Payload shape
    pub kind: BlobKind,
    /// Media type, for blobs and files
    pub content_type: Option<String>,
    /// File name, for files
    pub name: Option<String>,
    /// Last modification time, for files
    pub last_modified: Option<i64>,
    /// Payload length in bytes, before any encryption
    pub size: u64,
    /// Whether the stored chunks are ciphertext
    pub encrypted: bool,
}

impl BlobMeta {
    /// Metadata for a raw buffer of `size` bytes
    pub fn buffer(size: u64) -> Self {
        BlobMeta {
            kind: BlobKind::Buffer,
            content_type: None,
            name: None,
            last_modified: None,
            size,
            encrypted: false,
        }
    }

    /// Encode as the stored object value
    pub fn to_value(&self) -> Value {
        let mut fields = BTreeMap::new();
        fields.insert("kind".to_string(), Value::from(self.kind.as_str()));
        if let Some(content_type) = &self.content_type {
            fields.insert("type".to_string(), Value::from(content_type.as_str()));
        }
        if let Some(name) = &self.name {
            fields.insert("name".to_string(), Value::from(name.as_str()));
        }
        if let Some(last_modified) = self.last_modified {
            fields.insert("lastModified".to_string(), Value::Int(last_modified));
        }
        fields.insert("size".to_string(), Value::Int(self.size as i64));
        if self.encrypted {
            fields.insert("encrypted".to_string(), Value::Bool(true));
        }
        Value::Object(fields)
    }

    /// Decode a stored metadata value
    ///
    /// # Errors
    ///
    /// Returns `Error::ShapeViolation` if the value is not a metadata object.
    pub fn from_value(value: &Value) -> Result<Self> {
        let fields = value.as_object().ok_or_else(|| {
            Error::ShapeViolation(format!(
                "blob metadata must be an Object, found {}",
                value.type_name()
            ))
        })?;
        let kind = fields
            .get("kind")
            .and_then(Value::as_str)
            .and_then(BlobKind::parse)
            .ok_or_else(|| Error::ShapeViolation("blob metadata has no valid kind".into()))?;
        let text = |name: &str| fields.get(name).and_then(Value::as_str).map(str::to_string);

        Ok(BlobMeta {
            kind,
            content_type: text("type"),
            name: text("name"),
            last_modified: fields.get("lastModified").and_then(Value::as_int),
            size: fields
                .get("size")
                .and_then(Value::as_int)
                .map_or(0, |n| n.max(0) as u64),
            encrypted: fields
                .get("encrypted")
                .and_then(Value::as_bool)
                .unwrap_or(false),
        })
    }
}

// ============================================================================
// Typed read results
// ============================================================================

/// A blob re-wrapped with its stored metadata
#[derive(Debug, Clone, PartialEq)]
pub enum BlobValue {
    /// Typed blob; raw buffers come back with an empty type
    Blob {
        /// Payload
        data: Vec<u8>,
        /// Media type
        content_type: String,
    },
    /// Named file
    File {
        /// Payload
        data: Vec<u8>,
        /// Media type
        content_type: String,
        /// File name
        name: String,
        /// Last modification time, milliseconds since the epoch
        last_modified: i64,
    },
}

impl BlobValue {
    /// Combine reassembled bytes with optional metadata
    pub fn from_parts(data: Vec<u8>, meta: Option<&BlobMeta>) -> Self {
        match meta {
            Some(meta) if meta.kind == BlobKind::File => BlobValue::File {
                data,
                content_type: meta.content_type.clone().unwrap_or_default(),
                name: meta.name.clone().unwrap_or_default(),
                last_modified: meta.last_modified.unwrap_or_default(),
            },
            Some(meta) => BlobValue::Blob {
                data,
                content_type: meta.content_type.clone().unwrap_or_default(),
            },
            None => BlobValue::Blob {
                data,
                content_type: String::new(),
            },
        }
    }

    /// The payload bytes
    pub fn data(&self) -> &[u8] {
        match self {
            BlobValue::Blob { data, .. } | BlobValue::File { data, .. } => data,
        }
    }

    /// The media type
    pub fn content_type(&self) -> &str {
        match self {
            BlobValue::Blob { content_type, .. } | BlobValue::File { content_type, .. } => {
                content_type
            }
        }
    }
}

// ============================================================================
// Options
// ============================================================================

/// Options for writing a blob
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BlobSetOptions {
    /// Expire every chunk and the metadata after this duration
    pub expire_in: Option<Duration>,
    /// Page size when listing existing chunks
    pub batch_size: Option<usize>,
}

/// Options for reading or removing a blob
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BlobReadOptions {
    /// Page size when listing chunks
    pub batch_size: Option<usize>,
}

// ============================================================================
// Store-backed operations
// ============================================================================

/// Reassemble the blob at `key`
///
/// Returns `None` when neither chunks nor metadata exist. Reading stops at
/// the first missing chunk index.
///
/// # Errors
///
/// Returns `Error::ShapeViolation` if a chunk is not a byte buffer, or the
/// store's error if a read fails.
pub fn get<S: Store + ?Sized>(
    store: &S,
    key: &Key,
    options: BlobReadOptions,
) -> Result<Option<Vec<u8>>> {
    read::read_all(store, key, options.batch_size)
}

/// Stream the chunks of the blob at `key` in order
///
/// Chunks are fetched lazily as the stream is pulled. A blob with no
/// chunks yields an empty stream.
///
/// # Errors
///
/// Returns the store's error if the listing cannot start. Later errors are
/// yielded by the stream.
pub fn get_as_stream<'s, S: Store + ?Sized>(
    store: &'s S,
    key: &Key,
    options: BlobReadOptions,
) -> Result<BlobStream<'s>> {
    BlobStream::open(store, key, options.batch_size)
}

/// Reassemble the blob at `key` and re-wrap it with its metadata
pub fn get_as_blob<S: Store + ?Sized>(
    store: &S,
    key: &Key,
    options: BlobReadOptions,
) -> Result<Option<BlobValue>> {
    let Some(data) = get(store, key, options)? else {
        return Ok(None);
    };
    let meta = get_meta(store, key)?;
    Ok(Some(BlobValue::from_parts(data, meta.as_ref())))
}

/// Read the metadata of the blob at `key`
///
/// # Errors
///
/// Returns `Error::ShapeViolation` if the stored metadata is malformed.
pub fn get_meta<S: Store + ?Sized>(store: &S, key: &Key) -> Result<Option<BlobMeta>> {
    match store.get(&meta_key(key))?.value {
        Some(value) => BlobMeta::from_value(&value).map(Some),
        None => Ok(None),
    }
}

/// Store `payload` as a blob at `key`, replacing any previous blob
///
/// Chunks left over from a longer previous blob are deleted. Returns the
/// result of the final sub-commit.
///
/// # Errors
///
/// Returns an error if the payload stream fails or a commit errors.
pub fn set<S: Store>(
    store: &S,
    key: &Key,
    payload: BlobPayload,
    options: BlobSetOptions,
) -> Result<CommitResult> {
    let mut operation = batched_atomic(
        store,
        BatchedAtomicOptions {
            batch_size: options.batch_size,
            ..BatchedAtomicOptions::default()
        },
    );
    operation.set_blob(key.clone(), payload, options);
    last_result(operation.commit()?)
}

/// Delete the blob at `key`: every chunk plus the metadata
pub fn remove<S: Store>(store: &S, key: &Key, options: BlobReadOptions) -> Result<()> {
    let mut operation = batched_atomic(
        store,
        BatchedAtomicOptions {
            batch_size: options.batch_size,
            ..BatchedAtomicOptions::default()
        },
    );
    operation.delete_blob(key.clone());
    operation.commit().map(|_| ())
}

pub(crate) fn last_result(mut results: Vec<CommitResult>) -> Result<CommitResult> {
    results
        .pop()
        .ok_or_else(|| Error::InvalidOperation("blob write produced no commit".into()))
}
