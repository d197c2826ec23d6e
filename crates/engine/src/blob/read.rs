//! Chunk reassembly
//!
//! Chunks are listed in key order under `K ++ [BLOB_KEY]`. Reading expects
//! indices 1, 2, 3, ... and stops at the first gap, which is logged. A
//! chunk value that is not a byte buffer is a shape violation.

use kvtoolbox_core::{Error, Key, ListIterator, ListOptions, ListSelector, Result, Store, Value};
use tracing::warn;

use super::{chunk_prefix, meta_key};

/// Lazy stream of a blob's chunks
///
/// Each item is one stored chunk. The stream ends at the last contiguous
/// chunk, or after yielding an error.
pub struct BlobStream<'s> {
    key: Key,
    entries: ListIterator<'s>,
    expected: u64,
    done: bool,
}

impl<'s> BlobStream<'s> {
    pub(crate) fn open<S: Store + ?Sized>(
        store: &'s S,
        key: &Key,
        batch_size: Option<usize>,
    ) -> Result<Self> {
        let entries = store.list(
            ListSelector::prefix(chunk_prefix(key)),
            ListOptions::with_batch_size(batch_size),
        )?;
        Ok(BlobStream {
            key: key.clone(),
            entries,
            expected: 1,
            done: false,
        })
    }

    /// Number of chunks yielded so far
    pub fn chunks_read(&self) -> u64 {
        self.expected - 1
    }
}

impl Iterator for BlobStream<'_> {
    type Item = Result<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let entry = match self.entries.next() {
            None => {
                self.done = true;
                return None;
            }
            Some(Err(e)) => {
                self.done = true;
                return Some(Err(e));
            }
            Some(Ok(entry)) => entry,
        };

        let index = entry.key.last().and_then(|part| part.as_index());
        if index != Some(self.expected) {
            warn!(
                target: "kvtoolbox::blob",
                key = %self.key,
                expected = self.expected,
                found = %entry.key,
                "Blob chunk sequence has a gap, stopping read"
            );
            self.done = true;
            return None;
        }

        match entry.value {
            Value::Bytes(data) => {
                self.expected += 1;
                Some(Ok(data))
            }
            other => {
                self.done = true;
                Some(Err(Error::ShapeViolation(format!(
                    "blob chunk {} is {}, expected bytes",
                    entry.key,
                    other.type_name()
                ))))
            }
        }
    }
}

/// Reassemble the whole blob
///
/// Zero chunks with metadata present is an empty blob; zero chunks without
/// metadata is no blob.
pub(crate) fn read_all<S: Store + ?Sized>(
    store: &S,
    key: &Key,
    batch_size: Option<usize>,
) -> Result<Option<Vec<u8>>> {
    let mut stream = BlobStream::open(store, key, batch_size)?;
    let mut data = Vec::new();
    for chunk in stream.by_ref() {
        data.extend_from_slice(&chunk?);
    }
    if stream.chunks_read() == 0 && !store.get(&meta_key(key))?.is_present() {
        return Ok(None);
    }
    Ok(Some(data))
}

/// Highest chunk index stored under `key`, zero if none
pub(crate) fn existing_chunk_count<S: Store + ?Sized>(
    store: &S,
    key: &Key,
    batch_size: Option<usize>,
) -> Result<usize> {
    let prefix = chunk_prefix(key);
    let mut highest = 0u64;
    for entry in store.list(
        ListSelector::prefix(prefix.clone()),
        ListOptions::with_batch_size(batch_size),
    )? {
        let entry = entry?;
        if entry.key.len() != prefix.len() + 1 {
            continue;
        }
        if let Some(index) = entry.key.last().and_then(|part| part.as_index()) {
            highest = highest.max(index);
        }
    }
    Ok(highest as usize)
}
