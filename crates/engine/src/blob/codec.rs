//! Blob write/delete encoding
//!
//! Translates a blob write or delete into primitive mutations. The codec
//! never talks to the store: the caller supplies the current chunk count
//! and decides how the mutations are committed.

use std::io::{ErrorKind, Read};

use kvtoolbox_core::{Key, Mutation, Result, Value};

use super::{chunk_key, meta_key, BlobKind, BlobMeta, BlobPayload, BlobSetOptions, CHUNK_SIZE};
use crate::crypto::Encryptor;

/// Fill `buf` from `reader`, stopping early only at end of stream
fn read_chunk(reader: &mut dyn Read, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(filled)
}

enum Source {
    Bytes(Vec<u8>),
    Reader(Box<dyn Read + Send>),
}

impl Source {
    fn into_bytes(self) -> Result<Vec<u8>> {
        match self {
            Source::Bytes(data) => Ok(data),
            Source::Reader(mut reader) => {
                let mut data = Vec::new();
                reader.read_to_end(&mut data)?;
                Ok(data)
            }
        }
    }
}

fn split_payload(payload: BlobPayload) -> (Source, BlobMeta) {
    match payload {
        BlobPayload::Bytes(data) => {
            let meta = BlobMeta::buffer(data.len() as u64);
            (Source::Bytes(data), meta)
        }
        BlobPayload::Reader(reader) => (Source::Reader(reader), BlobMeta::buffer(0)),
        BlobPayload::Blob { data, content_type } => {
            let meta = BlobMeta {
                kind: BlobKind::Blob,
                content_type: Some(content_type),
                ..BlobMeta::buffer(data.len() as u64)
            };
            (Source::Bytes(data), meta)
        }
        BlobPayload::File {
            data,
            content_type,
            name,
            last_modified,
        } => {
            let meta = BlobMeta {
                kind: BlobKind::File,
                content_type: Some(content_type),
                name: Some(name),
                last_modified: Some(last_modified),
                ..BlobMeta::buffer(data.len() as u64)
            };
            (Source::Bytes(data), meta)
        }
    }
}

/// Encode a blob write as primitive mutations
///
/// Emits, in order: one set per chunk (indices 1..=k), a delete for every
/// stale chunk index k+1..=`existing_count`, then the metadata set. With an
/// encryptor the whole payload is encrypted first and the chunks hold
/// ciphertext.
///
/// # Errors
///
/// Returns `Error::Io` if the payload stream fails, or the encryptor's
/// error.
pub fn encode_blob_write(
    key: &Key,
    payload: BlobPayload,
    existing_count: usize,
    options: &BlobSetOptions,
    encryptor: Option<&dyn Encryptor>,
) -> Result<Vec<Mutation>> {
    let (mut source, mut meta) = split_payload(payload);
    if let Some(encryptor) = encryptor {
        let plaintext = source.into_bytes()?;
        meta.size = plaintext.len() as u64;
        meta.encrypted = true;
        source = Source::Bytes(encryptor.encrypt(&plaintext)?);
    }

    let mut mutations = Vec::new();
    let push_chunk = |mutations: &mut Vec<Mutation>, chunk: Vec<u8>| {
        let index = mutations.len() + 1;
        mutations.push(
            Mutation::set(chunk_key(key, index), Value::Bytes(chunk))
                .with_expire_in(options.expire_in),
        );
    };

    match source {
        Source::Bytes(data) => {
            for chunk in data.chunks(CHUNK_SIZE) {
                push_chunk(&mut mutations, chunk.to_vec());
            }
        }
        Source::Reader(mut reader) => {
            let mut total = 0u64;
            let mut buf = vec![0u8; CHUNK_SIZE];
            loop {
                let n = read_chunk(reader.as_mut(), &mut buf)?;
                if n == 0 {
                    break;
                }
                total += n as u64;
                push_chunk(&mut mutations, buf[..n].to_vec());
                if n < CHUNK_SIZE {
                    break;
                }
            }
            meta.size = total;
        }
    }

    let written = mutations.len();
    for index in written + 1..=existing_count {
        mutations.push(Mutation::delete(chunk_key(key, index)));
    }
    mutations.push(Mutation::set(meta_key(key), meta.to_value()).with_expire_in(options.expire_in));
    Ok(mutations)
}

/// Encode a blob delete: every chunk index 1..=`existing_count` plus the
/// metadata
pub fn encode_blob_delete(key: &Key, existing_count: usize) -> Vec<Mutation> {
    (1..=existing_count)
        .map(|index| Mutation::delete(chunk_key(key, index)))
        .chain(std::iter::once(Mutation::delete(meta_key(key))))
        .collect()
}
