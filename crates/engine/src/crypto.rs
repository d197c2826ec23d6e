//! Blob encryption
//!
//! - `Encryptor`: pluggable symmetric cipher over whole payloads
//! - `AesGcmEncryptor`: AES-GCM with a 128- or 256-bit key. Each call draws
//!   a fresh random 96-bit nonce, stored in front of the ciphertext.
//! - `CryptoStore`: blob operations on a store that encrypt on write and
//!   decrypt on read
//!
//! A blob is encrypted as one message, then chunked. Reading therefore
//! reassembles the full ciphertext before any plaintext is produced.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes128Gcm, Aes256Gcm, Nonce};
use kvtoolbox_core::{CommitResult, Error, Key, Result, Store};
use rand::RngCore;
use tracing::debug;

use crate::batched_atomic::{BatchedAtomicOperation, BatchedAtomicOptions};
use crate::blob::{
    self, BlobMeta, BlobPayload, BlobReadOptions, BlobSetOptions, BlobValue, CHUNK_SIZE,
};

/// Nonce length for AES-GCM
pub const NONCE_LEN: usize = 12;

/// Authentication tag length for AES-GCM
pub const TAG_LEN: usize = 16;

/// Symmetric cipher applied to whole blob payloads
pub trait Encryptor: Send + Sync {
    /// Encrypt `plaintext`
    fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>>;

    /// Decrypt what `encrypt` produced
    ///
    /// # Errors
    ///
    /// Returns `Error::Decryption` if the input is truncated, was produced
    /// under another key, or was tampered with.
    fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>>;
}

/// Generate a random AES key of `bit_length` bits
///
/// # Errors
///
/// Returns `Error::Configuration` unless `bit_length` is 128 or 256.
pub fn generate_key(bit_length: usize) -> Result<Vec<u8>> {
    match bit_length {
        128 | 256 => {
            let mut key = vec![0u8; bit_length / 8];
            rand::thread_rng().fill_bytes(&mut key);
            Ok(key)
        }
        other => Err(Error::Configuration(format!(
            "unsupported key length {} bits, expected 128 or 256",
            other
        ))),
    }
}

enum Cipher {
    Aes128(Box<Aes128Gcm>),
    Aes256(Box<Aes256Gcm>),
}

/// AES-GCM encryptor
pub struct AesGcmEncryptor {
    cipher: Cipher,
}

impl AesGcmEncryptor {
    /// Create an encryptor from a 16- or 32-byte key
    ///
    /// # Errors
    ///
    /// Returns `Error::Configuration` for any other key length.
    pub fn new(key: &[u8]) -> Result<Self> {
        let invalid = |e| Error::Configuration(format!("invalid encryption key: {e}"));
        let cipher = match key.len() {
            16 => Cipher::Aes128(Box::new(Aes128Gcm::new_from_slice(key).map_err(invalid)?)),
            32 => Cipher::Aes256(Box::new(Aes256Gcm::new_from_slice(key).map_err(invalid)?)),
            other => {
                return Err(Error::Configuration(format!(
                    "invalid encryption key length {} bytes, expected 16 or 32",
                    other
                )))
            }
        };
        Ok(AesGcmEncryptor { cipher })
    }

    /// Key size in bits
    pub fn key_bits(&self) -> usize {
        match self.cipher {
            Cipher::Aes128(_) => 128,
            Cipher::Aes256(_) => 256,
        }
    }
}

impl std::fmt::Debug for AesGcmEncryptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AesGcmEncryptor")
            .field("key_bits", &self.key_bits())
            .finish_non_exhaustive()
    }
}

impl Encryptor for AesGcmEncryptor {
    fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = match &self.cipher {
            Cipher::Aes128(c) => c.encrypt(nonce, plaintext),
            Cipher::Aes256(c) => c.encrypt(nonce, plaintext),
        }
        .map_err(|e| Error::Configuration(format!("blob encryption failed: {e}")))?;

        let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        out.extend_from_slice(&nonce_bytes);
        out.extend_from_slice(&ciphertext);
        Ok(out)
    }

    fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>> {
        if ciphertext.len() < NONCE_LEN + TAG_LEN {
            return Err(Error::Decryption(format!(
                "ciphertext too short: {} bytes",
                ciphertext.len()
            )));
        }
        let (nonce_bytes, body) = ciphertext.split_at(NONCE_LEN);
        let nonce = Nonce::from_slice(nonce_bytes);
        match &self.cipher {
            Cipher::Aes128(c) => c.decrypt(nonce, body),
            Cipher::Aes256(c) => c.decrypt(nonce, body),
        }
        .map_err(|e| Error::Decryption(format!("blob decryption failed: {e}")))
    }
}

// ============================================================================
// CryptoStore
// ============================================================================

/// Blob operations that encrypt on write and decrypt on read
///
/// Metadata of encrypted blobs records `encrypted: true`. Blobs written
/// without encryption are returned as stored.
pub struct CryptoStore<'s, S: Store, E: Encryptor> {
    store: &'s S,
    encryptor: E,
    options: BatchedAtomicOptions,
}

impl<'s, S: Store> CryptoStore<'s, S, AesGcmEncryptor> {
    /// Wrap `store` with AES-GCM under `key`
    pub fn with_key(store: &'s S, key: &[u8]) -> Result<Self> {
        Ok(CryptoStore::new(store, AesGcmEncryptor::new(key)?))
    }
}

impl<'s, S: Store, E: Encryptor> CryptoStore<'s, S, E> {
    /// Wrap `store` with a custom encryptor
    pub fn new(store: &'s S, encryptor: E) -> Self {
        CryptoStore {
            store,
            encryptor,
            options: BatchedAtomicOptions::default(),
        }
    }

    /// Use custom batch options for writes
    pub fn with_options(mut self, options: BatchedAtomicOptions) -> Self {
        self.options = options;
        self
    }

    /// The wrapped store
    pub fn store(&self) -> &'s S {
        self.store
    }

    /// Start a batched operation whose blob writes are encrypted
    pub fn batched_atomic(&self) -> BatchedAtomicOperation<'_, S> {
        BatchedAtomicOperation::new(self.store, self.options).with_encryptor(&self.encryptor)
    }

    /// Encrypt and store `payload` as a blob at `key`
    pub fn set_blob(
        &self,
        key: &Key,
        payload: impl Into<BlobPayload>,
        options: BlobSetOptions,
    ) -> Result<CommitResult> {
        let mut operation = self.batched_atomic();
        operation.set_blob(key.clone(), payload, options);
        let result = blob::last_result(operation.commit()?)?;
        debug!(target: "kvtoolbox::crypto", key = %key, "Encrypted blob written");
        Ok(result)
    }

    /// Read and decrypt the blob at `key`
    ///
    /// # Errors
    ///
    /// Returns `Error::Decryption` if the stored ciphertext does not
    /// authenticate under this encryptor.
    pub fn get_blob(&self, key: &Key, options: BlobReadOptions) -> Result<Option<Vec<u8>>> {
        let Some(stored) = blob::get(self.store, key, options)? else {
            return Ok(None);
        };
        match blob::get_meta(self.store, key)? {
            Some(meta) if meta.encrypted => self.encryptor.decrypt(&stored).map(Some),
            _ => Ok(Some(stored)),
        }
    }

    /// Read and decrypt the blob at `key` as chunk-sized pieces
    ///
    /// Decryption needs the whole ciphertext, so the blob is read in full
    /// before the first piece is yielded.
    pub fn get_blob_as_stream(
        &self,
        key: &Key,
        options: BlobReadOptions,
    ) -> Result<impl Iterator<Item = Result<Vec<u8>>>> {
        let plaintext = self.get_blob(key, options)?.unwrap_or_default();
        let pieces: Vec<Vec<u8>> = plaintext.chunks(CHUNK_SIZE).map(<[u8]>::to_vec).collect();
        Ok(pieces.into_iter().map(Ok))
    }

    /// Read, decrypt and re-wrap the blob at `key` with its metadata
    pub fn get_blob_as_blob(
        &self,
        key: &Key,
        options: BlobReadOptions,
    ) -> Result<Option<BlobValue>> {
        let Some(data) = self.get_blob(key, options)? else {
            return Ok(None);
        };
        let meta = blob::get_meta(self.store, key)?;
        Ok(Some(BlobValue::from_parts(data, meta.as_ref())))
    }

    /// Read the metadata of the blob at `key`
    pub fn get_blob_meta(&self, key: &Key) -> Result<Option<BlobMeta>> {
        blob::get_meta(self.store, key)
    }

    /// Delete the blob at `key`
    pub fn delete_blob(&self, key: &Key, options: BlobReadOptions) -> Result<()> {
        let mut operation = BatchedAtomicOperation::new(
            self.store,
            BatchedAtomicOptions {
                batch_size: options.batch_size.or(self.options.batch_size),
                ..self.options
            },
        );
        operation.delete_blob(key.clone());
        operation.commit().map(|_| ())
    }
}
