//! Error types for kvtoolbox
//!
//! This module defines all error types used throughout the workspace.
//! We use `thiserror` for automatic `Display` and `Error` trait implementations.
//!
//! A failed optimistic-concurrency check is NOT an error: it is reported as a
//! `CommitResult` with `ok == false`. Everything here aborts the call that
//! produced it.

use std::io;
use thiserror::Error;

/// Result type alias for kvtoolbox operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for kvtoolbox
#[derive(Debug, Error)]
pub enum Error {
    /// A stored chunk or metadata value does not have the expected shape
    ///
    /// Indicates corruption or a schema mismatch. Never retried, never coerced.
    #[error("Shape violation: {0}")]
    ShapeViolation(String),

    /// Decrypting stored blob content failed (wrong key or tampered data)
    #[error("Decryption failed: {0}")]
    Decryption(String),

    /// The underlying store rejected an operation
    ///
    /// Covers oversized values, malformed keys and transport failures.
    #[error("Store error: {0}")]
    Store(String),

    /// A native per-commit or per-value limit was exceeded
    #[error("{what} limit exceeded: {actual} exceeds maximum {max}")]
    LimitExceeded {
        /// Which limit was hit
        what: &'static str,
        /// Observed amount
        actual: usize,
        /// Configured maximum
        max: usize,
    },

    /// Invalid configuration, raised before any store access
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Invalid operation or state
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// I/O error (streaming blob sources, config files)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl Error {
    /// Whether this error means stored data could not be interpreted
    ///
    /// Decryption failures are grouped with shape violations: both mean the
    /// bytes in the store are not what the reader expects.
    pub fn is_shape_violation(&self) -> bool {
        matches!(self, Error::ShapeViolation(_) | Error::Decryption(_))
    }

    /// Whether this error originated in the underlying store
    pub fn is_store_error(&self) -> bool {
        matches!(self, Error::Store(_) | Error::LimitExceeded { .. })
    }
}

impl From<rmp_serde::encode::Error> for Error {
    fn from(e: rmp_serde::encode::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<rmp_serde::decode::Error> for Error {
    fn from(e: rmp_serde::decode::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}
