//! Core types and traits for kvtoolbox
//!
//! This crate defines the foundational types used throughout the workspace:
//! - Key / KeyPart: typed, ordered composite keys
//! - Value / KvU64: the store's structured value model
//! - Versionstamp, Entry, MaybeEntry, CommitResult
//! - AtomicOperation / AtomicBuilder: one native commit
//! - Store: the contract required from the underlying ordered KV store
//! - Error: error type hierarchy
//! - Limits: batch ceilings and native store limits

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod atomic;
pub mod error;
pub mod limits;
pub mod traits;
pub mod types;
pub mod value;

pub use atomic::{
    AtomicBuilder, AtomicCheck, AtomicOperation, Enqueue, EnqueueOptions, Mutation, MutationKind,
};
pub use error::{Error, Result};
pub use limits::{BatchLimits, StoreLimits};
pub use traits::{ListIterator, ListOptions, ListSelector, SetOptions, Store};
pub use types::{CommitResult, Entry, Key, KeyPart, MaybeEntry, Versionstamp};
pub use value::{KvU64, Value};
