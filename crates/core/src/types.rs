//! Core types for kvtoolbox
//!
//! This module defines:
//! - KeyPart: one typed element of a key
//! - Key: ordered sequence of key parts
//! - Versionstamp: opaque per-write token for optimistic concurrency
//! - Entry / MaybeEntry: listed and point-read results
//! - CommitResult: outcome of one native atomic commit

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

use crate::value::Value;

/// One typed element of a key
///
/// Parts of different types order as
/// `Bytes < String < Float < Int < Bool`; within a type the natural order
/// applies (floats by IEEE-754 total order, so `Eq` is well defined).
///
/// `PartialEq` here is ordinary content equality. Code comparing parts that
/// may embed secret material should use the constant-time helpers in the
/// engine's key utilities.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum KeyPart {
    /// Raw byte sequence
    Bytes(#[serde(with = "serde_bytes")] Vec<u8>),
    /// UTF-8 string
    String(String),
    /// Number
    Float(f64),
    /// Large integer
    Int(i64),
    /// Boolean
    Bool(bool),
}

impl KeyPart {
    fn type_rank(&self) -> u8 {
        match self {
            KeyPart::Bytes(_) => 0,
            KeyPart::String(_) => 1,
            KeyPart::Float(_) => 2,
            KeyPart::Int(_) => 3,
            KeyPart::Bool(_) => 4,
        }
    }

    /// Get the type name as a string
    pub fn type_name(&self) -> &'static str {
        match self {
            KeyPart::Bytes(_) => "Bytes",
            KeyPart::String(_) => "String",
            KeyPart::Float(_) => "Float",
            KeyPart::Int(_) => "Int",
            KeyPart::Bool(_) => "Bool",
        }
    }

    /// Get as &str if this is a String part
    pub fn as_str(&self) -> Option<&str> {
        match self {
            KeyPart::String(s) => Some(s),
            _ => None,
        }
    }

    /// Get the chunk index if this part is a non-negative integral number
    pub fn as_index(&self) -> Option<u64> {
        match self {
            KeyPart::Float(f) if *f >= 0.0 && f.fract() == 0.0 && *f <= u64::MAX as f64 => {
                Some(*f as u64)
            }
            KeyPart::Int(i) if *i >= 0 => Some(*i as u64),
            _ => None,
        }
    }

    /// Length of this part in the store's ordered key encoding
    ///
    /// Strings and byte sequences are tagged, NUL-escaped and terminated;
    /// numbers are tagged 8-byte big-endian; booleans are a single tag.
    pub fn encoded_len(&self) -> usize {
        match self {
            KeyPart::Bytes(b) => 2 + b.len() + b.iter().filter(|&&x| x == 0).count(),
            KeyPart::String(s) => 2 + s.len() + s.bytes().filter(|&x| x == 0).count(),
            KeyPart::Float(_) | KeyPart::Int(_) => 9,
            KeyPart::Bool(_) => 1,
        }
    }
}

impl PartialEq for KeyPart {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for KeyPart {}

impl PartialOrd for KeyPart {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for KeyPart {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (KeyPart::Bytes(a), KeyPart::Bytes(b)) => a.cmp(b),
            (KeyPart::String(a), KeyPart::String(b)) => a.cmp(b),
            (KeyPart::Float(a), KeyPart::Float(b)) => a.total_cmp(b),
            (KeyPart::Int(a), KeyPart::Int(b)) => a.cmp(b),
            (KeyPart::Bool(a), KeyPart::Bool(b)) => a.cmp(b),
            _ => self.type_rank().cmp(&other.type_rank()),
        }
    }
}

impl fmt::Display for KeyPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyPart::Bytes(b) => {
                write!(f, "0x")?;
                for byte in b {
                    write!(f, "{:02x}", byte)?;
                }
                Ok(())
            }
            KeyPart::String(s) => write!(f, "{:?}", s),
            KeyPart::Float(n) => write!(f, "{}", n),
            KeyPart::Int(n) => write!(f, "{}n", n),
            KeyPart::Bool(b) => write!(f, "{}", b),
        }
    }
}

impl From<&str> for KeyPart {
    fn from(s: &str) -> Self {
        KeyPart::String(s.to_string())
    }
}

impl From<String> for KeyPart {
    fn from(s: String) -> Self {
        KeyPart::String(s)
    }
}

impl From<f64> for KeyPart {
    fn from(n: f64) -> Self {
        KeyPart::Float(n)
    }
}

impl From<i64> for KeyPart {
    fn from(n: i64) -> Self {
        KeyPart::Int(n)
    }
}

impl From<bool> for KeyPart {
    fn from(b: bool) -> Self {
        KeyPart::Bool(b)
    }
}

impl From<Vec<u8>> for KeyPart {
    fn from(b: Vec<u8>) -> Self {
        KeyPart::Bytes(b)
    }
}

impl From<&[u8]> for KeyPart {
    fn from(b: &[u8]) -> Self {
        KeyPart::Bytes(b.to_vec())
    }
}

impl<const N: usize> From<&[u8; N]> for KeyPart {
    fn from(b: &[u8; N]) -> Self {
        KeyPart::Bytes(b.to_vec())
    }
}

/// Ordered sequence of typed key parts
///
/// Keys compare lexicographically part by part; a key sorts before every
/// key it is a strict prefix of.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Key(Vec<KeyPart>);

impl std::hash::Hash for KeyPart {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.type_rank().hash(state);
        match self {
            KeyPart::Bytes(b) => b.hash(state),
            KeyPart::String(s) => s.hash(state),
            KeyPart::Float(n) => n.to_bits().hash(state),
            KeyPart::Int(n) => n.hash(state),
            KeyPart::Bool(b) => b.hash(state),
        }
    }
}

impl Key {
    /// Create a key from parts
    pub fn new(parts: Vec<KeyPart>) -> Self {
        Key(parts)
    }

    /// The empty key (selects everything as a prefix)
    pub fn empty() -> Self {
        Key(Vec::new())
    }

    /// Borrow the parts
    pub fn parts(&self) -> &[KeyPart] {
        &self.0
    }

    /// Consume into parts
    pub fn into_parts(self) -> Vec<KeyPart> {
        self.0
    }

    /// Number of parts
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the key has no parts
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Last part, if any
    pub fn last(&self) -> Option<&KeyPart> {
        self.0.last()
    }

    /// Part at `index`
    pub fn get(&self, index: usize) -> Option<&KeyPart> {
        self.0.get(index)
    }

    /// Return a new key with `part` appended
    pub fn with(&self, part: impl Into<KeyPart>) -> Key {
        let mut parts = Vec::with_capacity(self.0.len() + 1);
        parts.extend_from_slice(&self.0);
        parts.push(part.into());
        Key(parts)
    }

    /// Append a part in place
    pub fn push(&mut self, part: impl Into<KeyPart>) {
        self.0.push(part.into());
    }

    /// Ordinary (non constant-time) prefix test
    pub fn starts_with(&self, prefix: &Key) -> bool {
        self.0.starts_with(&prefix.0)
    }

    /// Length in the store's ordered key encoding
    pub fn encoded_len(&self) -> usize {
        self.0.iter().map(KeyPart::encoded_len).sum()
    }
}

impl From<Vec<KeyPart>> for Key {
    fn from(parts: Vec<KeyPart>) -> Self {
        Key(parts)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, part) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", part)?;
        }
        write!(f, "]")
    }
}

/// Build a [`Key`] from heterogeneous parts
///
/// ```
/// use kvtoolbox_core::{key, KeyPart};
///
/// let k = key!["users", 42i64, true];
/// assert_eq!(k.len(), 3);
/// assert_eq!(k.get(0), Some(&KeyPart::from("users")));
/// ```
#[macro_export]
macro_rules! key {
    () => { $crate::types::Key::empty() };
    ($($part:expr),+ $(,)?) => {
        $crate::types::Key::new(vec![$($crate::types::KeyPart::from($part)),+])
    };
}

/// Opaque token assigned by the store on every successful write
///
/// Versionstamps increase monotonically across commits. They render as 20
/// lowercase hex characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Versionstamp([u8; 10]);

impl Versionstamp {
    /// Build a versionstamp from a commit sequence number
    pub fn from_sequence(seq: u64) -> Self {
        let mut bytes = [0u8; 10];
        bytes[..8].copy_from_slice(&seq.to_be_bytes());
        Versionstamp(bytes)
    }

    /// Raw bytes
    pub fn as_bytes(&self) -> &[u8; 10] {
        &self.0
    }
}

impl fmt::Display for Versionstamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in &self.0 {
            write!(f, "{:02x}", b)?;
        }
        Ok(())
    }
}

/// A stored entry returned by `list`
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    /// Entry key
    pub key: Key,
    /// Stored value
    pub value: Value,
    /// Versionstamp of the last write to this key
    pub versionstamp: Versionstamp,
}

/// Result of a point read; value and versionstamp are absent for a missing key
#[derive(Debug, Clone, PartialEq)]
pub struct MaybeEntry {
    /// Requested key
    pub key: Key,
    /// Stored value, if present
    pub value: Option<Value>,
    /// Versionstamp, if present
    pub versionstamp: Option<Versionstamp>,
}

impl MaybeEntry {
    /// Entry for a missing key
    pub fn missing(key: Key) -> Self {
        MaybeEntry {
            key,
            value: None,
            versionstamp: None,
        }
    }

    /// Whether the key exists
    pub fn is_present(&self) -> bool {
        self.versionstamp.is_some()
    }
}

impl From<Entry> for MaybeEntry {
    fn from(entry: Entry) -> Self {
        MaybeEntry {
            key: entry.key,
            value: Some(entry.value),
            versionstamp: Some(entry.versionstamp),
        }
    }
}

/// Outcome of one native atomic commit
///
/// `ok == false` means a check failed; nothing in that commit was applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommitResult {
    /// Whether the commit was applied
    pub ok: bool,
    /// Versionstamp assigned to every write of the commit
    pub versionstamp: Option<Versionstamp>,
}

impl CommitResult {
    /// Successful commit
    pub fn committed(versionstamp: Versionstamp) -> Self {
        CommitResult {
            ok: true,
            versionstamp: Some(versionstamp),
        }
    }

    /// Commit rejected by a failed check
    pub fn check_failed() -> Self {
        CommitResult {
            ok: false,
            versionstamp: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cross_type_ordering() {
        let mut parts = vec![
            KeyPart::Bool(false),
            KeyPart::Int(1),
            KeyPart::Float(1.0),
            KeyPart::String("a".into()),
            KeyPart::Bytes(vec![1]),
        ];
        parts.sort();
        assert_eq!(
            parts.iter().map(KeyPart::type_name).collect::<Vec<_>>(),
            vec!["Bytes", "String", "Float", "Int", "Bool"]
        );
    }

    #[test]
    fn test_no_cross_type_equality() {
        assert_ne!(KeyPart::Float(1.0), KeyPart::Int(1));
        assert_ne!(KeyPart::String("1".into()), KeyPart::Float(1.0));
        assert_ne!(KeyPart::Bytes(b"a".to_vec()), KeyPart::String("a".into()));
    }

    #[test]
    fn test_prefix_sorts_first() {
        let a = key!["a"];
        let ab = key!["a", "b"];
        let b = key!["b"];
        assert!(a < ab);
        assert!(ab < b);
        assert!(ab.starts_with(&a));
        assert!(!a.starts_with(&ab));
    }

    #[test]
    fn test_key_with_does_not_mutate() {
        let base = key!["blob"];
        let chunk = base.with(1.0);
        assert_eq!(base.len(), 1);
        assert_eq!(chunk.len(), 2);
        assert_eq!(chunk.last(), Some(&KeyPart::Float(1.0)));
    }

    #[test]
    fn test_as_index() {
        assert_eq!(KeyPart::Float(3.0).as_index(), Some(3));
        assert_eq!(KeyPart::Int(4).as_index(), Some(4));
        assert_eq!(KeyPart::Float(1.5).as_index(), None);
        assert_eq!(KeyPart::Int(-1).as_index(), None);
        assert_eq!(KeyPart::String("1".into()).as_index(), None);
    }

    #[test]
    fn test_encoded_len_escapes_nul() {
        assert_eq!(KeyPart::String("ab".into()).encoded_len(), 4);
        assert_eq!(KeyPart::Bytes(vec![0, 1, 0]).encoded_len(), 7);
        assert_eq!(KeyPart::Bool(true).encoded_len(), 1);
        assert_eq!(key!["ab", 1.0].encoded_len(), 13);
    }

    #[test]
    fn test_versionstamp_ordering_and_hex() {
        let a = Versionstamp::from_sequence(1);
        let b = Versionstamp::from_sequence(2);
        assert!(a < b);
        assert_eq!(a.to_string(), "00000000000000010000");
        assert_eq!(a.to_string().len(), 20);
    }

    #[test]
    fn test_key_display() {
        let k = key!["a", 1.5, 2i64, vec![0xabu8], true];
        assert_eq!(k.to_string(), "[\"a\", 1.5, 2n, 0xab, true]");
    }

    #[test]
    fn test_maybe_entry_from_entry() {
        let entry = Entry {
            key: key!["k"],
            value: Value::from("v"),
            versionstamp: Versionstamp::from_sequence(9),
        };
        let maybe = MaybeEntry::from(entry);
        assert!(maybe.is_present());
        assert!(!MaybeEntry::missing(key!["k"]).is_present());
    }

    fn key_part() -> impl proptest::strategy::Strategy<Value = KeyPart> {
        use proptest::prelude::*;
        prop_oneof![
            proptest::collection::vec(any::<u8>(), 0..4).prop_map(KeyPart::Bytes),
            "[a-c]{0,3}".prop_map(KeyPart::String),
            (-4i32..4).prop_map(|n| KeyPart::Float(f64::from(n) / 2.0)),
            (-4i64..4).prop_map(KeyPart::Int),
            any::<bool>().prop_map(KeyPart::Bool),
        ]
    }

    proptest::proptest! {
        #[test]
        fn prop_key_order_is_antisymmetric(
            a in proptest::collection::vec(key_part(), 0..4),
            b in proptest::collection::vec(key_part(), 0..4),
        ) {
            let (a, b) = (Key::new(a), Key::new(b));
            proptest::prop_assert_eq!(a.cmp(&b), b.cmp(&a).reverse());
            proptest::prop_assert_eq!(a == b, a.cmp(&b) == Ordering::Equal);
        }
    }
}
