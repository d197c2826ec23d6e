//! Value types for kvtoolbox
//!
//! This module defines:
//! - Value: the structured value model the store can persist
//! - KvU64: the 64-bit unsigned wrapper used by sum/min/max mutations
//!
//! ## Type Rules
//!
//! - No implicit type coercions: `Int(1) != Float(1.0)`, `Bytes(b"a") != String("a")`
//! - Float uses IEEE-754 equality: `NaN != NaN`, `-0.0 == 0.0`
//! - `Undefined` and `Null` are distinct

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// 64-bit unsigned integer wrapper for atomic sum/min/max
///
/// Sum wraps on overflow; min and max compare as unsigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct KvU64(pub u64);

impl KvU64 {
    /// Create a new wrapper
    pub fn new(value: u64) -> Self {
        KvU64(value)
    }

    /// Get the wrapped value
    pub fn value(self) -> u64 {
        self.0
    }
}

impl From<u64> for KvU64 {
    fn from(v: u64) -> Self {
        KvU64(v)
    }
}

impl fmt::Display for KvU64 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}n", self.0)
    }
}

/// Structured value persisted by the store
///
/// Mirrors the structured-clone value space of the store: scalars, byte
/// arrays, dates, regular expressions, errors and nested collections.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Value {
    /// Explicitly undefined
    Undefined,
    /// Null value
    Null,
    /// Boolean value
    Bool(bool),
    /// 64-bit signed integer
    Int(i64),
    /// 64-bit floating point (IEEE-754)
    Float(f64),
    /// Arbitrary precision integer (bounded to 128 bits)
    BigInt(#[serde(with = "bigint_repr")] i128),
    /// Unsigned 64-bit counter
    U64(KvU64),
    /// UTF-8 string
    String(String),
    /// Raw bytes
    Bytes(#[serde(with = "serde_bytes")] Vec<u8>),
    /// Milliseconds since the Unix epoch
    Date(i64),
    /// Regular expression source and flags
    RegExp {
        /// Pattern source
        source: String,
        /// Flags such as `gi`
        flags: String,
    },
    /// Error object
    Error {
        /// Error class name
        name: String,
        /// Error message
        message: String,
        /// Optional stack trace
        stack: Option<String>,
    },
    /// Ordered list
    Array(Vec<Value>),
    /// Set of values in insertion order
    Set(Vec<Value>),
    /// Map with arbitrary keys in insertion order
    Map(Vec<(Value, Value)>),
    /// Object with string keys
    Object(BTreeMap<String, Value>),
}

mod bigint_repr {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(v: &i128, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&v.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i128, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) => true,
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            // IEEE-754: NaN != NaN, -0.0 == 0.0
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::BigInt(a), Value::BigInt(b)) => a == b,
            (Value::U64(a), Value::U64(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Bytes(a), Value::Bytes(b)) => a == b,
            (Value::Date(a), Value::Date(b)) => a == b,
            (
                Value::RegExp {
                    source: sa,
                    flags: fa,
                },
                Value::RegExp {
                    source: sb,
                    flags: fb,
                },
            ) => sa == sb && fa == fb,
            (
                Value::Error {
                    name: na,
                    message: ma,
                    stack: sa,
                },
                Value::Error {
                    name: nb,
                    message: mb,
                    stack: sb,
                },
            ) => na == nb && ma == mb && sa == sb,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Set(a), Value::Set(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a == b,
            // Different types are never equal
            _ => false,
        }
    }
}

impl Value {
    /// Get the type name as a string
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Undefined => "Undefined",
            Value::Null => "Null",
            Value::Bool(_) => "Bool",
            Value::Int(_) => "Int",
            Value::Float(_) => "Float",
            Value::BigInt(_) => "BigInt",
            Value::U64(_) => "U64",
            Value::String(_) => "String",
            Value::Bytes(_) => "Bytes",
            Value::Date(_) => "Date",
            Value::RegExp { .. } => "RegExp",
            Value::Error { .. } => "Error",
            Value::Array(_) => "Array",
            Value::Set(_) => "Set",
            Value::Map(_) => "Map",
            Value::Object(_) => "Object",
        }
    }

    /// Check if this is a null value
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Check if this is a bytes value
    pub fn is_bytes(&self) -> bool {
        matches!(self, Value::Bytes(_))
    }

    /// Get as bool if this is a Bool value
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Get as i64 if this is an Int value
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Get as f64 if this is a Float value
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Get as KvU64 if this is a U64 value
    pub fn as_u64(&self) -> Option<KvU64> {
        match self {
            Value::U64(v) => Some(*v),
            _ => None,
        }
    }

    /// Get as &str if this is a String value
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Get as &[u8] if this is a Bytes value
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// Consume and return the byte buffer if this is a Bytes value
    pub fn into_bytes(self) -> Option<Vec<u8>> {
        match self {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// Get as &BTreeMap if this is an Object value
    pub fn as_object(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    /// Encode with MessagePack, the store's reference wire encoding
    pub fn to_msgpack(&self) -> crate::Result<Vec<u8>> {
        Ok(rmp_serde::to_vec(self)?)
    }
}

// ============================================================================
// From implementations for ergonomic API usage
// ============================================================================

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i as i64)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<KvU64> for Value {
    fn from(v: KvU64) -> Self {
        Value::U64(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Value::Bytes(b)
    }
}

impl From<&[u8]> for Value {
    fn from(b: &[u8]) -> Self {
        Value::Bytes(b.to_vec())
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::Array(v)
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(o: BTreeMap<String, Value>) -> Self {
        Value::Object(o)
    }
}
