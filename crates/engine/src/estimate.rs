//! Serialized size estimation
//!
//! Estimates how many bytes a value or key occupies once the store
//! serializes it, without running the serializer.
//!
//! Values follow the store's value encoding: MessagePack of the externally
//! tagged `Value` enum.
//!
//! - every variant is framed as a one-entry map keyed by the variant name
//! - integers take the smallest MessagePack width, tiered at 128 / 256 /
//!   65,536 / 4,294,967,296; floats are always 9 bytes
//! - strings and byte buffers carry a width-tiered length header
//! - arrays and maps carry a width-tiered element count header
//! - struct variants also count their field names
//!
//! Keys follow the store's ordered key encoding (see
//! [`KeyPart::encoded_len`]).
//!
//! The estimate never undercounts what the store measures. Batch ceilings
//! default below the store's true limits as further margin.
//!
//! The traversal uses an explicit work stack, so arbitrarily deep values
//! cannot overflow the call stack. Owned values cannot alias, so every node
//! is visited exactly once.

use kvtoolbox_core::{Key, KeyPart, Value};

/// Length of a string header for a payload of `len` bytes
fn str_header(len: usize) -> usize {
    if len < 32 {
        1
    } else if len <= u8::MAX as usize {
        2
    } else if len <= u16::MAX as usize {
        3
    } else {
        5
    }
}

/// Length of a binary header for a payload of `len` bytes
fn bin_header(len: usize) -> usize {
    if len <= u8::MAX as usize {
        2
    } else if len <= u16::MAX as usize {
        3
    } else {
        5
    }
}

/// Length of an array or map header holding `len` elements
fn collection_header(len: usize) -> usize {
    if len < 16 {
        1
    } else if len <= u16::MAX as usize {
        3
    } else {
        5
    }
}

fn str_cost(s: &str) -> usize {
    str_header(s.len()) + s.len()
}

/// Cost of a signed integer in its smallest MessagePack width
fn int_cost(n: i64) -> usize {
    match n {
        -32..=127 => 1,
        -128..=255 => 2,
        -32_768..=65_535 => 3,
        -2_147_483_648..=4_294_967_295 => 5,
        _ => 9,
    }
}

fn uint_cost(n: u64) -> usize {
    match n {
        0..=127 => 1,
        128..=255 => 2,
        256..=65_535 => 3,
        65_536..=4_294_967_295 => 5,
        _ => 9,
    }
}

/// Digits of `n` in decimal, including a leading minus sign
fn decimal_len(n: i128) -> usize {
    let mut magnitude = n.unsigned_abs();
    let mut len = usize::from(n < 0) + 1;
    while magnitude >= 10 {
        magnitude /= 10;
        len += 1;
    }
    len
}

/// One-entry map header plus the variant name
fn variant_cost(name: &str) -> usize {
    1 + str_cost(name)
}

/// Struct body header plus its field names
fn struct_cost(fields: &[&str]) -> usize {
    collection_header(fields.len()) + fields.iter().map(|f| str_cost(f)).sum::<usize>()
}

/// Cost of a value's own framing, excluding nested values
fn node_cost(value: &Value) -> usize {
    // variant names are exactly `type_name`
    let framing = variant_cost(value.type_name());
    framing
        + match value {
            Value::Undefined | Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Int(n) | Value::Date(n) => int_cost(*n),
            Value::Float(_) => 9,
            Value::BigInt(n) => {
                let digits = decimal_len(*n);
                str_header(digits) + digits
            }
            Value::U64(n) => uint_cost(n.0),
            Value::String(s) => str_cost(s),
            Value::Bytes(b) => bin_header(b.len()) + b.len(),
            Value::RegExp { source, flags } => {
                struct_cost(&["source", "flags"]) + str_cost(source) + str_cost(flags)
            }
            Value::Error {
                name,
                message,
                stack,
            } => {
                let stack = stack.as_deref().map_or(1, str_cost);
                struct_cost(&["name", "message", "stack"])
                    + str_cost(name)
                    + str_cost(message)
                    + stack
            }
            Value::Array(items) | Value::Set(items) => collection_header(items.len()),
            // each pair is a two-element tuple
            Value::Map(pairs) => collection_header(pairs.len()) + pairs.len(),
            Value::Object(fields) => {
                let names: usize = fields.keys().map(|k| str_cost(k)).sum();
                collection_header(fields.len()) + names
            }
        }
}

/// Estimate the serialized size of a value in bytes
///
/// Pure and infallible for every representable value.
pub fn estimate_size(value: &Value) -> usize {
    let mut total = 0;
    let mut stack: Vec<&Value> = vec![value];
    while let Some(current) = stack.pop() {
        total += node_cost(current);
        match current {
            Value::Array(items) | Value::Set(items) => stack.extend(items.iter()),
            Value::Map(pairs) => {
                for (k, v) in pairs {
                    stack.push(k);
                    stack.push(v);
                }
            }
            Value::Object(fields) => stack.extend(fields.values()),
            _ => {}
        }
    }
    total
}

/// Estimate the encoded size of one key part
///
/// Numbers are 9 bytes whatever their magnitude; strings and byte
/// sequences pay a tag, a terminator and one escape byte per NUL.
pub fn estimate_key_part_size(part: &KeyPart) -> usize {
    part.encoded_len()
}

/// Estimate the encoded size of a key: the sum of its parts
pub fn estimate_key_size(key: &Key) -> usize {
    key.parts().iter().map(estimate_key_part_size).sum()
}
