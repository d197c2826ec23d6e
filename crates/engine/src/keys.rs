//! Key comparison and hierarchy utilities
//!
//! - `part_equals` / `equals` / `starts_with`: structural key comparison.
//!   Byte-buffer parts compare in constant time for equal lengths.
//! - `unique_children` / `unique_children_with_counts`: the distinct
//!   immediate children under a prefix, with blob detection
//! - `tree`: the full hierarchy under a prefix
//! - store-backed variants that list keys first: `list_keys`, `unique`,
//!   `unique_count`, `tree_of`
//!
//! Internal blob sub-keys never surface as children. A child whose next
//! part is a blob marker is reported with `is_blob = true` instead.
//! The pure functions expect keys in store order; they never re-sort.

use kvtoolbox_core::{Key, KeyPart, ListOptions, ListSelector, Result, Store};

use crate::blob::{BLOB_KEY, BLOB_META_KEY};

// ============================================================================
// Comparison
// ============================================================================

/// Compare two byte slices without short-circuiting on the first mismatch
///
/// Lengths are public; only contents are compared in constant time.
pub(crate) fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Structural equality of two key parts
///
/// Parts of different types are never equal. Floats compare numerically,
/// so `NaN` is unequal to itself.
pub fn part_equals(a: &KeyPart, b: &KeyPart) -> bool {
    match (a, b) {
        (KeyPart::Bytes(x), KeyPart::Bytes(y)) => constant_time_eq(x, y),
        (KeyPart::String(x), KeyPart::String(y)) => x == y,
        (KeyPart::Float(x), KeyPart::Float(y)) => x == y,
        (KeyPart::Int(x), KeyPart::Int(y)) => x == y,
        (KeyPart::Bool(x), KeyPart::Bool(y)) => x == y,
        _ => false,
    }
}

/// Whether two keys have the same length and pairwise-equal parts
pub fn equals(a: &Key, b: &Key) -> bool {
    a.len() == b.len()
        && a
            .parts()
            .iter()
            .zip(b.parts())
            .all(|(x, y)| part_equals(x, y))
}

/// Whether `key` begins with every part of `prefix`
///
/// The empty prefix matches every key; a key matches itself.
pub fn starts_with(key: &Key, prefix: &Key) -> bool {
    prefix.len() <= key.len()
        && prefix
            .parts()
            .iter()
            .zip(key.parts())
            .all(|(x, y)| part_equals(x, y))
}

/// Whether a key part is one of the internal blob markers
pub fn is_blob_marker(part: &KeyPart) -> bool {
    matches!(part.as_str(), Some(BLOB_KEY) | Some(BLOB_META_KEY))
}

// ============================================================================
// Unique children
// ============================================================================

/// A distinct child under a prefix
#[derive(Debug, Clone, PartialEq)]
pub struct UniqueChild {
    /// Full key of the child: prefix plus `part`
    pub key: Key,
    /// The child's own part
    pub part: KeyPart,
    /// Number of distinct children of this child
    pub count: usize,
    /// Whether a blob is stored at this child
    pub is_blob: bool,
}

/// The distinct immediate children of `prefix`, in first-seen order
///
/// Keys not under `prefix`, and the prefix key itself, are ignored.
pub fn unique_children(prefix: &Key, keys: &[Key]) -> Vec<Key> {
    unique_children_with_counts(prefix, keys)
        .into_iter()
        .map(|child| child.key)
        .collect()
}

/// The distinct immediate children of `prefix` with their own child counts
pub fn unique_children_with_counts(prefix: &Key, keys: &[Key]) -> Vec<UniqueChild> {
    let depth = prefix.len();
    let mut children: Vec<UniqueChild> = Vec::new();
    let mut grandchildren: Vec<Vec<KeyPart>> = Vec::new();

    for key in keys {
        if key.len() <= depth || !starts_with(key, prefix) {
            continue;
        }
        let part = &key.parts()[depth];
        let index = match children.iter().position(|c| part_equals(&c.part, part)) {
            Some(index) => index,
            None => {
                children.push(UniqueChild {
                    key: prefix.with(part.clone()),
                    part: part.clone(),
                    count: 0,
                    is_blob: false,
                });
                grandchildren.push(Vec::new());
                children.len() - 1
            }
        };

        if let Some(next) = key.get(depth + 1) {
            if is_blob_marker(next) {
                children[index].is_blob = true;
            } else if !grandchildren[index].iter().any(|g| part_equals(g, next)) {
                grandchildren[index].push(next.clone());
                children[index].count += 1;
            }
        }
    }
    children
}

// ============================================================================
// Tree
// ============================================================================

/// A node in a key hierarchy
#[derive(Debug, Clone, PartialEq)]
pub struct KeyTreeNode {
    /// The node's own key part
    pub part: KeyPart,
    /// Whether a key ends exactly at this node
    pub has_value: bool,
    /// Whether a blob is stored at this node
    pub is_blob: bool,
    /// Child nodes in first-seen order
    pub children: Vec<KeyTreeNode>,
}

impl KeyTreeNode {
    fn new(part: KeyPart) -> Self {
        KeyTreeNode {
            part,
            has_value: false,
            is_blob: false,
            children: Vec::new(),
        }
    }

    /// Find a direct child by part
    pub fn child(&self, part: &KeyPart) -> Option<&KeyTreeNode> {
        self.children.iter().find(|c| part_equals(&c.part, part))
    }
}

/// The hierarchy of keys under a prefix
#[derive(Debug, Clone, PartialEq)]
pub struct KeyTree {
    /// Root prefix
    pub prefix: Key,
    /// Top-level nodes directly under the prefix
    pub children: Vec<KeyTreeNode>,
}

impl KeyTree {
    /// Find a node by its path relative to the prefix
    pub fn find(&self, path: &[KeyPart]) -> Option<&KeyTreeNode> {
        let (first, rest) = path.split_first()?;
        let mut node = self.children.iter().find(|c| part_equals(&c.part, first))?;
        for part in rest {
            node = node.child(part)?;
        }
        Some(node)
    }
}

fn child_index(nodes: &mut Vec<KeyTreeNode>, part: &KeyPart) -> usize {
    match nodes.iter().position(|n| part_equals(&n.part, part)) {
        Some(index) => index,
        None => {
            nodes.push(KeyTreeNode::new(part.clone()));
            nodes.len() - 1
        }
    }
}

/// Build the hierarchy of `keys` under `prefix`
pub fn tree(prefix: &Key, keys: &[Key]) -> KeyTree {
    let depth = prefix.len();
    let mut roots: Vec<KeyTreeNode> = Vec::new();

    for key in keys {
        if key.len() <= depth || !starts_with(key, prefix) {
            continue;
        }
        let path = &key.parts()[depth..];
        if is_blob_marker(&path[0]) {
            continue;
        }
        let mut level = &mut roots;
        for (i, part) in path.iter().enumerate() {
            let index = child_index(level, part);
            let node = &mut level[index];
            match path.get(i + 1) {
                Some(next) if is_blob_marker(next) => {
                    node.is_blob = true;
                    break;
                }
                Some(_) => level = &mut node.children,
                None => {
                    node.has_value = true;
                    break;
                }
            }
        }
    }

    KeyTree {
        prefix: prefix.clone(),
        children: roots,
    }
}

// ============================================================================
// Store-backed queries
// ============================================================================

/// List the keys of every entry matching `selector`
///
/// # Errors
///
/// Returns the store's error if listing fails.
pub fn list_keys<S: Store + ?Sized>(
    store: &S,
    selector: ListSelector,
    options: ListOptions,
) -> Result<Vec<Key>> {
    store
        .list(selector, options)?
        .map(|entry| entry.map(|e| e.key))
        .collect()
}

/// The distinct immediate children of `prefix` in the store
pub fn unique<S: Store + ?Sized>(
    store: &S,
    prefix: &Key,
    options: ListOptions,
) -> Result<Vec<Key>> {
    let keys = list_keys(store, ListSelector::prefix(prefix.clone()), options)?;
    Ok(unique_children(prefix, &keys))
}

/// The distinct immediate children of `prefix` with counts and blob flags
pub fn unique_count<S: Store + ?Sized>(
    store: &S,
    prefix: &Key,
    options: ListOptions,
) -> Result<Vec<UniqueChild>> {
    let keys = list_keys(store, ListSelector::prefix(prefix.clone()), options)?;
    Ok(unique_children_with_counts(prefix, &keys))
}

/// The hierarchy under `prefix` in the store
pub fn tree_of<S: Store + ?Sized>(
    store: &S,
    prefix: &Key,
    options: ListOptions,
) -> Result<KeyTree> {
    let keys = list_keys(store, ListSelector::prefix(prefix.clone()), options)?;
    Ok(tree(prefix, &keys))
}
