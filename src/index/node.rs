//! B+Tree node
//!
//! Fixed-capacity arrays sized to the tree order. Every bulk update goes
//! through `set_entries`/`set_separators`, which refuse to write past the
//! arrays.

use bytes::{Buf, BufMut, BytesMut};

use crate::disk::{decode_offset, encode_offset};
use crate::error::{Result, SlotError};

use super::NODE_SIZE;

/// Maximum number of children of an internal node
pub const ORDER: usize = 4;

/// Maximum number of keys in any node
pub const MAX_KEYS: usize = ORDER - 1;

/// Minimum number of keys in a non-root node
pub const MIN_KEYS: usize = 2;

/// A decoded index node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub is_leaf: bool,
    num_keys: usize,
    keys: [i32; MAX_KEYS],
    /// Data offsets (leaf) or child node offsets (internal)
    children: [u64; ORDER],
    /// Right neighbour in the leaf chain (leaves only)
    pub next_leaf: Option<u64>,
}

impl Node {
    /// An empty leaf
    pub fn new_leaf() -> Self {
        Self {
            is_leaf: true,
            num_keys: 0,
            keys: [0; MAX_KEYS],
            children: [0; ORDER],
            next_leaf: None,
        }
    }

    /// An empty internal node
    pub fn new_internal() -> Self {
        Self {
            is_leaf: false,
            ..Self::new_leaf()
        }
    }

    /// A leaf holding `entries` (sorted by key)
    pub fn leaf_with(entries: &[(i32, u64)], next_leaf: Option<u64>) -> Result<Self> {
        let mut node = Self::new_leaf();
        node.set_entries(entries)?;
        node.next_leaf = next_leaf;
        Ok(node)
    }

    /// An internal node with `keys` separating `children`
    pub fn internal_with(keys: &[i32], children: &[u64]) -> Result<Self> {
        let mut node = Self::new_internal();
        node.set_separators(keys, children)?;
        Ok(node)
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn num_keys(&self) -> usize {
        self.num_keys
    }

    /// The live keys
    pub fn keys(&self) -> &[i32] {
        &self.keys[..self.num_keys]
    }

    /// The live child pointers (`num_keys` in a leaf, `num_keys + 1` otherwise)
    pub fn children(&self) -> &[u64] {
        let count = if self.is_leaf {
            self.num_keys
        } else {
            self.num_keys + 1
        };
        &self.children[..count]
    }

    /// `(key, data offset)` pairs of a leaf
    pub fn entries(&self) -> Vec<(i32, u64)> {
        self.keys()
            .iter()
            .copied()
            .zip(self.children[..self.num_keys].iter().copied())
            .collect()
    }

    /// Which child of an internal node covers `key`
    ///
    /// The number of separators `<= key`: equal keys go right.
    pub fn child_index(&self, key: i32) -> usize {
        self.keys().partition_point(|&k| k <= key)
    }

    /// Data offset for `key` in a leaf
    pub fn lookup(&self, key: i32) -> Option<u64> {
        self.keys()
            .iter()
            .position(|&k| k == key)
            .map(|i| self.children[i])
    }

    // =========================================================================
    // Mutation
    // =========================================================================

    /// Replace a leaf's contents
    pub fn set_entries(&mut self, entries: &[(i32, u64)]) -> Result<()> {
        if entries.len() > MAX_KEYS {
            return Err(SlotError::Corruption(format!(
                "{} entries exceed leaf capacity {}",
                entries.len(),
                MAX_KEYS
            )));
        }

        self.keys = [0; MAX_KEYS];
        self.children = [0; ORDER];
        for (i, &(key, offset)) in entries.iter().enumerate() {
            self.keys[i] = key;
            self.children[i] = offset;
        }
        self.num_keys = entries.len();
        Ok(())
    }

    /// Replace an internal node's separators and children
    pub fn set_separators(&mut self, keys: &[i32], children: &[u64]) -> Result<()> {
        if keys.len() > MAX_KEYS || children.len() != keys.len() + 1 {
            return Err(SlotError::Corruption(format!(
                "{} keys / {} children do not fit an internal node",
                keys.len(),
                children.len()
            )));
        }

        self.keys = [0; MAX_KEYS];
        self.children = [0; ORDER];
        self.keys[..keys.len()].copy_from_slice(keys);
        self.children[..children.len()].copy_from_slice(children);
        self.num_keys = keys.len();
        Ok(())
    }

    /// Remove the leaf entry at `pos`, shifting later entries left
    pub fn remove_entry(&mut self, pos: usize) -> (i32, u64) {
        let removed = (self.keys[pos], self.children[pos]);
        self.keys.copy_within(pos + 1..self.num_keys, pos);
        self.children.copy_within(pos + 1..self.num_keys, pos);
        self.num_keys -= 1;
        self.keys[self.num_keys] = 0;
        self.children[self.num_keys] = 0;
        removed
    }

    /// Remove separator `sep` and the child to its right
    pub fn remove_separator(&mut self, sep: usize) {
        let child_count = self.num_keys + 1;
        self.keys.copy_within(sep + 1..self.num_keys, sep);
        self.children.copy_within(sep + 2..child_count, sep + 1);
        self.num_keys -= 1;
        self.keys[self.num_keys] = 0;
        self.children[self.num_keys + 1] = 0;
    }

    /// Overwrite separator `sep`
    pub fn set_key(&mut self, sep: usize, key: i32) {
        self.keys[sep] = key;
    }

    // =========================================================================
    // Codec
    // =========================================================================

    pub fn encode(&self) -> BytesMut {
        let mut buf = BytesMut::with_capacity(NODE_SIZE as usize);
        buf.put_u8(u8::from(self.is_leaf));
        buf.put_i32_le(self.num_keys as i32);
        for key in self.keys {
            buf.put_i32_le(key);
        }
        for child in self.children {
            buf.put_i64_le(child as i64);
        }
        buf.put_i64_le(encode_offset(self.next_leaf));
        buf
    }

    pub fn decode(mut data: &[u8]) -> Result<Self> {
        if data.len() < NODE_SIZE as usize {
            return Err(SlotError::Corruption(format!(
                "index node truncated: {} bytes",
                data.len()
            )));
        }

        let is_leaf = match data.get_u8() {
            0 => false,
            1 => true,
            other => {
                return Err(SlotError::Corruption(format!(
                    "invalid node kind byte {}",
                    other
                )))
            }
        };

        let raw_keys = data.get_i32_le();
        if raw_keys < 0 || raw_keys as usize > MAX_KEYS {
            return Err(SlotError::Corruption(format!(
                "node key count {} out of range",
                raw_keys
            )));
        }
        let num_keys = raw_keys as usize;

        let mut keys = [0; MAX_KEYS];
        for key in keys.iter_mut() {
            *key = data.get_i32_le();
        }

        let mut children = [0; ORDER];
        for child in children.iter_mut() {
            *child = data.get_i64_le() as u64;
        }

        let next_leaf = decode_offset(data.get_i64_le(), "next leaf")?;

        Ok(Self {
            is_leaf,
            num_keys,
            keys,
            children,
            next_leaf,
        })
    }
}
