//! Index Module
//!
//! Disk-resident B+Tree (order 4) mapping record identifiers to data file
//! offsets.
//!
//! ## File Format
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │ Header (16 bytes)                                            │
//! │   RootOffset: i64 (8, -1 = empty) | NextFreeOffset: i64 (8)  │
//! ├──────────────────────────────────────────────────────────────┤
//! │ Node (57 bytes, fixed)                                       │
//! │   IsLeaf: u8 (1) | NumKeys: i32 (4) | Keys: [i32; 3] (12)    │
//! │   Children: [i64; 4] (32) | NextLeaf: i64 (8)                │
//! ├──────────────────────────────────────────────────────────────┤
//! │ ... nodes bump-allocated up to NextFreeOffset ...            │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! In a leaf, `Children[i]` is the data offset for `Keys[i]`; in an
//! internal node with `k` keys, `Children[0..=k]` are child node offsets.
//! All integers are little-endian. Nodes are never reclaimed.

mod header;
mod node;
mod tree;

pub use header::IndexHeader;
pub use node::{Node, MAX_KEYS, MIN_KEYS, ORDER};
pub use tree::{BPlusTree, InsertOutcome};

/// Header size: RootOffset (8) + NextFreeOffset (8) = 16 bytes
pub const HEADER_SIZE: u64 = 16;

/// Node size: IsLeaf (1) + NumKeys (4) + Keys (3 * 4) + Children (4 * 8) + NextLeaf (8)
pub const NODE_SIZE: u64 = 1 + 4 + (MAX_KEYS as u64 * 4) + (ORDER as u64 * 8) + 8;
