//! B+Tree
//!
//! Every mutation writes the touched nodes straight back to the index file;
//! nothing is cached besides the header.
//!
//! ## Insert
//! 1. Descend to the leaf covering the key.
//! 2. Insert in sorted position; a leaf with 4 keys splits 2/2 and the first
//!    key of the new right leaf is promoted.
//! 3. An internal node receiving a promotion that overflows splits around
//!    its middle key, which moves up and stays in neither half.
//! 4. A split root gets a new root above it.
//!
//! ## Delete
//! 1. Descend, recording the path.
//! 2. Remove the key from its leaf.
//! 3. An underflowed non-root leaf borrows one entry from a sibling that
//!    has more than the minimum, otherwise merges with it (the left node of
//!    the pair survives). Internal nodes are not rebalanced; an emptied
//!    root hands over to its only child.

use std::collections::VecDeque;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::disk::{file_len, read_at, write_at};
use crate::error::{Result, SlotError};

use super::header::IndexHeader;
use super::node::{Node, MAX_KEYS, MIN_KEYS};
use super::{HEADER_SIZE, NODE_SIZE};

/// What a recursive insert step reports to its caller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// The subtree absorbed the key
    NoSplit,
    /// The subtree's root split; the caller must adopt the new right node
    Split {
        promoted_key: i32,
        new_node_offset: u64,
    },
}

/// One step of a root-to-leaf descent
struct PathStep {
    offset: u64,
    node: Node,
    /// Child taken from this node
    child_index: usize,
}

/// Disk-resident B+Tree from record id to data file offset
pub struct BPlusTree {
    /// Open handle, exclusively owned
    file: File,
    path: PathBuf,
    /// Write-through copy of the on-disk header
    header: IndexHeader,
    /// fsync on `sync()`
    sync_writes: bool,
}

impl BPlusTree {
    /// Open or create an index file
    pub fn open(path: &Path, sync_writes: bool) -> Result<Self> {
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        let len = file_len(&file)?;
        let header = if len == 0 {
            let header = IndexHeader::default();
            write_at(&mut file, 0, &header.encode())?;
            file.flush()?;
            tracing::debug!("Initialised index file {}", path.display());
            header
        } else {
            if len < HEADER_SIZE {
                return Err(SlotError::Corruption(format!(
                    "index file {} is {} bytes, shorter than its header",
                    path.display(),
                    len
                )));
            }
            let mut buf = [0u8; HEADER_SIZE as usize];
            read_at(&mut file, 0, &mut buf)?;
            IndexHeader::decode(&buf)?
        };

        Ok(Self {
            file,
            path: path.to_path_buf(),
            header,
            sync_writes,
        })
    }

    // =========================================================================
    // Search
    // =========================================================================

    /// Data offset stored for `key`
    pub fn search(&mut self, key: i32) -> Result<Option<u64>> {
        let Some(mut current) = self.header.root else {
            return Ok(None);
        };

        loop {
            let node = self.read_node(current)?;
            if node.is_leaf {
                return Ok(node.lookup(key));
            }
            current = node.children()[node.child_index(key)];
        }
    }

    /// True when no key is stored
    pub fn is_empty(&mut self) -> Result<bool> {
        match self.header.root {
            None => Ok(true),
            Some(root) => {
                let node = self.read_node(root)?;
                Ok(node.is_leaf && node.num_keys() == 0)
            }
        }
    }

    // =========================================================================
    // Insert
    // =========================================================================

    /// Map `key` to `offset`; an existing key is rejected untouched
    pub fn insert(&mut self, key: i32, offset: u64) -> Result<()> {
        if self.search(key)?.is_some() {
            return Err(SlotError::DuplicateKey(key));
        }

        let Some(root) = self.header.root else {
            let leaf = Node::leaf_with(&[(key, offset)], None)?;
            let at = self.allocate_node()?;
            self.write_node(at, &leaf)?;
            self.set_root(Some(at))?;
            return Ok(());
        };

        if let InsertOutcome::Split {
            promoted_key,
            new_node_offset,
        } = self.insert_into(root, key, offset)?
        {
            let new_root = Node::internal_with(&[promoted_key], &[root, new_node_offset])?;
            let at = self.allocate_node()?;
            self.write_node(at, &new_root)?;
            self.set_root(Some(at))?;
            tracing::debug!("Root split on key {}, new root at {}", promoted_key, at);
        }

        Ok(())
    }

    fn insert_into(&mut self, at: u64, key: i32, value: u64) -> Result<InsertOutcome> {
        let mut node = self.read_node(at)?;

        if node.is_leaf {
            let mut entries = node.entries();
            let pos = entries.partition_point(|&(k, _)| k < key);
            entries.insert(pos, (key, value));

            if entries.len() <= MAX_KEYS {
                node.set_entries(&entries)?;
                self.write_node(at, &node)?;
                return Ok(InsertOutcome::NoSplit);
            }

            let mid = entries.len() / 2;
            let right_at = self.allocate_node()?;
            let right = Node::leaf_with(&entries[mid..], node.next_leaf)?;
            node.set_entries(&entries[..mid])?;
            node.next_leaf = Some(right_at);

            self.write_node(at, &node)?;
            self.write_node(right_at, &right)?;
            tracing::debug!("Leaf {} split, new leaf at {}", at, right_at);

            return Ok(InsertOutcome::Split {
                promoted_key: entries[mid].0,
                new_node_offset: right_at,
            });
        }

        let idx = node.child_index(key);
        let (promoted_key, new_child) = match self.insert_into(node.children()[idx], key, value)? {
            InsertOutcome::NoSplit => return Ok(InsertOutcome::NoSplit),
            InsertOutcome::Split {
                promoted_key,
                new_node_offset,
            } => (promoted_key, new_node_offset),
        };

        let mut keys = node.keys().to_vec();
        let mut children = node.children().to_vec();
        keys.insert(idx, promoted_key);
        children.insert(idx + 1, new_child);

        if keys.len() <= MAX_KEYS {
            node.set_separators(&keys, &children)?;
            self.write_node(at, &node)?;
            return Ok(InsertOutcome::NoSplit);
        }

        let mid = keys.len() / 2;
        let up = keys[mid];
        let right_at = self.allocate_node()?;
        let right = Node::internal_with(&keys[mid + 1..], &children[mid + 1..])?;
        node.set_separators(&keys[..mid], &children[..=mid])?;

        self.write_node(at, &node)?;
        self.write_node(right_at, &right)?;
        tracing::debug!("Internal node {} split around key {}, new node at {}", at, up, right_at);

        Ok(InsertOutcome::Split {
            promoted_key: up,
            new_node_offset: right_at,
        })
    }

    // =========================================================================
    // Delete
    // =========================================================================

    /// Remove `key`; `false` when it was not present
    pub fn delete(&mut self, key: i32) -> Result<bool> {
        let Some(root) = self.header.root else {
            return Ok(false);
        };

        let mut path: Vec<PathStep> = Vec::new();
        let mut current = root;
        let mut leaf = loop {
            let node = self.read_node(current)?;
            if node.is_leaf {
                break node;
            }
            let child_index = node.child_index(key);
            let next = node.children()[child_index];
            path.push(PathStep {
                offset: current,
                node,
                child_index,
            });
            current = next;
        };
        let leaf_at = current;

        let Some(pos) = leaf.keys().iter().position(|&k| k == key) else {
            return Ok(false);
        };
        leaf.remove_entry(pos);
        self.write_node(leaf_at, &leaf)?;

        if leaf.num_keys() >= MIN_KEYS {
            return Ok(true);
        }
        let Some(parent) = path.pop() else {
            // The root leaf may hold any number of keys
            return Ok(true);
        };

        self.rebalance_leaf(leaf_at, leaf, parent)?;
        Ok(true)
    }

    /// Fix an underflowed leaf by borrowing from or merging with a sibling
    fn rebalance_leaf(&mut self, leaf_at: u64, leaf: Node, parent: PathStep) -> Result<()> {
        let PathStep {
            offset: parent_at,
            node: mut parent,
            child_index: idx,
        } = parent;

        if parent.children().len() < 2 {
            tracing::debug!("Underflowed leaf {} has no sibling", leaf_at);
            return Ok(());
        }

        // The pair is (children[sep], children[sep + 1]) around separator `sep`
        let use_left = idx > 0;
        let sep = if use_left { idx - 1 } else { idx };
        let sibling_at = parent.children()[if use_left { idx - 1 } else { idx + 1 }];
        let sibling = self.read_node(sibling_at)?;

        let (left_at, mut left, right_at, mut right) = if use_left {
            (sibling_at, sibling, leaf_at, leaf)
        } else {
            (leaf_at, leaf, sibling_at, sibling)
        };

        let sibling_keys = if use_left { left.num_keys() } else { right.num_keys() };

        if sibling_keys > MIN_KEYS {
            let mut left_entries = left.entries();
            let mut right_entries = right.entries();
            if use_left {
                if let Some(moved) = left_entries.pop() {
                    right_entries.insert(0, moved);
                }
            } else {
                left_entries.push(right_entries.remove(0));
            }
            left.set_entries(&left_entries)?;
            right.set_entries(&right_entries)?;
            parent.set_key(sep, right_entries[0].0);

            self.write_node(left_at, &left)?;
            self.write_node(right_at, &right)?;
            self.write_node(parent_at, &parent)?;
            tracing::debug!("Leaves {} and {} rebalanced by borrowing", left_at, right_at);
            return Ok(());
        }

        let mut merged = left.entries();
        merged.extend(right.entries());
        left.set_entries(&merged)?;
        left.next_leaf = right.next_leaf;
        self.write_node(left_at, &left)?;

        parent.remove_separator(sep);
        self.write_node(parent_at, &parent)?;
        tracing::debug!("Leaf {} merged into {}", right_at, left_at);

        if self.header.root == Some(parent_at) && parent.num_keys() == 0 {
            let only_child = parent.children()[0];
            self.set_root(Some(only_child))?;
            tracing::debug!("Root emptied, {} is the new root", only_child);
        }

        Ok(())
    }

    // =========================================================================
    // Traversal
    // =========================================================================

    /// All `(key, data offset)` pairs in key order, following the leaf chain
    pub fn entries(&mut self) -> Result<Vec<(i32, u64)>> {
        let mut out = Vec::new();
        let mut cursor = self.leftmost_leaf()?;
        let mut hops = 0u64;
        let limit = self.node_capacity();

        while let Some(at) = cursor {
            hops += 1;
            if hops > limit {
                return Err(SlotError::Corruption("leaf chain contains a cycle".to_string()));
            }
            let leaf = self.read_node(at)?;
            out.extend(leaf.entries());
            cursor = leaf.next_leaf;
        }

        Ok(out)
    }

    /// All keys in leaf-chain order
    pub fn keys(&mut self) -> Result<Vec<i32>> {
        Ok(self.entries()?.into_iter().map(|(k, _)| k).collect())
    }

    /// Every reachable node with its offset, breadth-first from the root
    pub fn nodes(&mut self) -> Result<Vec<(u64, Node)>> {
        let mut out = Vec::new();
        let mut queue: VecDeque<u64> = self.header.root.into_iter().collect();

        while let Some(at) = queue.pop_front() {
            if out.len() as u64 >= self.node_capacity() {
                return Err(SlotError::Corruption("index tree contains a cycle".to_string()));
            }
            let node = self.read_node(at)?;
            if !node.is_leaf {
                queue.extend(node.children().iter().copied());
            }
            out.push((at, node));
        }

        Ok(out)
    }

    /// Number of levels (0 for an empty tree)
    pub fn height(&mut self) -> Result<usize> {
        let mut height = 0;
        let mut cursor = self.header.root;
        while let Some(at) = cursor {
            height += 1;
            if height as u64 > self.node_capacity() {
                return Err(SlotError::Corruption("index tree contains a cycle".to_string()));
            }
            let node = self.read_node(at)?;
            cursor = if node.is_leaf {
                None
            } else {
                Some(node.children()[0])
            };
        }
        Ok(height)
    }

    fn leftmost_leaf(&mut self) -> Result<Option<u64>> {
        let mut cursor = self.header.root;
        let mut depth = 0u64;
        while let Some(at) = cursor {
            depth += 1;
            if depth > self.node_capacity() {
                return Err(SlotError::Corruption("index tree contains a cycle".to_string()));
            }
            let node = self.read_node(at)?;
            if node.is_leaf {
                return Ok(Some(at));
            }
            cursor = Some(node.children()[0]);
        }
        Ok(None)
    }

    // =========================================================================
    // Node Storage
    // =========================================================================

    fn read_node(&mut self, at: u64) -> Result<Node> {
        if at < HEADER_SIZE || at + NODE_SIZE > self.header.next_free {
            return Err(SlotError::Corruption(format!(
                "node offset {} outside allocated index region",
                at
            )));
        }
        let mut buf = [0u8; NODE_SIZE as usize];
        read_at(&mut self.file, at, &mut buf)?;
        Node::decode(&buf)
    }

    fn write_node(&mut self, at: u64, node: &Node) -> Result<()> {
        write_at(&mut self.file, at, &node.encode())
    }

    /// Bump-allocate space for one node
    fn allocate_node(&mut self) -> Result<u64> {
        let at = self.header.next_free;
        self.header.next_free += NODE_SIZE;
        self.write_header()?;
        Ok(at)
    }

    /// Upper bound on the number of nodes ever allocated
    fn node_capacity(&self) -> u64 {
        (self.header.next_free - HEADER_SIZE) / NODE_SIZE
    }

    fn set_root(&mut self, root: Option<u64>) -> Result<()> {
        self.header.root = root;
        self.write_header()
    }

    fn write_header(&mut self) -> Result<()> {
        let buf = self.header.encode();
        write_at(&mut self.file, 0, &buf)
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Drop every entry, leaving an empty index
    pub fn clear(&mut self) -> Result<()> {
        self.file.set_len(0)?;
        self.header = IndexHeader::default();
        self.write_header()?;
        self.sync()
    }

    /// Flush to the OS, and to disk when `sync_writes` is set
    pub fn sync(&mut self) -> Result<()> {
        self.file.flush()?;
        if self.sync_writes {
            self.file.sync_data()?;
        }
        Ok(())
    }

    /// Release the file handle; the tree is unusable afterwards
    pub fn close(mut self) -> Result<()> {
        self.file.flush()?;
        self.file.sync_all()?;
        Ok(())
    }

    /// Current header values
    pub fn header(&self) -> IndexHeader {
        self.header
    }

    /// Offset of the root node
    pub fn root_offset(&self) -> Option<u64> {
        self.header.root
    }

    /// Path of the index file
    pub fn path(&self) -> &Path {
        &self.path
    }
}
