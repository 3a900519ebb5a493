//! Record Store
//!
//! Coordinates the data file and its B+Tree index.
//!
//! ## Responsibilities
//! - Assign identifiers and frame records into slots
//! - Reuse reclaimed slots through the free list
//! - Keep the index's id → offset mapping current
//! - Rebuild a missing index from the data file on open
//!
//! ## Concurrency Model
//! One store owns its two file handles exclusively; every operation takes
//! `&mut self` and returns once its writes have reached the OS. There is no
//! locking, journaling or rollback: a failure part-way through an operation
//! leaves whatever was already written.

use std::fs;
use std::marker::PhantomData;
use std::path::Path;

use crate::config::Config;
use crate::data::{DataFile, FreeSlot, SlotStatus, MAX_PAYLOAD_SIZE};
use crate::error::{Result, SlotError};
use crate::index::BPlusTree;
use crate::record::Record;

/// Durable, offset-addressable storage for records of type `T`
pub struct RecordStore<T: Record> {
    /// Store configuration
    config: Config,

    /// Record slots, header and free list
    data: DataFile,

    /// id → data offset
    index: BPlusTree,

    _record: PhantomData<T>,
}

impl<T: Record> RecordStore<T> {
    /// Open or create a store with the given config
    ///
    /// On startup:
    /// 1. Create the data directory
    /// 2. Open/initialise the data file
    /// 3. Open/initialise the index file
    /// 4. Rebuild the index if it is empty but the data file has slots
    pub fn open(config: Config) -> Result<Self> {
        config.validate()?;

        // Step 1: Create data directory if it doesn't exist
        fs::create_dir_all(&config.data_dir)?;

        // Step 2-3: Open both files
        let data = DataFile::open(&config.data_path(), config.sync_writes)?;
        let index = BPlusTree::open(&config.index_path(), config.sync_writes)?;

        let mut store = Self {
            config,
            data,
            index,
            _record: PhantomData,
        };

        // Step 4: Recover a lost or empty index
        if store.index.is_empty()? && store.data.has_slots()? {
            let count = store.rebuild_index()?;
            tracing::info!("Rebuilt index from data file: {} live records", count);
        }

        tracing::info!(
            "Opened store {:?} (last_id={})",
            store.config.name,
            store.data.header().last_id
        );
        Ok(store)
    }

    /// Open with a directory (convenience method)
    ///
    /// Uses default config with the specified data directory
    pub fn open_path(path: &Path) -> Result<Self> {
        let config = Config::builder().data_dir(path).build();
        Self::open(config)
    }

    // =========================================================================
    // CRUD
    // =========================================================================

    /// Persist a new record, assigning and returning its identifier
    ///
    /// The id is written into `record` before it is encoded. The header's
    /// `last_id` advances even if a later step fails.
    pub fn create(&mut self, record: &mut T) -> Result<i32> {
        // Step 1: Reserve the next identifier
        let id = self.data.next_id()?;
        record.set_id(id);

        // Step 2: Frame the payload into a reclaimed or appended slot
        let payload = record.encode()?;
        let offset = self.data.write_live(&payload)?;

        // Step 3: Index it
        self.index.insert(id, offset)?;
        self.sync()?;

        tracing::debug!("Created record {} at {} ({} bytes)", id, offset, payload.len());
        Ok(id)
    }

    /// Read a record by identifier
    pub fn read(&mut self, id: i32) -> Result<Option<T>> {
        let Some(offset) = self.index.search(id)? else {
            return Ok(None);
        };

        let frame = self.data.read_frame(offset)?;
        if !frame.is_live() {
            tracing::warn!("Index maps record {} to tombstoned slot {}", id, offset);
            return Ok(None);
        }

        T::decode(&frame.payload).map(Some)
    }

    /// Replace the stored record with the same identifier
    ///
    /// A payload that fits the slot's capacity is written in place and the
    /// capacity is kept; a larger one moves to a new slot and the old slot
    /// joins the free list. Returns `false` if the id is unknown.
    pub fn update(&mut self, record: &T) -> Result<bool> {
        let id = record.id();
        let Some(offset) = self.index.search(id)? else {
            return Ok(false);
        };

        let (status, capacity) = self.data.slot_info(offset)?;
        if status != SlotStatus::Live {
            tracing::warn!("Index maps record {} to tombstoned slot {}", id, offset);
            return Ok(false);
        }

        let payload = record.encode()?;
        if payload.len() <= capacity as usize {
            self.data.overwrite(offset, &payload)?;
            self.sync()?;
            tracing::debug!("Updated record {} in place at {} ({} bytes)", id, offset, payload.len());
            return Ok(true);
        }

        // Refuse before tombstoning so an oversized update loses nothing
        if payload.len() > MAX_PAYLOAD_SIZE {
            return Err(SlotError::RecordTooLarge {
                len: payload.len(),
                max: MAX_PAYLOAD_SIZE,
            });
        }

        self.data.tombstone(offset)?;
        let new_offset = self.data.write_live(&payload)?;

        self.index.delete(id)?;
        self.index.insert(id, new_offset)?;
        self.sync()?;

        tracing::debug!("Relocated record {} from {} to {}", id, offset, new_offset);
        Ok(true)
    }

    /// Delete a record by identifier
    ///
    /// Returns `false` if the id is unknown. An index entry pointing at an
    /// already tombstoned slot is dropped without touching the free list.
    pub fn delete(&mut self, id: i32) -> Result<bool> {
        let Some(offset) = self.index.search(id)? else {
            return Ok(false);
        };

        let (status, _) = self.data.slot_info(offset)?;
        if status != SlotStatus::Live {
            tracing::warn!("Index maps record {} to tombstoned slot {}", id, offset);
            self.index.delete(id)?;
            self.sync()?;
            return Ok(false);
        }

        self.data.tombstone(offset)?;
        self.index.delete(id)?;
        self.sync()?;

        tracing::debug!("Deleted record {} at {}", id, offset);
        Ok(true)
    }

    // =========================================================================
    // Scans
    // =========================================================================

    /// Every live record in file order
    pub fn scan_all(&mut self) -> Result<Vec<T>> {
        Ok(self
            .scan_with_offsets()?
            .into_iter()
            .map(|(_, record)| record)
            .collect())
    }

    /// Every live record with the offset of its slot, in file order
    pub fn scan_with_offsets(&mut self) -> Result<Vec<(u64, T)>> {
        self.data
            .frames()?
            .into_iter()
            .filter(|frame| frame.is_live())
            .map(|frame| Ok((frame.offset, T::decode(&frame.payload)?)))
            .collect()
    }

    /// Every live record matching `predicate`
    pub fn find<P>(&mut self, mut predicate: P) -> Result<Vec<T>>
    where
        P: FnMut(&T) -> bool,
    {
        Ok(self
            .scan_all()?
            .into_iter()
            .filter(|record| predicate(record))
            .collect())
    }

    /// Re-derive the index from the live slots of the data file
    ///
    /// Any existing index content is discarded first. Returns the number
    /// of records indexed.
    pub fn rebuild_index(&mut self) -> Result<usize> {
        self.index.clear()?;

        let live = self.scan_with_offsets()?;
        for (offset, record) in &live {
            self.index.insert(record.id(), *offset)?;
        }
        self.index.sync()?;

        Ok(live.len())
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    fn sync(&mut self) -> Result<()> {
        self.data.sync()?;
        self.index.sync()
    }

    /// Close both files; the store cannot be used afterwards
    pub fn close(self) -> Result<()> {
        self.index.close()?;
        self.data.close()?;
        tracing::info!("Closed store {:?}", self.config.name);
        Ok(())
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    /// Highest identifier handed out so far
    pub fn last_id(&self) -> i32 {
        self.data.header().last_id
    }

    /// Offset currently indexed for `id`
    pub fn offset_of(&mut self, id: i32) -> Result<Option<u64>> {
        self.index.search(id)
    }

    /// Identifiers in index order (walks the leaf chain)
    pub fn indexed_ids(&mut self) -> Result<Vec<i32>> {
        self.index.keys()
    }

    /// The free list from its head
    pub fn free_list(&mut self) -> Result<Vec<FreeSlot>> {
        self.data.free_list()
    }

    /// Path of the data file
    pub fn data_path(&self) -> &Path {
        self.data.path()
    }

    /// Path of the index file
    pub fn index_path(&self) -> &Path {
        self.index.path()
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }
}
