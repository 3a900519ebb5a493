//! Data File
//!
//! Positioned reads and writes of record slots, the free list and the
//! header. Knows nothing about what a payload means.

use std::fs::{File, OpenOptions};
use std::io::{BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::disk::{file_len, read_at, write_at};
use crate::error::{Result, SlotError};

use super::header::DataHeader;
use super::slot::{FreeSlot, SlotPrefix, SlotStatus};
use super::{HEADER_SIZE, MAX_PAYLOAD_SIZE, SLOT_PREFIX_SIZE};

/// A slot read back from the data file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Offset of the slot's status byte
    pub offset: u64,
    pub status: SlotStatus,
    /// Length field of the slot (its capacity)
    pub capacity: u16,
    /// `capacity` bytes of payload
    pub payload: Vec<u8>,
}

impl Frame {
    pub fn is_live(&self) -> bool {
        self.status == SlotStatus::Live
    }
}

/// The record data file
pub struct DataFile {
    /// Open handle, exclusively owned
    file: File,
    /// Where the file lives
    path: PathBuf,
    /// Write-through copy of the on-disk header
    header: DataHeader,
    /// fsync on `sync()`
    sync_writes: bool,
}

impl DataFile {
    /// Open or create a data file
    ///
    /// A file shorter than the header is (re)initialised with
    /// `last_id = 0` and an empty free list.
    pub fn open(path: &Path, sync_writes: bool) -> Result<Self> {
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        let header = if file_len(&file)? < HEADER_SIZE {
            let header = DataHeader::default();
            write_at(&mut file, 0, &header.encode())?;
            file.flush()?;
            tracing::debug!("Initialised data file {}", path.display());
            header
        } else {
            let mut buf = [0u8; HEADER_SIZE as usize];
            read_at(&mut file, 0, &mut buf)?;
            DataHeader::decode(&buf)?
        };

        Ok(Self {
            file,
            path: path.to_path_buf(),
            header,
            sync_writes,
        })
    }

    // =========================================================================
    // Header
    // =========================================================================

    /// Current header values
    pub fn header(&self) -> DataHeader {
        self.header
    }

    /// Advance `last_id` and persist it, returning the new identifier
    pub fn next_id(&mut self) -> Result<i32> {
        let id = self.header.last_id.checked_add(1).ok_or_else(|| {
            SlotError::Corruption("record identifier space exhausted".to_string())
        })?;
        self.header.last_id = id;
        self.write_header()?;
        Ok(id)
    }

    fn set_free_head(&mut self, head: Option<u64>) -> Result<()> {
        self.header.free_head = head;
        self.write_header()
    }

    fn write_header(&mut self) -> Result<()> {
        let buf = self.header.encode();
        write_at(&mut self.file, 0, &buf)
    }

    // =========================================================================
    // Slots
    // =========================================================================

    /// Whether any slot has ever been written
    pub fn has_slots(&self) -> Result<bool> {
        Ok(file_len(&self.file)? > HEADER_SIZE)
    }

    /// Read the whole slot at `offset`
    pub fn read_frame(&mut self, offset: u64) -> Result<Frame> {
        let end = file_len(&self.file)?;
        if offset < HEADER_SIZE || offset + SLOT_PREFIX_SIZE > end {
            return Err(SlotError::Corruption(format!(
                "slot offset {} outside data file ({} bytes)",
                offset, end
            )));
        }

        let prefix = SlotPrefix::read(&mut self.file, offset)?;
        let mut payload = vec![0u8; prefix.capacity as usize];
        self.file.read_exact(&mut payload)?;

        Ok(Frame {
            offset,
            status: prefix.status,
            capacity: prefix.capacity,
            payload,
        })
    }

    /// Status and capacity of the slot at `offset`
    pub fn slot_info(&mut self, offset: u64) -> Result<(SlotStatus, u16)> {
        let prefix = SlotPrefix::read(&mut self.file, offset)?;
        Ok((prefix.status, prefix.capacity))
    }

    /// Store `payload` in a reclaimed slot or at end of file
    ///
    /// Returns the offset of the slot now holding it. A reclaimed slot keeps
    /// its original length field.
    pub fn write_live(&mut self, payload: &[u8]) -> Result<u64> {
        if payload.len() > MAX_PAYLOAD_SIZE {
            return Err(SlotError::RecordTooLarge {
                len: payload.len(),
                max: MAX_PAYLOAD_SIZE,
            });
        }

        if let Some(offset) = self.take_free(payload.len())? {
            tracing::debug!("Reusing free slot at {} for {} bytes", offset, payload.len());
            SlotPrefix::write_status(&mut self.file, offset, SlotStatus::Live)?;
            write_at(&mut self.file, offset + SLOT_PREFIX_SIZE, payload)?;
            return Ok(offset);
        }

        let offset = self.file.seek(SeekFrom::End(0))?;
        let prefix = SlotPrefix {
            status: SlotStatus::Live,
            capacity: payload.len() as u16,
        };
        self.file.write_all(&prefix.encode())?;
        self.file.write_all(payload)?;
        tracing::debug!("Appended slot at {} ({} bytes)", offset, payload.len());
        Ok(offset)
    }

    /// Overwrite the payload of the slot at `offset` without touching its
    /// length field; `payload` must fit the slot's capacity
    pub fn overwrite(&mut self, offset: u64, payload: &[u8]) -> Result<()> {
        let prefix = SlotPrefix::read(&mut self.file, offset)?;
        if payload.len() > prefix.capacity as usize {
            return Err(SlotError::Corruption(format!(
                "payload of {} bytes overflows slot capacity {} at offset {}",
                payload.len(),
                prefix.capacity,
                offset
            )));
        }
        write_at(&mut self.file, offset + SLOT_PREFIX_SIZE, payload)
    }

    /// Mark the slot at `offset` dead and hand its space to the free list
    ///
    /// Returns the slot's capacity.
    pub fn tombstone(&mut self, offset: u64) -> Result<u16> {
        let prefix = SlotPrefix::read(&mut self.file, offset)?;
        SlotPrefix::write_status(&mut self.file, offset, SlotStatus::Tombstone)?;
        self.add_free(prefix.capacity, offset)?;
        Ok(prefix.capacity)
    }

    /// Read every slot after the header, in file order
    ///
    /// Materialised eagerly; tombstones are included.
    pub fn frames(&mut self) -> Result<Vec<Frame>> {
        let end = file_len(&self.file)?;
        let mut reader = BufReader::new(&mut self.file);
        reader.seek(SeekFrom::Start(HEADER_SIZE))?;

        let mut frames = Vec::new();
        let mut offset = HEADER_SIZE;

        while offset < end {
            if offset + SLOT_PREFIX_SIZE > end {
                return Err(SlotError::Corruption(format!(
                    "truncated slot prefix at offset {}",
                    offset
                )));
            }

            let mut prefix_buf = [0u8; SLOT_PREFIX_SIZE as usize];
            reader.read_exact(&mut prefix_buf)?;
            let prefix = SlotPrefix::decode(&prefix_buf)?;

            let next = offset + SLOT_PREFIX_SIZE + prefix.capacity as u64;
            if next > end {
                return Err(SlotError::Corruption(format!(
                    "slot at offset {} runs past end of file",
                    offset
                )));
            }

            let mut payload = vec![0u8; prefix.capacity as usize];
            reader.read_exact(&mut payload)?;

            frames.push(Frame {
                offset,
                status: prefix.status,
                capacity: prefix.capacity,
                payload,
            });
            offset = next;
        }

        Ok(frames)
    }

    // =========================================================================
    // Free List
    // =========================================================================

    /// Link the tombstoned slot at `offset` into the free list
    ///
    /// The list is kept in ascending capacity order: the slot goes in front
    /// of the first node with a larger capacity, or at the tail. Because
    /// `take_free` is first-fit over this sorted list, reuse picks the
    /// smallest slot that is large enough (best-fit), not the most recently
    /// freed one.
    pub fn add_free(&mut self, capacity: u16, offset: u64) -> Result<()> {
        if !FreeSlot::can_hold_link(capacity) {
            tracing::warn!(
                "Slot at {} ({} bytes) too small for a free list link; not reclaimed",
                offset,
                capacity
            );
            return Ok(());
        }

        let mut prev: Option<u64> = None;
        let mut cursor = self.header.free_head;
        let mut steps = 0u64;
        let limit = self.walk_limit()?;

        while let Some(at) = cursor {
            steps += 1;
            if steps > limit {
                return Err(SlotError::Corruption("free list contains a cycle".to_string()));
            }
            let node = FreeSlot::read(&mut self.file, at)?;
            if node.capacity > capacity {
                break;
            }
            prev = Some(at);
            cursor = node.next;
        }

        FreeSlot::link(&mut self.file, offset, cursor)?;
        self.set_successor(prev, Some(offset))?;
        tracing::debug!("Slot at {} ({} bytes) added to free list", offset, capacity);
        Ok(())
    }

    /// Detach and return the first free slot whose capacity exceeds `len`
    pub fn take_free(&mut self, len: usize) -> Result<Option<u64>> {
        let mut prev: Option<u64> = None;
        let mut cursor = self.header.free_head;
        let mut steps = 0u64;
        let limit = self.walk_limit()?;

        while let Some(at) = cursor {
            steps += 1;
            if steps > limit {
                return Err(SlotError::Corruption("free list contains a cycle".to_string()));
            }
            let node = FreeSlot::read(&mut self.file, at)?;
            if node.capacity as usize > len {
                self.set_successor(prev, node.next)?;
                return Ok(Some(at));
            }
            prev = Some(at);
            cursor = node.next;
        }

        Ok(None)
    }

    /// Walk the free list from its head
    pub fn free_list(&mut self) -> Result<Vec<FreeSlot>> {
        let mut slots = Vec::new();
        let mut cursor = self.header.free_head;
        let mut steps = 0u64;
        let limit = self.walk_limit()?;

        while let Some(at) = cursor {
            steps += 1;
            if steps > limit {
                return Err(SlotError::Corruption("free list contains a cycle".to_string()));
            }
            let node = FreeSlot::read(&mut self.file, at)?;
            cursor = node.next;
            slots.push(node);
        }

        Ok(slots)
    }

    /// Point `prev` (or the header when `prev` is `None`) at `next`
    fn set_successor(&mut self, prev: Option<u64>, next: Option<u64>) -> Result<()> {
        match prev {
            None => self.set_free_head(next),
            Some(at) => FreeSlot::link(&mut self.file, at, next),
        }
    }

    /// More free-list hops than slots could fit in the file means a cycle
    fn walk_limit(&self) -> Result<u64> {
        Ok(file_len(&self.file)? / SLOT_PREFIX_SIZE)
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Flush to the OS, and to disk when `sync_writes` is set
    pub fn sync(&mut self) -> Result<()> {
        self.file.flush()?;
        if self.sync_writes {
            self.file.sync_data()?;
        }
        Ok(())
    }

    /// Release the file handle
    pub fn close(mut self) -> Result<()> {
        self.file.flush()?;
        self.file.sync_all()?;
        Ok(())
    }

    /// Path of the data file
    pub fn path(&self) -> &Path {
        &self.path
    }
}
