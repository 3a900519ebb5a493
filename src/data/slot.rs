//! Slot framing and the free-slot descriptor.
//!
//! This is the only code that knows how a slot prefix and a free-list link
//! are laid out on disk.

use std::fs::File;

use bytes::{Buf, BufMut, BytesMut};

use crate::disk::{decode_offset, encode_offset, read_at, write_at};
use crate::error::{Result, SlotError};

use super::{FREE_LINK_SIZE, SLOT_PREFIX_SIZE, STATUS_LIVE, STATUS_TOMBSTONE};

/// Liveness marker of a slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotStatus {
    Live,
    Tombstone,
}

impl SlotStatus {
    pub fn as_byte(self) -> u8 {
        match self {
            SlotStatus::Live => STATUS_LIVE,
            SlotStatus::Tombstone => STATUS_TOMBSTONE,
        }
    }
}

impl TryFrom<u8> for SlotStatus {
    type Error = SlotError;

    fn try_from(byte: u8) -> Result<Self> {
        match byte {
            STATUS_LIVE => Ok(SlotStatus::Live),
            STATUS_TOMBSTONE => Ok(SlotStatus::Tombstone),
            other => Err(SlotError::Corruption(format!(
                "invalid slot status byte 0x{:02x}",
                other
            ))),
        }
    }
}

// =============================================================================
// Slot Prefix
// =============================================================================

/// The 3 bytes that open every slot: status + length
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SlotPrefix {
    pub status: SlotStatus,
    /// Length written at append time (the slot's capacity)
    pub capacity: u16,
}

impl SlotPrefix {
    pub fn encode(&self) -> BytesMut {
        let mut buf = BytesMut::with_capacity(SLOT_PREFIX_SIZE as usize);
        buf.put_u8(self.status.as_byte());
        buf.put_i16_le(self.capacity as i16);
        buf
    }

    pub fn decode(mut data: &[u8]) -> Result<Self> {
        let status = SlotStatus::try_from(data.get_u8())?;
        let raw = data.get_i16_le();
        if raw < 0 {
            return Err(SlotError::Corruption(format!("negative slot length {}", raw)));
        }
        Ok(Self {
            status,
            capacity: raw as u16,
        })
    }

    /// Read the prefix of the slot at `offset`
    pub fn read(file: &mut File, offset: u64) -> Result<Self> {
        let mut buf = [0u8; SLOT_PREFIX_SIZE as usize];
        read_at(file, offset, &mut buf)?;
        Self::decode(&buf)
    }

    /// Rewrite only the status byte of the slot at `offset`
    pub fn write_status(file: &mut File, offset: u64, status: SlotStatus) -> Result<()> {
        write_at(file, offset, &[status.as_byte()])
    }
}

// =============================================================================
// Free Slot Descriptor
// =============================================================================

/// A tombstoned slot viewed as a free-list node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreeSlot {
    /// Offset of the slot's status byte
    pub offset: u64,
    /// Payload bytes available in the slot
    pub capacity: u16,
    /// Next free slot in the list
    pub next: Option<u64>,
}

impl FreeSlot {
    /// Whether a slot of `capacity` bytes has room for the `next` link
    pub fn can_hold_link(capacity: u16) -> bool {
        capacity as usize >= FREE_LINK_SIZE
    }

    /// Read the free-list node stored at `offset`
    pub(crate) fn read(file: &mut File, offset: u64) -> Result<Self> {
        let mut buf = [0u8; SLOT_PREFIX_SIZE as usize + FREE_LINK_SIZE];
        read_at(file, offset, &mut buf)?;

        let prefix = SlotPrefix::decode(&buf)?;
        if prefix.status != SlotStatus::Tombstone {
            return Err(SlotError::Corruption(format!(
                "free list reaches live slot at offset {}",
                offset
            )));
        }

        let mut link = &buf[SLOT_PREFIX_SIZE as usize..];
        let next = decode_offset(link.get_i64_le(), "free list link")?;

        Ok(Self {
            offset,
            capacity: prefix.capacity,
            next,
        })
    }

    /// Point the free slot at `offset` to `next`
    pub(crate) fn link(file: &mut File, offset: u64, next: Option<u64>) -> Result<()> {
        let mut buf = BytesMut::with_capacity(FREE_LINK_SIZE);
        buf.put_i64_le(encode_offset(next));
        write_at(file, offset + SLOT_PREFIX_SIZE, &buf)
    }
}
