//! Data file header
//!
//! The 12-byte block at offset 0. It is cached by `DataFile` and written
//! through on every change.

use bytes::{Buf, BufMut, BytesMut};

use crate::disk::{decode_offset, encode_offset};
use crate::error::{Result, SlotError};

use super::HEADER_SIZE;

/// Decoded data file header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataHeader {
    /// Highest identifier handed out so far (0 for a new file)
    pub last_id: i32,
    /// Offset of the first free slot
    pub free_head: Option<u64>,
}

impl Default for DataHeader {
    fn default() -> Self {
        Self {
            last_id: 0,
            free_head: None,
        }
    }
}

impl DataHeader {
    /// Encode to the fixed on-disk layout
    pub fn encode(&self) -> BytesMut {
        let mut buf = BytesMut::with_capacity(HEADER_SIZE as usize);
        buf.put_i32_le(self.last_id);
        buf.put_i64_le(encode_offset(self.free_head));
        buf
    }

    /// Decode from the fixed on-disk layout
    pub fn decode(mut data: &[u8]) -> Result<Self> {
        if data.len() < HEADER_SIZE as usize {
            return Err(SlotError::Corruption(format!(
                "data header truncated: {} bytes",
                data.len()
            )));
        }

        let last_id = data.get_i32_le();
        let free_head = decode_offset(data.get_i64_le(), "free list head")?;

        Ok(Self { last_id, free_head })
    }
}
