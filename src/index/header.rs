//! Index file header

use bytes::{Buf, BufMut, BytesMut};

use crate::disk::{decode_offset, encode_offset};
use crate::error::{Result, SlotError};

use super::HEADER_SIZE;

/// Root pointer and allocation cursor of the index file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexHeader {
    /// Offset of the root node, `None` for an empty tree
    pub root: Option<u64>,
    /// Offset the next allocated node will occupy
    pub next_free: u64,
}

impl Default for IndexHeader {
    fn default() -> Self {
        Self {
            root: None,
            next_free: HEADER_SIZE,
        }
    }
}

impl IndexHeader {
    pub fn encode(&self) -> BytesMut {
        let mut buf = BytesMut::with_capacity(HEADER_SIZE as usize);
        buf.put_i64_le(encode_offset(self.root));
        buf.put_i64_le(self.next_free as i64);
        buf
    }

    pub fn decode(mut data: &[u8]) -> Result<Self> {
        if data.len() < HEADER_SIZE as usize {
            return Err(SlotError::Corruption(format!(
                "index header truncated: {} bytes",
                data.len()
            )));
        }

        let root = decode_offset(data.get_i64_le(), "index root")?;
        let next_free = data.get_i64_le();
        if next_free < HEADER_SIZE as i64 {
            return Err(SlotError::Corruption(format!(
                "index allocation cursor {} inside header",
                next_free
            )));
        }

        Ok(Self {
            root,
            next_free: next_free as u64,
        })
    }
}
