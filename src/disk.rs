//! Positioned file I/O shared by the data and index files.
//!
//! Both files address their contents with absolute byte offsets and use
//! `-1` on disk as the null offset.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};

use crate::error::{Result, SlotError};

/// On-disk encoding of an absent offset
pub(crate) const NIL_OFFSET: i64 = -1;

/// Read exactly `buf.len()` bytes starting at `offset`
pub(crate) fn read_at(file: &mut File, offset: u64, buf: &mut [u8]) -> Result<()> {
    file.seek(SeekFrom::Start(offset))?;
    file.read_exact(buf)?;
    Ok(())
}

/// Write all of `buf` starting at `offset`
pub(crate) fn write_at(file: &mut File, offset: u64, buf: &[u8]) -> Result<()> {
    file.seek(SeekFrom::Start(offset))?;
    file.write_all(buf)?;
    Ok(())
}

/// Current file length in bytes
pub(crate) fn file_len(file: &File) -> Result<u64> {
    Ok(file.metadata()?.len())
}

/// `None` → -1, `Some(offset)` → offset
pub(crate) fn encode_offset(offset: Option<u64>) -> i64 {
    offset.map_or(NIL_OFFSET, |o| o as i64)
}

/// -1 → `None`; any other negative value is corrupt
pub(crate) fn decode_offset(raw: i64, what: &str) -> Result<Option<u64>> {
    match raw {
        NIL_OFFSET => Ok(None),
        o if o >= 0 => Ok(Some(o as u64)),
        o => Err(SlotError::Corruption(format!("invalid {} offset {}", what, o))),
    }
}
