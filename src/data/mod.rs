//! Data File Module
//!
//! Variable-length record storage with tombstone deletion and a free list
//! threaded through the reclaimed slots.
//!
//! ## File Format
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │ Header (12 bytes)                                        │
//! │   LastId: i32 (4) | FreeListHead: i64 (8, -1 = empty)    │
//! ├──────────────────────────────────────────────────────────┤
//! │ Live slot                                                │
//! │   Status ' ' (1) | Length: i16 (2) | Payload [Length]    │
//! ├──────────────────────────────────────────────────────────┤
//! │ Tombstoned slot (member of the free list)                │
//! │   Status '*' (1) | Capacity: i16 (2) | Next: i64 (8) |.. │
//! ├──────────────────────────────────────────────────────────┤
//! │ ... repeated until end of file ...                       │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! All integers are little-endian. The length written when a slot is first
//! appended is its capacity for life: reuse and in-place shrinking never
//! rewrite it.

mod file;
mod header;
mod slot;

pub use file::{DataFile, Frame};
pub use header::DataHeader;
pub use slot::{FreeSlot, SlotStatus};

// =============================================================================
// Shared Constants (used by header, slot, file)
// =============================================================================

/// Header size: LastId (4) + FreeListHead (8) = 12 bytes
pub const HEADER_SIZE: u64 = 12;

/// Slot prefix: Status (1) + Length (2) = 3 bytes
pub const SLOT_PREFIX_SIZE: u64 = 3;

/// Size of the `next` link stored in a tombstoned slot's payload
pub const FREE_LINK_SIZE: usize = 8;

/// Largest payload the i16 length field can describe
pub const MAX_PAYLOAD_SIZE: usize = i16::MAX as usize;

/// Status byte of a live slot
pub(crate) const STATUS_LIVE: u8 = b' ';

/// Status byte of a tombstoned slot
pub(crate) const STATUS_TOMBSTONE: u8 = b'*';
