//! Record Module
//!
//! The capability a type must offer to be kept in a `RecordStore`.
//!
//! ## Contract
//! - `encode` produces the opaque payload written into a slot.
//! - `decode` rebuilds the value from a slot's payload. The slice it
//!   receives spans the slot's *capacity*, which can be longer than the
//!   bytes `encode` produced when the slot was reused or shrunk in place,
//!   so implementations must ignore trailing bytes.
//! - The identifier is assigned by the store on `create` and never
//!   changes afterwards.

mod country;

pub use country::Country;

use crate::error::Result;

/// A value that can be persisted by the record store
pub trait Record: Sized {
    /// Serialize this record to its payload bytes
    fn encode(&self) -> Result<Vec<u8>>;

    /// Deserialize a record from payload bytes (trailing bytes allowed)
    fn decode(bytes: &[u8]) -> Result<Self>;

    /// Store-assigned identifier
    fn id(&self) -> i32;

    /// Overwrite the identifier (called by the store on create)
    fn set_id(&mut self, id: i32);
}
