//! # SlotDB
//!
//! A single-file record store with:
//! - Variable-length records framed with a liveness marker and length
//! - Tombstone deletion with a free list threaded through dead slots
//! - A disk-resident B+Tree index from record id to file offset
//! - Index reconstruction from the data file on startup
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 RecordStore<T: Record>                       │
//! │        create / read / update / delete / scan_all            │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!          ┌────────────┴────────────┐
//!          │                         │
//!          ▼                         ▼
//!   ┌─────────────┐          ┌─────────────┐
//!   │  DataFile   │          │  BPlusTree  │
//!   │  ({}.db)    │◄─offset──│  ({}.idx)   │
//!   └─────────────┘          └─────────────┘
//!    slots + free list        id → offset
//! ```
//!
//! Single writer, single process: a store owns both file handles for its
//! whole lifetime.

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod record;
pub mod data;
pub mod index;
pub mod store;

mod disk;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{SlotError, Result};
pub use config::Config;
pub use record::{Country, Record};
pub use store::RecordStore;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of SlotDB
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
