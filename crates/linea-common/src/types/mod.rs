//! Core types for LineaDB.

mod ids;
mod keys;
mod sequence;

pub use ids::{PageId, SegmentId};
pub use keys::{extract_head64, key_from_bytes, key_to_bytes, Key};
pub use sequence::{EntryType, SequenceNumber};
