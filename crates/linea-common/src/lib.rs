//! # linea-common
//!
//! Common types, errors, and utilities for LineaDB.
//!
//! This crate provides the foundational types shared by every LineaDB
//! component:
//!
//! - **Types**: Core identifiers (`PageId`, `SegmentId`, `FrameId`), key
//!   utilities, and sequence numbers
//! - **Model**: The linear model (`Line`) that maps keys to page positions
//! - **Errors**: Unified error handling with `LineaError`
//! - **Config**: Storage engine configuration
//! - **Constants**: System-wide constants and limits

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod constants;
pub mod error;
pub mod model;
pub mod types;

// Re-export commonly used items at the crate root
pub use config::StorageOptions;
pub use error::{LineaError, LineaResult};
pub use model::Line;
pub use types::{EntryType, Key, PageId, SegmentId, SequenceNumber};
