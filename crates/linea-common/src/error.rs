//! Error handling for LineaDB.
//!
//! This module provides the unified error type and result alias used across
//! all LineaDB components.

use thiserror::Error;

use crate::types::{PageId, SegmentId};

/// The main error type for LineaDB.
///
/// Each variant carries the context needed to act on the error. Reorg and
/// rewrite failures leave the index describing a consistent pre-op or
/// post-op state, so callers may retry `Io` errors.
#[derive(Debug, Error)]
pub enum LineaError {
    /// Internal error - this indicates a bug.
    #[error("internal error: {message}")]
    Internal {
        /// Error message.
        message: String,
    },

    /// Invalid argument provided.
    #[error("invalid argument: {message}")]
    InvalidArgument {
        /// Error message.
        message: String,
    },

    /// I/O error from the underlying system.
    #[error("I/O error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Data corruption detected.
    #[error("data corruption detected: {message}")]
    Corruption {
        /// Description of the corruption.
        message: String,
    },

    /// Checksum mismatch while reading a page.
    #[error("checksum mismatch: expected {expected:#010x}, got {actual:#010x}")]
    ChecksumMismatch {
        /// Expected checksum.
        expected: u32,
        /// Actual checksum.
        actual: u32,
    },

    /// Key not found.
    #[error("key not found")]
    KeyNotFound,

    /// A page rejected an insert because it is out of space.
    #[error("page is full: record of {record_size} bytes, {free_space} bytes free")]
    PageFull {
        /// Size of the record that could not be inserted.
        record_size: usize,
        /// Free space remaining on the page.
        free_space: usize,
    },

    /// A referenced page does not exist.
    #[error("page {page_id} not found")]
    PageNotFound {
        /// The missing page ID.
        page_id: PageId,
    },

    /// A referenced segment does not exist.
    #[error("segment {segment_id} not found")]
    SegmentNotFound {
        /// The missing segment ID.
        segment_id: SegmentId,
    },

    /// Invalid configuration.
    #[error("invalid configuration: {message}")]
    InvalidConfig {
        /// Error message.
        message: String,
    },
}

impl LineaError {
    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Creates an invalid argument error.
    #[must_use]
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Creates a corruption error.
    #[must_use]
    pub fn corruption(message: impl Into<String>) -> Self {
        Self::Corruption {
            message: message.into(),
        }
    }

    /// Returns true if this error is transient and the operation may be
    /// retried by the caller.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Io { .. })
    }
}

/// Result type alias for LineaDB operations.
pub type LineaResult<T> = std::result::Result<T, LineaError>;
