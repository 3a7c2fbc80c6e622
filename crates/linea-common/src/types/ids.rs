//! Core identifier types for LineaDB.
//!
//! These types provide type-safe wrappers around numeric identifiers,
//! preventing accidental misuse of different ID types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Page identifier - uniquely identifies a 4 KiB page in the page file.
///
/// Pages are the fundamental unit of storage. Allocation is monotonic per
/// process, so pages reference their overflows by ID without the
/// possibility of cycles.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct PageId(u64);

impl PageId {
    /// Invalid page ID, used as a sentinel value.
    pub const INVALID: Self = Self(u64::MAX);

    /// First valid page ID.
    pub const FIRST: Self = Self(0);

    /// Creates a new `PageId` from a raw u64 value.
    #[inline]
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw u64 value.
    #[inline]
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Checks if this is a valid page ID.
    #[inline]
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.0 != Self::INVALID.0
    }
}

impl fmt::Debug for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Self::INVALID {
            write!(f, "PageId(INVALID)")
        } else {
            write!(f, "PageId({})", self.0)
        }
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for PageId {
    #[inline]
    fn from(id: u64) -> Self {
        Self::new(id)
    }
}

impl From<PageId> for u64 {
    #[inline]
    fn from(id: PageId) -> Self {
        id.0
    }
}

/// Number of bits reserved for the page offset in a packed `SegmentId`.
const SEGMENT_OFFSET_BITS: u32 = 48;

/// Segment identifier - a size-class file ID plus a page offset within that
/// file.
///
/// Segment files are organized by size class: file `i` holds fixed-size
/// segments of `2^i` pages. The ID packs into a single u64 so that a page
/// can reference its overflow (always a one-page segment) in an 8-byte
/// header field.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct SegmentId(u64);

impl SegmentId {
    /// Invalid segment ID, used as a sentinel value.
    pub const INVALID: Self = Self(u64::MAX);

    /// Creates a new `SegmentId` from a size-class file ID and a page
    /// offset within that file.
    #[inline]
    #[must_use]
    pub const fn new(file_id: usize, page_offset: usize) -> Self {
        Self(((file_id as u64) << SEGMENT_OFFSET_BITS) | page_offset as u64)
    }

    /// Returns the size-class file ID.
    #[inline]
    #[must_use]
    pub const fn file_id(self) -> usize {
        (self.0 >> SEGMENT_OFFSET_BITS) as usize
    }

    /// Returns the page offset within the segment file.
    #[inline]
    #[must_use]
    pub const fn page_offset(self) -> usize {
        (self.0 & ((1u64 << SEGMENT_OFFSET_BITS) - 1)) as usize
    }

    /// Returns the number of pages in segments of this ID's size class.
    #[inline]
    #[must_use]
    pub const fn page_count(self) -> usize {
        1 << self.file_id()
    }

    /// Returns the packed u64 representation.
    #[inline]
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Reconstructs a `SegmentId` from its packed representation.
    #[inline]
    #[must_use]
    pub const fn from_u64(raw: u64) -> Self {
        Self(raw)
    }

    /// Checks if this is a valid segment ID.
    #[inline]
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.0 != Self::INVALID.0
    }
}

impl fmt::Debug for SegmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Self::INVALID {
            write!(f, "SegmentId(INVALID)")
        } else {
            write!(f, "SegmentId({}:{})", self.file_id(), self.page_offset())
        }
    }
}

impl fmt::Display for SegmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Self::INVALID {
            write!(f, "invalid")
        } else {
            write!(f, "{}:{}", self.file_id(), self.page_offset())
        }
    }
}
