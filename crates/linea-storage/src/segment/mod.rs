//! Segments: runs of pages governed by a single linear model.
//!
//! A segment of `P` pages covers a key range starting at its base key; its
//! model maps a key's offset from the base to a page index in `[0, P)`.
//! Single-page segments carry no model. Segments live in size-class files
//! (`2^i` pages each) and are addressed by [`SegmentId`].

mod builder;
mod circular;
mod free_list;
mod manager;
mod wrap;

pub use builder::SegmentBuilder;
pub use circular::CircularPageBuffer;
pub use free_list::FreeList;
pub use manager::SegmentManager;
pub use wrap::SegmentWrap;

use bytes::Bytes;
use linea_common::model::page_for_key;
use linea_common::types::Key;
use linea_common::{Line, SegmentId};

/// A record headed for a segment: integer key plus value payload.
pub type Record = (Key, Bytes);

/// Admissible segment sizes, largest first (the builder's preference
/// order).
pub(crate) const SEGMENT_PAGE_COUNTS_DESC: &[usize] = &[16, 8, 4, 2, 1];

/// A segment produced by the [`SegmentBuilder`], not yet written to disk.
#[derive(Debug, Clone)]
pub struct Segment {
    /// Smallest key in the segment.
    pub base_key: Key,
    /// Number of pages; one of {1, 2, 4, 8, 16}.
    pub page_count: usize,
    /// The model mapping keys to page indices. `None` for single-page
    /// segments.
    pub model: Option<Line>,
    /// The segment's records in ascending key order.
    pub records: Vec<Record>,
}

/// The index value describing a live on-disk segment.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentInfo {
    id: SegmentId,
    model: Option<Line>,
    has_overflow: bool,
}

impl SegmentInfo {
    /// Creates an info for a freshly written segment (no overflow yet).
    #[must_use]
    pub fn new(id: SegmentId, model: Option<Line>) -> Self {
        Self {
            id,
            model,
            has_overflow: false,
        }
    }

    /// Returns the segment's ID.
    #[inline]
    #[must_use]
    pub fn id(&self) -> SegmentId {
        self.id
    }

    /// Returns the segment's model, if any.
    #[inline]
    #[must_use]
    pub fn model(&self) -> Option<&Line> {
        self.model.as_ref()
    }

    /// Returns the number of pages in the segment.
    #[inline]
    #[must_use]
    pub fn page_count(&self) -> usize {
        self.id.page_count()
    }

    /// Returns true if any page of this segment has an overflow.
    #[inline]
    #[must_use]
    pub fn has_overflow(&self) -> bool {
        self.has_overflow
    }

    /// Sets the overflow marker.
    pub fn set_overflow(&mut self, has_overflow: bool) {
        self.has_overflow = has_overflow;
    }

    /// Returns the page index responsible for `key`.
    #[must_use]
    pub fn page_for(&self, base: Key, key: Key) -> usize {
        match &self.model {
            Some(model) => page_for_key(base, model, self.page_count(), key),
            None => 0,
        }
    }
}

/// Computes the smallest key assigned to each page of a multi-page segment.
///
/// The boundaries are implicitly induced by the segment's model. The
/// inverted model only brackets the search: float error can move its output
/// across a page boundary, so the true boundary is found by binary search
/// in the integer key domain.
#[must_use]
pub fn page_lower_boundaries(seg: &Segment) -> Vec<Key> {
    let mut boundaries = vec![seg.base_key];
    if seg.page_count == 1 {
        return boundaries;
    }
    let model = seg.model.as_ref().expect("multi-page segments carry a model");
    boundaries.reserve(seg.page_count);
    let page_to_key = model.invert();

    for page_idx in 1..seg.page_count {
        // 1. Candidate boundary from the inverted model; only a bracket.
        let candidate = inverse_key(&page_to_key, page_idx, seg.base_key);
        let page_for_candidate = page_for_key(seg.base_key, model, seg.page_count, candidate);

        // 2. Bracket the search space around the candidate.
        let (mut lo, mut hi) = if page_for_candidate >= page_idx {
            (inverse_key(&page_to_key, page_idx - 1, seg.base_key), candidate)
        } else {
            (candidate, inverse_key(&page_to_key, page_idx + 1, seg.base_key))
        };
        debug_assert!(lo < hi);

        // 3. Smallest key in [lo, hi] mapping to page_idx.
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            if page_for_key(seg.base_key, model, seg.page_count, mid) < page_idx {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        debug_assert_eq!(page_for_key(seg.base_key, model, seg.page_count, lo), page_idx);
        debug_assert!(
            lo == 0 || page_for_key(seg.base_key, model, seg.page_count, lo - 1) < page_idx
        );
        boundaries.push(lo);
    }

    debug_assert_eq!(boundaries.len(), seg.page_count);
    boundaries
}

/// Applies the inverted model at `page_idx` and shifts back into the key
/// domain, saturating at the domain edges.
fn inverse_key(page_to_key: &Line, page_idx: usize, base: Key) -> Key {
    let offset = page_to_key.apply(page_idx as f64);
    if offset <= 0.0 {
        return base;
    }
    base.saturating_add(offset as Key)
}
