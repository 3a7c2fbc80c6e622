//! Free list of invalidated segments, pooled by page count.

use parking_lot::Mutex;
use std::collections::HashMap;

use linea_common::SegmentId;

/// Pools reusable segment slots per size class.
///
/// Segments invalidated by a rewrite land here; later writes of the same
/// size class reuse the slot instead of growing the segment file.
#[derive(Debug, Default)]
pub struct FreeList {
    pools: Mutex<HashMap<usize, Vec<SegmentId>>>,
}

impl FreeList {
    /// Creates an empty free list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an invalidated segment to the pool of its size class.
    pub fn add(&self, id: SegmentId) {
        self.pools.lock().entry(id.page_count()).or_default().push(id);
    }

    /// Takes a reusable segment of exactly `page_count` pages, if one
    /// exists.
    pub fn get(&self, page_count: usize) -> Option<SegmentId> {
        self.pools.lock().get_mut(&page_count)?.pop()
    }

    /// Returns true if `id` is currently pooled.
    #[must_use]
    pub fn contains(&self, id: SegmentId) -> bool {
        self.pools
            .lock()
            .get(&id.page_count())
            .is_some_and(|pool| pool.contains(&id))
    }

    /// Returns the total number of pooled segments.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pools.lock().values().map(Vec::len).sum()
    }

    /// Returns true if no segments are pooled.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
