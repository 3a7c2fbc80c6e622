//! The ordered indexes mapping keys to storage locations.
//!
//! [`PageModel`] serves the page-chain store: boundary key to page ID, with
//! a page count that doubles as the conflict check for chain fixing - a
//! reorganization grows the model, and a fixer that observes the count
//! changing under it must re-resolve.
//!
//! [`SegmentIndex`] serves the segmented store: segment base key to
//! [`SegmentInfo`]. Individual calls are atomic with respect to one
//! another; the rewrite path relies on nothing stronger.

use std::collections::BTreeMap;

use parking_lot::RwLock;

use linea_common::types::Key;
use linea_common::PageId;

use crate::segment::SegmentInfo;

/// Ordered map from page lower-boundary keys to page IDs.
#[derive(Debug, Default)]
pub struct PageModel {
    entries: RwLock<BTreeMap<Vec<u8>, PageId>>,
}

impl PageModel {
    /// Creates an empty model.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Maps `key` to the page responsible for it.
    pub fn lookup(&self, key: &[u8]) -> Option<PageId> {
        self.entries
            .read()
            .range::<[u8], _>((std::ops::Bound::Unbounded, std::ops::Bound::Included(key)))
            .next_back()
            .map(|(_, page_id)| *page_id)
    }

    /// Inserts (or overwrites) the mapping for a boundary key.
    pub fn insert(&self, boundary: Vec<u8>, page_id: PageId) {
        self.entries.write().insert(boundary, page_id);
    }

    /// Returns the number of pages the model addresses.
    ///
    /// Observed before and after fixing a chain head to detect a
    /// reorganization that slipped in between.
    #[must_use]
    pub fn page_count(&self) -> usize {
        self.entries.read().len()
    }
}

/// Ordered map from segment base keys to segment descriptors.
#[derive(Debug, Default)]
pub struct SegmentIndex {
    entries: RwLock<BTreeMap<Key, SegmentInfo>>,
}

impl SegmentIndex {
    /// Creates an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the entry responsible for `key`: the one with the greatest
    /// base key not exceeding `key`.
    pub fn segment_for_key(&self, key: Key) -> Option<(Key, SegmentInfo)> {
        self.entries
            .read()
            .range(..=key)
            .next_back()
            .map(|(base, info)| (*base, info.clone()))
    }

    /// Returns the entry stored exactly at `base`, if any.
    pub fn get(&self, base: Key) -> Option<SegmentInfo> {
        self.entries.read().get(&base).cloned()
    }

    /// Returns the smallest base key strictly greater than `key`.
    pub fn next_base_after(&self, key: Key) -> Option<Key> {
        self.entries
            .read()
            .range((std::ops::Bound::Excluded(key), std::ops::Bound::Unbounded))
            .next()
            .map(|(base, _)| *base)
    }

    /// Returns the entry preceding `base`, if any.
    pub fn prev_entry(&self, base: Key) -> Option<(Key, SegmentInfo)> {
        self.entries
            .read()
            .range(..base)
            .next_back()
            .map(|(key, info)| (*key, info.clone()))
    }

    /// Returns the entry following `base`, if any.
    pub fn next_entry(&self, base: Key) -> Option<(Key, SegmentInfo)> {
        self.entries
            .read()
            .range((std::ops::Bound::Excluded(base), std::ops::Bound::Unbounded))
            .next()
            .map(|(key, info)| (*key, info.clone()))
    }

    /// Inserts a new entry.
    pub fn insert(&self, base: Key, info: SegmentInfo) {
        self.entries.write().insert(base, info);
    }

    /// Removes the entry at `base`. Returns true if it existed.
    pub fn erase(&self, base: Key) -> bool {
        self.entries.write().remove(&base).is_some()
    }

    /// Sets the overflow marker of the entry at `base`.
    pub fn set_overflow(&self, base: Key, has_overflow: bool) {
        if let Some(info) = self.entries.write().get_mut(&base) {
            info.set_overflow(has_overflow);
        }
    }

    /// Replaces the index contents with a sorted run of entries.
    pub fn bulk_load(&self, entries: impl IntoIterator<Item = (Key, SegmentInfo)>) {
        let mut map = self.entries.write();
        map.clear();
        map.extend(entries);
    }

    /// Returns the number of live segments.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns true if the index is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Returns a point-in-time copy of all entries, in key order.
    pub fn snapshot(&self) -> Vec<(Key, SegmentInfo)> {
        self.entries
            .read()
            .iter()
            .map(|(base, info)| (*base, info.clone()))
            .collect()
    }
}
