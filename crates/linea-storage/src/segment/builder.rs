//! Incremental segment construction.
//!
//! The builder consumes records in ascending key order and emits segments
//! of {1, 2, 4, 8, 16} pages. For a multi-page candidate it fits a line
//! through the window's endpoints and admits the size only if no page
//! induced by that line would exceed the per-page record goal (plus the
//! configured delta) or the physical page capacity; otherwise it falls back
//! to the next smaller size. A single page is always admissible, so every
//! emitted segment satisfies the fill constraint and downstream page loads
//! cannot fail.

use std::collections::VecDeque;

use linea_common::constants::MAX_SEGMENT_PAGE_COUNT;
use linea_common::model::page_for_key;
use linea_common::types::Key;
use linea_common::Line;

use crate::page::{PER_RECORD_METADATA, USABLE_SIZE};

use super::{Record, Segment, SEGMENT_PAGE_COUNTS_DESC};

/// Space reserved on every page for its two fence keys.
const FENCE_RESERVE: usize = 16;

/// Record bytes a page can hold after the header and fences.
const PAGE_CAPACITY: usize = USABLE_SIZE - FENCE_RESERVE;

/// Builds segments from an ordered record stream.
pub struct SegmentBuilder {
    goal: usize,
    delta: usize,
    pending: VecDeque<Record>,
}

impl SegmentBuilder {
    /// Creates a builder targeting `goal` records per page, tolerating an
    /// excess of up to `delta`.
    #[must_use]
    pub fn new(goal: usize, delta: usize) -> Self {
        assert!(goal > 0);
        Self {
            goal,
            delta,
            pending: VecDeque::new(),
        }
    }

    /// Offers the next record. Records must arrive in strictly ascending
    /// key order. Returns the segments completed by this offer, if any.
    pub fn offer(&mut self, record: Record) -> Vec<Segment> {
        debug_assert!(
            self.pending.back().map_or(true, |(key, _)| *key < record.0),
            "records must be offered in ascending key order"
        );
        self.pending.push_back(record);
        if self.pending.len() >= self.goal * MAX_SEGMENT_PAGE_COUNT {
            match self.cut() {
                Some(segment) => vec![segment],
                None => Vec::new(),
            }
        } else {
            Vec::new()
        }
    }

    /// Flushes all pending records into segments.
    pub fn finish(&mut self) -> Vec<Segment> {
        let mut segments = Vec::new();
        while let Some(segment) = self.cut() {
            segments.push(segment);
        }
        segments
    }

    /// Returns the key the next emitted segment will start at, or `None`
    /// when the builder is empty.
    #[must_use]
    pub fn current_base_key(&self) -> Option<Key> {
        self.pending.front().map(|(key, _)| *key)
    }

    /// Convenience for bulk loads: runs a whole sorted dataset through the
    /// builder.
    pub fn build_from_dataset(&mut self, records: impl IntoIterator<Item = Record>) -> Vec<Segment> {
        let mut segments = Vec::new();
        for record in records {
            segments.extend(self.offer(record));
        }
        segments.extend(self.finish());
        segments
    }

    /// Cuts one segment off the front of the pending queue, largest
    /// admissible size first.
    fn cut(&mut self) -> Option<Segment> {
        if self.pending.is_empty() {
            return None;
        }
        for &page_count in SEGMENT_PAGE_COUNTS_DESC {
            if page_count == 1 {
                break;
            }
            let take = self.goal * page_count;
            if self.pending.len() < take {
                continue;
            }
            if let Some(model) = self.fit(take, page_count) {
                return Some(self.take_segment(take, page_count, Some(model)));
            }
        }
        // Single page: no model, bounded by goal and physical capacity.
        let take = self.max_single_page(self.pending.len().min(self.goal));
        Some(self.take_segment(take, 1, None))
    }

    /// Fits a line over the first `take` records for a `page_count`-page
    /// segment, returning it only if every induced page satisfies the fill
    /// constraint.
    fn fit(&mut self, take: usize, page_count: usize) -> Option<Line> {
        let base = self.pending[0].0;
        let last = self.pending[take - 1].0;
        if last <= base {
            return None;
        }
        // Record i sits at position i / goal; anchor the line through the
        // window's endpoints.
        let slope = ((take - 1) as f64 / self.goal as f64) / (last - base) as f64;
        if !slope.is_finite() || slope <= 0.0 || slope > 1.0 {
            return None;
        }
        let model = Line::new(slope, 0.0);

        let mut current_page = 0usize;
        let mut page_records = 0usize;
        let mut page_bytes = 0usize;
        for i in 0..take {
            let (key, value) = &self.pending[i];
            let page = page_for_key(base, &model, page_count, *key);
            if page != current_page {
                current_page = page;
                page_records = 0;
                page_bytes = 0;
            }
            page_records += 1;
            page_bytes += PER_RECORD_METADATA + 8 + value.len();
            if page_records > self.goal + self.delta || page_bytes > PAGE_CAPACITY {
                return None;
            }
        }
        Some(model)
    }

    /// Clamps a single-page record count to the physical page capacity.
    fn max_single_page(&self, take: usize) -> usize {
        let mut bytes = 0usize;
        let mut fitting = 0usize;
        for i in 0..take {
            bytes += PER_RECORD_METADATA + 8 + self.pending[i].1.len();
            if bytes > PAGE_CAPACITY {
                break;
            }
            fitting += 1;
        }
        debug_assert!(fitting > 0, "a single record exceeds page capacity");
        fitting.max(1)
    }

    fn take_segment(&mut self, take: usize, page_count: usize, model: Option<Line>) -> Segment {
        let records: Vec<Record> = self.pending.drain(..take).collect();
        Segment {
            base_key: records[0].0,
            page_count,
            model,
            records,
        }
    }
}

impl std::fmt::Debug for SegmentBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SegmentBuilder")
            .field("goal", &self.goal)
            .field("delta", &self.delta)
            .field("pending", &self.pending.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    const GOAL: usize = 10;
    const DELTA: usize = 2;

    fn record(key: Key) -> Record {
        (key, Bytes::from_static(b"0123456789abcdef"))
    }

    fn check_fill(seg: &Segment) {
        let Some(model) = &seg.model else {
            assert!(seg.records.len() <= GOAL);
            return;
        };
        let mut counts = vec![0usize; seg.page_count];
        for (key, _) in &seg.records {
            counts[page_for_key(seg.base_key, model, seg.page_count, *key)] += 1;
        }
        for count in counts {
            assert!(count <= GOAL + DELTA);
        }
    }

    #[test]
    fn test_uniform_keys_build_max_segments() {
        let mut builder = SegmentBuilder::new(GOAL, DELTA);
        let mut segments = Vec::new();
        for key in 0..(GOAL as u64 * 64) {
            segments.extend(builder.offer(record(key * 10)));
        }
        segments.extend(builder.finish());

        assert!(!segments.is_empty());
        // Evenly spaced keys pack into maximal segments.
        assert_eq!(segments[0].page_count, MAX_SEGMENT_PAGE_COUNT);
        let total: usize = segments.iter().map(|s| s.records.len()).sum();
        assert_eq!(total, GOAL * 64);
        for seg in &segments {
            check_fill(seg);
        }
    }

    #[test]
    fn test_segments_are_contiguous_and_ordered() {
        let mut builder = SegmentBuilder::new(GOAL, DELTA);
        let keys: Vec<Key> = (0..500u64).map(|i| i * i + 7).collect();
        let segments = builder.build_from_dataset(keys.iter().map(|k| record(*k)));

        let mut replayed = Vec::new();
        for seg in &segments {
            assert_eq!(seg.base_key, seg.records[0].0);
            assert!(SEGMENT_PAGE_COUNTS_DESC.contains(&seg.page_count));
            check_fill(seg);
            replayed.extend(seg.records.iter().map(|(key, _)| *key));
        }
        assert_eq!(replayed, keys);
    }

    #[test]
    fn test_skewed_keys_fall_back_to_smaller_segments() {
        // A dense cluster followed by a sparse tail: a single line over the
        // whole window would overload the first pages.
        let mut builder = SegmentBuilder::new(GOAL, DELTA);
        let mut keys: Vec<Key> = (0..(GOAL as u64 * 8)).collect();
        keys.extend((0..(GOAL as u64 * 8)).map(|i| 1_000_000 + i * 50_000));
        let segments = builder.build_from_dataset(keys.iter().map(|k| record(*k)));

        let total: usize = segments.iter().map(|s| s.records.len()).sum();
        assert_eq!(total, keys.len());
        for seg in &segments {
            check_fill(seg);
            assert!(seg.page_count < MAX_SEGMENT_PAGE_COUNT);
        }
    }

    #[test]
    fn test_current_base_key_tracks_pending() {
        let mut builder = SegmentBuilder::new(GOAL, DELTA);
        assert_eq!(builder.current_base_key(), None);
        builder.offer(record(42));
        assert_eq!(builder.current_base_key(), Some(42));
        builder.offer(record(43));
        assert_eq!(builder.current_base_key(), Some(42));
        let segments = builder.finish();
        assert_eq!(segments.len(), 1);
        assert_eq!(builder.current_base_key(), None);
    }

    #[test]
    fn test_finish_drains_everything() {
        let mut builder = SegmentBuilder::new(GOAL, DELTA);
        for key in 0..(GOAL as u64 * 3 + 5) {
            let emitted = builder.offer(record(key * 3));
            assert!(emitted.is_empty());
        }
        let segments = builder.finish();
        let total: usize = segments.iter().map(|s| s.records.len()).sum();
        assert_eq!(total, GOAL * 3 + 5);
        assert_eq!(builder.current_base_key(), None);
    }
}
