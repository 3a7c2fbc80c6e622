//! Per-segment adapter over a contiguous run of page buffers.
//!
//! A `SegmentWrap` exposes segment-level metadata (sequence number,
//! checksums, overflow bitmap) over pages held in one flat buffer, the form
//! segments take right before being written to or after being read from
//! disk.

use linea_common::constants::PAGE_SIZE;
use linea_common::SegmentId;

use crate::page::{Page, PageMut};

/// Adapter over `page_count` consecutive pages in a single buffer.
pub struct SegmentWrap<'a> {
    data: &'a mut [u8],
    page_count: usize,
}

impl<'a> SegmentWrap<'a> {
    /// Wraps a buffer holding exactly `page_count` pages.
    ///
    /// # Panics
    ///
    /// Panics if the buffer size does not match.
    #[must_use]
    pub fn new(data: &'a mut [u8], page_count: usize) -> Self {
        assert_eq!(data.len(), page_count * PAGE_SIZE);
        Self { data, page_count }
    }

    /// Returns the number of pages in the segment.
    #[inline]
    #[must_use]
    pub fn page_count(&self) -> usize {
        self.page_count
    }

    /// Calls `f` for every page in order.
    pub fn for_each_page(&self, mut f: impl FnMut(usize, Page<'_>)) {
        for idx in 0..self.page_count {
            f(idx, Page::new(&self.data[idx * PAGE_SIZE..(idx + 1) * PAGE_SIZE]));
        }
    }

    /// Returns the number of pages carrying an overflow reference.
    #[must_use]
    pub fn num_overflows(&self) -> usize {
        let mut count = 0;
        self.for_each_page(|_, page| {
            if page.overflow_id().is_some() {
                count += 1;
            }
        });
        count
    }

    /// Returns the overflow IDs referenced by the segment's pages, paired
    /// with the index of the referencing page.
    #[must_use]
    pub fn overflows(&self) -> Vec<(usize, SegmentId)> {
        let mut overflows = Vec::new();
        self.for_each_page(|idx, page| {
            if let Some(raw) = page.overflow_id() {
                overflows.push((idx, SegmentId::from_u64(raw)));
            }
        });
        overflows
    }

    /// Stamps the sequence number on every page.
    pub fn set_sequence_number(&mut self, sequence: u32) {
        for idx in 0..self.page_count {
            self.page_mut(idx).set_sequence_number(sequence);
        }
    }

    /// Returns the segment's sequence number (stored on every page).
    #[must_use]
    pub fn sequence_number(&self) -> u32 {
        Page::new(&self.data[..PAGE_SIZE]).sequence_number()
    }

    /// Clears the overflow reference of every page.
    pub fn clear_all_overflows(&mut self) {
        for idx in 0..self.page_count {
            self.page_mut(idx).clear_overflow();
        }
    }

    /// Computes and stores every page's checksum. Call last, after all
    /// other mutations.
    pub fn compute_and_set_checksum(&mut self) {
        for idx in 0..self.page_count {
            self.page_mut(idx).update_checksum();
        }
    }

    fn page_mut(&mut self, idx: usize) -> PageMut<'_> {
        PageMut::new(&mut self.data[idx * PAGE_SIZE..(idx + 1) * PAGE_SIZE])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use linea_common::types::key_to_bytes;

    fn segment_buf(page_count: usize) -> Vec<u8> {
        let mut buf = vec![0u8; page_count * PAGE_SIZE];
        for idx in 0..page_count {
            let lower = key_to_bytes(idx as u64 * 100);
            let upper = key_to_bytes((idx as u64 + 1) * 100);
            PageMut::new(&mut buf[idx * PAGE_SIZE..(idx + 1) * PAGE_SIZE])
                .initialize(&lower, &upper);
        }
        buf
    }

    #[test]
    fn test_sequence_number_on_all_pages() {
        let mut buf = segment_buf(4);
        let mut wrap = SegmentWrap::new(&mut buf, 4);
        wrap.set_sequence_number(17);
        assert_eq!(wrap.sequence_number(), 17);
        wrap.for_each_page(|_, page| assert_eq!(page.sequence_number(), 17));
    }

    #[test]
    fn test_overflow_bitmap() {
        let mut buf = segment_buf(4);
        let ov = SegmentId::new(0, 9);
        PageMut::new(&mut buf[PAGE_SIZE..2 * PAGE_SIZE]).set_overflow(ov.as_u64());

        let mut wrap = SegmentWrap::new(&mut buf, 4);
        assert_eq!(wrap.num_overflows(), 1);
        assert_eq!(wrap.overflows(), vec![(1, ov)]);

        wrap.clear_all_overflows();
        assert_eq!(wrap.num_overflows(), 0);
    }

    #[test]
    fn test_checksums() {
        let mut buf = segment_buf(2);
        let mut wrap = SegmentWrap::new(&mut buf, 2);
        wrap.set_sequence_number(1);
        wrap.compute_and_set_checksum();
        wrap.for_each_page(|_, page| {
            assert!(page.verify_checksum());
            assert_ne!(page.checksum(), 0);
        });
    }
}
