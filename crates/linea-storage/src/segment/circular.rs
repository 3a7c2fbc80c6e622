//! Fixed-capacity ring allocator of page-sized slots.
//!
//! The rewrite path loads pages into this buffer and frees them strictly
//! in allocation order once their records have been written back out, so a
//! ring over a flat allocation suffices.

use linea_common::constants::PAGE_SIZE;

/// A ring of page-sized memory slots, freed in FIFO order.
pub struct CircularPageBuffer {
    slots: Vec<Box<[u8]>>,
    head: usize,
    allocated: usize,
}

impl CircularPageBuffer {
    /// Creates a buffer with `capacity` page slots.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0);
        Self {
            slots: (0..capacity)
                .map(|_| vec![0u8; PAGE_SIZE].into_boxed_slice())
                .collect(),
            head: 0,
            allocated: 0,
        }
    }

    /// Allocates the next slot and returns its index, or `None` when the
    /// buffer is full.
    pub fn allocate(&mut self) -> Option<usize> {
        if self.allocated == self.slots.len() {
            return None;
        }
        let slot = (self.head + self.allocated) % self.slots.len();
        self.allocated += 1;
        Some(slot)
    }

    /// Frees the oldest outstanding slot.
    ///
    /// # Panics
    ///
    /// Panics if no slot is allocated.
    pub fn free(&mut self) {
        assert!(self.allocated > 0, "free on an empty ring");
        self.head = (self.head + 1) % self.slots.len();
        self.allocated -= 1;
    }

    /// Returns the number of unallocated slots.
    #[inline]
    #[must_use]
    pub fn num_free_pages(&self) -> usize {
        self.slots.len() - self.allocated
    }

    /// Returns the total slot capacity.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Returns the page bytes of `slot`.
    #[inline]
    #[must_use]
    pub fn page(&self, slot: usize) -> &[u8] {
        &self.slots[slot]
    }

    /// Returns the mutable page bytes of `slot`.
    #[inline]
    pub fn page_mut(&mut self, slot: usize) -> &mut [u8] {
        &mut self.slots[slot]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocate_until_full() {
        let mut buf = CircularPageBuffer::new(3);
        assert_eq!(buf.num_free_pages(), 3);
        assert_eq!(buf.allocate(), Some(0));
        assert_eq!(buf.allocate(), Some(1));
        assert_eq!(buf.allocate(), Some(2));
        assert_eq!(buf.num_free_pages(), 0);
        assert_eq!(buf.allocate(), None);
    }

    #[test]
    fn test_fifo_reuse() {
        let mut buf = CircularPageBuffer::new(2);
        assert_eq!(buf.allocate(), Some(0));
        assert_eq!(buf.allocate(), Some(1));
        // Freeing releases slot 0 first; the next allocation wraps to it.
        buf.free();
        assert_eq!(buf.num_free_pages(), 1);
        assert_eq!(buf.allocate(), Some(0));
        buf.free();
        assert_eq!(buf.allocate(), Some(1));
    }

    #[test]
    fn test_slot_contents_survive_other_allocations() {
        let mut buf = CircularPageBuffer::new(2);
        let a = buf.allocate().unwrap();
        buf.page_mut(a)[0] = 0xAA;
        let b = buf.allocate().unwrap();
        buf.page_mut(b)[0] = 0xBB;
        assert_eq!(buf.page(a)[0], 0xAA);
        assert_eq!(buf.page(b)[0], 0xBB);
    }

    #[test]
    #[should_panic(expected = "free on an empty ring")]
    fn test_free_empty_panics() {
        let mut buf = CircularPageBuffer::new(1);
        buf.free();
    }
}
