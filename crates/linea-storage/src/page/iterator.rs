//! In-order iteration over a page's records.

use super::Page;

/// Iterates a page's records in ascending key order.
///
/// Construct through [`Page::iter`]; the iterator is positioned at the
/// first record. `key()` materializes the full key (shared prefix plus
/// stored suffix); `value()` borrows the page buffer directly.
pub struct PageIter<'a> {
    page: Page<'a>,
    prefix: &'a [u8],
    idx: usize,
}

impl<'a> PageIter<'a> {
    pub(crate) fn new(page: Page<'a>) -> Self {
        let prefix = if page.is_initialized() {
            page.key_prefix()
        } else {
            &[]
        };
        Self {
            page,
            prefix,
            idx: 0,
        }
    }

    /// Returns true if the iterator points at a record.
    #[inline]
    pub fn valid(&self) -> bool {
        self.idx < self.page.record_count()
    }

    /// Returns the full key at the current position.
    ///
    /// # Panics
    ///
    /// Panics if the iterator is not valid.
    pub fn key(&self) -> Vec<u8> {
        assert!(self.valid());
        let suffix = self.page.entry_suffix(self.idx);
        let mut key = Vec::with_capacity(self.prefix.len() + suffix.len());
        key.extend_from_slice(self.prefix);
        key.extend_from_slice(suffix);
        key
    }

    /// Returns the value at the current position.
    ///
    /// # Panics
    ///
    /// Panics if the iterator is not valid.
    #[inline]
    pub fn value(&self) -> &'a [u8] {
        assert!(self.valid());
        self.page.entry_value(self.idx)
    }

    /// Advances to the next record.
    #[inline]
    pub fn next(&mut self) {
        if self.valid() {
            self.idx += 1;
        }
    }

    /// Positions at the first record.
    #[inline]
    pub fn seek_to_first(&mut self) {
        self.idx = 0;
    }

    /// Positions at the last record. The iterator is invalid afterwards if
    /// the page is empty.
    #[inline]
    pub fn seek_to_last(&mut self) {
        self.idx = self.page.record_count().saturating_sub(1);
    }

    /// Positions at the first record with key >= `target`.
    pub fn seek(&mut self, target: &[u8]) {
        self.idx = match self.page.find_slot(target) {
            Ok(slot) | Err(slot) => slot,
        };
    }

    /// Returns the number of records at or after the current position.
    #[inline]
    pub fn remaining(&self) -> usize {
        self.page.record_count().saturating_sub(self.idx)
    }
}
