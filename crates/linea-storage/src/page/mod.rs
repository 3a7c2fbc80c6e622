//! The on-disk page format.
//!
//! A page is the unit of storage. It holds an ordered set of records whose
//! keys all fall in the page's boundary interval `[lower, upper)`; the
//! common byte prefix of the two boundaries is stripped from every stored
//! key. Records are addressed through a sorted slot array so the page can
//! be searched and iterated in key order.
//!
//! # Page Layout
//!
//! ```text
//! +----------------------+
//! |    Page Header       |  48 bytes: magic, flags, slot count, heap
//! |                      |  pointer, fence lengths, sequence number,
//! |                      |  checksum, overflow id, model line
//! +----------------------+
//! |    Fence Keys        |  lower boundary, then upper boundary
//! +----------------------+
//! |    Slot Array        |  2 bytes per slot, sorted by key, grows down
//! +----------------------+
//! |    Free Space        |
//! +----------------------+
//! |    Record Heap       |  entries grow upward from the end of the page
//! |  [suffix_len u16]    |
//! |  [value_len u16]     |
//! |  [key suffix][value] |
//! +----------------------+
//! ```
//!
//! A zeroed buffer is an invalid page; invalidated pages are recognized by
//! their cleared magic bytes.

mod iterator;

pub use iterator::PageIter;

use linea_common::constants::PAGE_SIZE;
use linea_common::{Line, LineaError, LineaResult};

/// Size of the page header in bytes.
pub const PAGE_HEADER_SIZE: usize = 48;

/// Size of each slot in the slot array.
pub const SLOT_SIZE: usize = 2;

/// Size of the per-record entry header (suffix length, value length).
pub const RECORD_HEADER_SIZE: usize = 4;

/// Bytes of metadata a record costs beyond its key suffix and value.
pub const PER_RECORD_METADATA: usize = SLOT_SIZE + RECORD_HEADER_SIZE;

/// Bytes available for fences, slots, and records.
pub const USABLE_SIZE: usize = PAGE_SIZE - PAGE_HEADER_SIZE;

/// Magic number identifying an initialized page.
const PAGE_MAGIC: u16 = 0x4C50;

/// Flag bit: page 0 of a multi-page segment carries a model line.
const FLAG_HAS_MODEL: u8 = 0b0000_0001;

/// Sentinel stored in the overflow field when no overflow page exists.
const NO_OVERFLOW: u64 = u64::MAX;

/// Offset of the checksum field within the header.
const CHECKSUM_OFFSET: usize = 16;

// Header field offsets.
const OFF_MAGIC: usize = 0;
const OFF_FLAGS: usize = 2;
const OFF_SLOT_COUNT: usize = 4;
const OFF_HEAP_START: usize = 6;
const OFF_LOWER_LEN: usize = 8;
const OFF_UPPER_LEN: usize = 10;
const OFF_SEQUENCE: usize = 12;
const OFF_OVERFLOW: usize = 20;
const OFF_MODEL: usize = 28;

/// Computes the page checksum with the checksum field itself masked out.
pub fn compute_page_checksum(data: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(&data[..CHECKSUM_OFFSET]);
    hasher.update(&data[CHECKSUM_OFFSET + 4..]);
    hasher.finalize()
}

#[inline]
fn read_u16(data: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([data[offset], data[offset + 1]])
}

#[inline]
fn write_u16(data: &mut [u8], offset: usize, value: u16) {
    data[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
}

#[inline]
fn read_u32(data: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes(data[offset..offset + 4].try_into().unwrap())
}

#[inline]
fn read_u64(data: &[u8], offset: usize) -> u64 {
    u64::from_le_bytes(data[offset..offset + 8].try_into().unwrap())
}

/// Compares a full key against a stored record's (prefix, suffix) pair
/// without materializing the stored key.
fn compare_key(key: &[u8], prefix: &[u8], suffix: &[u8]) -> std::cmp::Ordering {
    let split = key.len().min(prefix.len());
    match key[..split].cmp(&prefix[..split]) {
        std::cmp::Ordering::Equal => key[split..].cmp(suffix),
        other => other,
    }
}

/// Read-only view of a page.
#[derive(Clone, Copy)]
pub struct Page<'a> {
    data: &'a [u8],
}

impl<'a> Page<'a> {
    /// Creates a read-only view over a page buffer.
    ///
    /// # Panics
    ///
    /// Panics if the buffer is not exactly `PAGE_SIZE` bytes.
    #[inline]
    pub fn new(data: &'a [u8]) -> Self {
        assert_eq!(data.len(), PAGE_SIZE, "page buffer must be PAGE_SIZE bytes");
        Self { data }
    }

    /// Returns the raw page bytes.
    #[inline]
    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    /// Returns true if the buffer holds an initialized page. Invalidated
    /// pages are zeroed and fail this check.
    #[inline]
    pub fn is_initialized(&self) -> bool {
        read_u16(self.data, OFF_MAGIC) == PAGE_MAGIC
    }

    /// Returns the number of records on the page.
    #[inline]
    pub fn record_count(&self) -> usize {
        read_u16(self.data, OFF_SLOT_COUNT) as usize
    }

    /// Returns the lower boundary fence key (smallest admissible key).
    pub fn lower_boundary(&self) -> &'a [u8] {
        let len = read_u16(self.data, OFF_LOWER_LEN) as usize;
        &self.data[PAGE_HEADER_SIZE..PAGE_HEADER_SIZE + len]
    }

    /// Returns the upper boundary fence key (smallest key belonging to the
    /// next page). Empty when the page is unbounded above.
    pub fn upper_boundary(&self) -> &'a [u8] {
        let lower_len = read_u16(self.data, OFF_LOWER_LEN) as usize;
        let upper_len = read_u16(self.data, OFF_UPPER_LEN) as usize;
        &self.data[PAGE_HEADER_SIZE + lower_len..PAGE_HEADER_SIZE + lower_len + upper_len]
    }

    /// Returns the byte prefix shared by every key on the page.
    pub fn key_prefix(&self) -> &'a [u8] {
        let lower = self.lower_boundary();
        let upper = self.upper_boundary();
        let len = lower
            .iter()
            .zip(upper.iter())
            .take_while(|(a, b)| a == b)
            .count();
        &lower[..len]
    }

    /// Returns the overflow page referenced by this page, if any.
    pub fn overflow_id(&self) -> Option<u64> {
        if !self.is_initialized() {
            return None;
        }
        match read_u64(self.data, OFF_OVERFLOW) {
            NO_OVERFLOW => None,
            id => Some(id),
        }
    }

    /// Returns the model line stored on the page, if any.
    pub fn model(&self) -> Option<Line> {
        if self.data[OFF_FLAGS] & FLAG_HAS_MODEL == 0 {
            return None;
        }
        Some(Line::decode(&self.data[OFF_MODEL..OFF_MODEL + Line::ENCODED_SIZE]))
    }

    /// Returns the segment-level sequence number stamped on the page.
    #[inline]
    pub fn sequence_number(&self) -> u32 {
        read_u32(self.data, OFF_SEQUENCE)
    }

    /// Returns the stored checksum.
    #[inline]
    pub fn checksum(&self) -> u32 {
        read_u32(self.data, CHECKSUM_OFFSET)
    }

    /// Verifies the stored checksum against the page contents.
    pub fn verify_checksum(&self) -> bool {
        self.checksum() == compute_page_checksum(self.data)
    }

    /// Returns the free space remaining on the page.
    pub fn free_space(&self) -> usize {
        let heap_start = read_u16(self.data, OFF_HEAP_START) as usize;
        let slots_end = self.slots_start() + self.record_count() * SLOT_SIZE;
        heap_start.saturating_sub(slots_end)
    }

    /// Looks up a key and returns its value.
    pub fn get(&self, key: &[u8]) -> Option<&'a [u8]> {
        let slot = self.find_slot(key).ok()?;
        Some(self.entry_value(slot))
    }

    /// Returns an iterator over the page's records in ascending key order.
    pub fn iter(&self) -> PageIter<'a> {
        PageIter::new(*self)
    }

    #[inline]
    fn slots_start(&self) -> usize {
        let lower_len = read_u16(self.data, OFF_LOWER_LEN) as usize;
        let upper_len = read_u16(self.data, OFF_UPPER_LEN) as usize;
        PAGE_HEADER_SIZE + lower_len + upper_len
    }

    /// Returns the heap offset of the entry addressed by slot `idx`.
    pub(crate) fn entry_offset(&self, idx: usize) -> usize {
        read_u16(self.data, self.slots_start() + idx * SLOT_SIZE) as usize
    }

    /// Returns the stored key suffix of slot `idx`.
    pub(crate) fn entry_suffix(&self, idx: usize) -> &'a [u8] {
        let offset = self.entry_offset(idx);
        let suffix_len = read_u16(self.data, offset) as usize;
        &self.data[offset + RECORD_HEADER_SIZE..offset + RECORD_HEADER_SIZE + suffix_len]
    }

    /// Returns the value of slot `idx`.
    pub(crate) fn entry_value(&self, idx: usize) -> &'a [u8] {
        let offset = self.entry_offset(idx);
        let suffix_len = read_u16(self.data, offset) as usize;
        let value_len = read_u16(self.data, offset + 2) as usize;
        let value_start = offset + RECORD_HEADER_SIZE + suffix_len;
        &self.data[value_start..value_start + value_len]
    }

    /// Binary-searches the slot array for `key`. Returns `Ok(slot)` when the
    /// key exists and `Err(insertion_point)` otherwise.
    pub(crate) fn find_slot(&self, key: &[u8]) -> Result<usize, usize> {
        let prefix = self.key_prefix();
        let mut lo = 0;
        let mut hi = self.record_count();
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            match compare_key(key, prefix, self.entry_suffix(mid)) {
                std::cmp::Ordering::Equal => return Ok(mid),
                std::cmp::Ordering::Greater => lo = mid + 1,
                std::cmp::Ordering::Less => hi = mid,
            }
        }
        Err(lo)
    }
}

impl std::fmt::Debug for Page<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Page")
            .field("initialized", &self.is_initialized())
            .field("record_count", &self.record_count())
            .field("overflow", &self.overflow_id())
            .finish()
    }
}

/// Mutable view of a page.
pub struct PageMut<'a> {
    data: &'a mut [u8],
}

impl<'a> PageMut<'a> {
    /// Creates a mutable view over a page buffer.
    ///
    /// # Panics
    ///
    /// Panics if the buffer is not exactly `PAGE_SIZE` bytes.
    #[inline]
    pub fn new(data: &'a mut [u8]) -> Self {
        assert_eq!(data.len(), PAGE_SIZE, "page buffer must be PAGE_SIZE bytes");
        Self { data }
    }

    /// Returns a read-only view of this page.
    #[inline]
    pub fn as_page(&self) -> Page<'_> {
        Page::new(self.data)
    }

    /// Initializes an empty page whose keys will satisfy
    /// `lower <= key < upper`. An empty `upper` means unbounded above.
    pub fn initialize(&mut self, lower: &[u8], upper: &[u8]) {
        self.data.fill(0);
        write_u16(self.data, OFF_MAGIC, PAGE_MAGIC);
        write_u16(self.data, OFF_LOWER_LEN, lower.len() as u16);
        write_u16(self.data, OFF_UPPER_LEN, upper.len() as u16);
        write_u16(self.data, OFF_HEAP_START, PAGE_SIZE as u16);
        self.data[OFF_OVERFLOW..OFF_OVERFLOW + 8].copy_from_slice(&NO_OVERFLOW.to_le_bytes());
        let fences = PAGE_HEADER_SIZE;
        self.data[fences..fences + lower.len()].copy_from_slice(lower);
        self.data[fences + lower.len()..fences + lower.len() + upper.len()].copy_from_slice(upper);
    }

    /// Inserts a record, or updates it if the key already exists.
    ///
    /// Returns [`LineaError::PageFull`] when the page cannot hold the
    /// record.
    pub fn put(&mut self, key: &[u8], value: &[u8]) -> LineaResult<()> {
        let (slot, existing) = {
            let page = self.as_page();
            debug_assert!(
                key.starts_with(page.key_prefix()),
                "key does not share the page prefix"
            );
            match page.find_slot(key) {
                Ok(slot) => (slot, true),
                Err(slot) => (slot, false),
            }
        };

        if existing {
            if self.try_update_in_place(slot, value) {
                return Ok(());
            }
            // The new value is larger than the old entry. Retire the slot
            // and re-insert; the old heap space is reclaimed at the next
            // rebuild of this page.
            self.remove_slot(slot);
        }
        self.insert_at(slot, key, value)
    }

    /// Updates a record in place when it exists and the new value fits;
    /// removes it otherwise so a later page in the chain can take the
    /// write. Returns true if the record was updated here.
    pub fn update_or_remove(&mut self, key: &[u8], value: &[u8]) -> bool {
        let slot = match self.as_page().find_slot(key) {
            Ok(slot) => slot,
            Err(_) => return false,
        };
        if self.try_update_in_place(slot, value) {
            return true;
        }
        self.remove_slot(slot);
        false
    }

    /// Removes a record. Returns true if the key was present.
    pub fn delete(&mut self, key: &[u8]) -> bool {
        match self.as_page().find_slot(key) {
            Ok(slot) => {
                self.remove_slot(slot);
                true
            }
            Err(_) => false,
        }
    }

    /// Points this page at an overflow page.
    pub fn set_overflow(&mut self, id: u64) {
        debug_assert_ne!(id, NO_OVERFLOW);
        self.data[OFF_OVERFLOW..OFF_OVERFLOW + 8].copy_from_slice(&id.to_le_bytes());
    }

    /// Clears the overflow reference.
    pub fn clear_overflow(&mut self) {
        self.data[OFF_OVERFLOW..OFF_OVERFLOW + 8].copy_from_slice(&NO_OVERFLOW.to_le_bytes());
    }

    /// Writes the model line into the page header.
    pub fn set_model(&mut self, model: &Line) {
        self.data[OFF_FLAGS] |= FLAG_HAS_MODEL;
        model.encode(&mut self.data[OFF_MODEL..OFF_MODEL + Line::ENCODED_SIZE]);
    }

    /// Stamps the segment-level sequence number.
    pub fn set_sequence_number(&mut self, sequence: u32) {
        self.data[OFF_SEQUENCE..OFF_SEQUENCE + 4].copy_from_slice(&sequence.to_le_bytes());
    }

    /// Computes and stores the page checksum. Call after all other
    /// modifications are complete.
    pub fn update_checksum(&mut self) {
        let checksum = compute_page_checksum(self.data);
        self.data[CHECKSUM_OFFSET..CHECKSUM_OFFSET + 4].copy_from_slice(&checksum.to_le_bytes());
    }

    /// Overwrites the value of `slot` in place when the new value fits in
    /// the existing entry.
    fn try_update_in_place(&mut self, slot: usize, value: &[u8]) -> bool {
        let (offset, suffix_len, value_len) = {
            let page = self.as_page();
            let offset = page.entry_offset(slot);
            (
                offset,
                read_u16(self.data, offset) as usize,
                read_u16(self.data, offset + 2) as usize,
            )
        };
        if value.len() > value_len {
            return false;
        }
        let value_start = offset + RECORD_HEADER_SIZE + suffix_len;
        self.data[value_start..value_start + value.len()].copy_from_slice(value);
        write_u16(self.data, offset + 2, value.len() as u16);
        true
    }

    /// Removes the slot at `slot`, shifting later slots down. Heap space is
    /// not reclaimed.
    fn remove_slot(&mut self, slot: usize) {
        let count = self.as_page().record_count();
        let slots_start = self.as_page().slots_start();
        let from = slots_start + (slot + 1) * SLOT_SIZE;
        let to = slots_start + count * SLOT_SIZE;
        self.data.copy_within(from..to, slots_start + slot * SLOT_SIZE);
        write_u16(self.data, OFF_SLOT_COUNT, (count - 1) as u16);
    }

    /// Inserts a fresh entry for `key` at slot position `slot`.
    fn insert_at(&mut self, slot: usize, key: &[u8], value: &[u8]) -> LineaResult<()> {
        let (prefix_len, count, slots_start, heap_start, free) = {
            let page = self.as_page();
            (
                page.key_prefix().len(),
                page.record_count(),
                page.slots_start(),
                read_u16(self.data, OFF_HEAP_START) as usize,
                page.free_space(),
            )
        };
        let suffix = &key[prefix_len..];
        let entry_size = RECORD_HEADER_SIZE + suffix.len() + value.len();
        if free < entry_size + SLOT_SIZE {
            return Err(LineaError::PageFull {
                record_size: entry_size,
                free_space: free,
            });
        }

        // Write the entry at the new top of the heap.
        let offset = heap_start - entry_size;
        write_u16(self.data, offset, suffix.len() as u16);
        write_u16(self.data, offset + 2, value.len() as u16);
        self.data[offset + RECORD_HEADER_SIZE..offset + RECORD_HEADER_SIZE + suffix.len()]
            .copy_from_slice(suffix);
        self.data[offset + RECORD_HEADER_SIZE + suffix.len()..offset + entry_size]
            .copy_from_slice(value);
        write_u16(self.data, OFF_HEAP_START, offset as u16);

        // Open a gap in the slot array and point it at the entry.
        let from = slots_start + slot * SLOT_SIZE;
        let to = slots_start + count * SLOT_SIZE;
        self.data.copy_within(from..to, from + SLOT_SIZE);
        write_u16(self.data, from, offset as u16);
        write_u16(self.data, OFF_SLOT_COUNT, (count + 1) as u16);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use linea_common::types::key_to_bytes;

    fn test_page_buf() -> Vec<u8> {
        vec![0u8; PAGE_SIZE]
    }

    #[test]
    fn test_zeroed_buffer_is_uninitialized() {
        let buf = test_page_buf();
        let page = Page::new(&buf);
        assert!(!page.is_initialized());
        assert_eq!(page.overflow_id(), None);
        assert_eq!(page.record_count(), 0);
    }

    #[test]
    fn test_initialize_and_boundaries() {
        let mut buf = test_page_buf();
        let lower = key_to_bytes(100);
        let upper = key_to_bytes(200);
        PageMut::new(&mut buf).initialize(&lower, &upper);

        let page = Page::new(&buf);
        assert!(page.is_initialized());
        assert_eq!(page.lower_boundary(), &lower);
        assert_eq!(page.upper_boundary(), &upper);
        // 100 and 199 share the first seven big-endian bytes.
        assert_eq!(page.key_prefix().len(), 7);
        assert_eq!(page.overflow_id(), None);
        assert_eq!(page.model(), None);
    }

    #[test]
    fn test_put_get_sorted_iteration() {
        let mut buf = test_page_buf();
        let mut page = PageMut::new(&mut buf);
        page.initialize(&key_to_bytes(0), &key_to_bytes(1000));

        // Insert out of order.
        for key in [42u64, 7, 999, 100, 0] {
            page.put(&key_to_bytes(key), format!("v{key}").as_bytes())
                .unwrap();
        }

        let view = Page::new(&buf);
        assert_eq!(view.record_count(), 5);
        assert_eq!(view.get(&key_to_bytes(42)), Some(&b"v42"[..]));
        assert_eq!(view.get(&key_to_bytes(1)), None);

        let mut it = view.iter();
        let mut keys = Vec::new();
        while it.valid() {
            keys.push(it.key());
            it.next();
        }
        let expected: Vec<Vec<u8>> = [0u64, 7, 42, 100, 999]
            .iter()
            .map(|k| key_to_bytes(*k).to_vec())
            .collect();
        assert_eq!(keys, expected);
    }

    #[test]
    fn test_put_overwrites_existing_key() {
        let mut buf = test_page_buf();
        let mut page = PageMut::new(&mut buf);
        page.initialize(&key_to_bytes(0), &key_to_bytes(100));

        page.put(&key_to_bytes(5), b"first").unwrap();
        page.put(&key_to_bytes(5), b"2nd").unwrap();
        assert_eq!(Page::new(&buf).get(&key_to_bytes(5)), Some(&b"2nd"[..]));

        let mut page = PageMut::new(&mut buf);
        page.put(&key_to_bytes(5), b"a-much-longer-value").unwrap();
        let view = Page::new(&buf);
        assert_eq!(view.get(&key_to_bytes(5)), Some(&b"a-much-longer-value"[..]));
        assert_eq!(view.record_count(), 1);
    }

    #[test]
    fn test_page_full() {
        let mut buf = test_page_buf();
        let mut page = PageMut::new(&mut buf);
        page.initialize(&key_to_bytes(0), &[]);

        let value = vec![0xABu8; 256];
        let mut inserted = 0u64;
        loop {
            match page.put(&key_to_bytes(inserted), &value) {
                Ok(()) => inserted += 1,
                Err(LineaError::PageFull { .. }) => break,
                Err(other) => panic!("unexpected error: {other}"),
            }
        }
        assert!(inserted > 10);
        // Existing records are untouched.
        assert_eq!(Page::new(&buf).record_count() as u64, inserted);
    }

    #[test]
    fn test_delete() {
        let mut buf = test_page_buf();
        let mut page = PageMut::new(&mut buf);
        page.initialize(&key_to_bytes(0), &key_to_bytes(100));
        page.put(&key_to_bytes(1), b"a").unwrap();
        page.put(&key_to_bytes(2), b"b").unwrap();

        assert!(page.delete(&key_to_bytes(1)));
        assert!(!page.delete(&key_to_bytes(1)));

        let view = Page::new(&buf);
        assert_eq!(view.record_count(), 1);
        assert_eq!(view.get(&key_to_bytes(1)), None);
        assert_eq!(view.get(&key_to_bytes(2)), Some(&b"b"[..]));
    }

    #[test]
    fn test_update_or_remove() {
        let mut buf = test_page_buf();
        let mut page = PageMut::new(&mut buf);
        page.initialize(&key_to_bytes(0), &key_to_bytes(100));
        page.put(&key_to_bytes(1), b"value").unwrap();

        // Fits in place.
        assert!(page.update_or_remove(&key_to_bytes(1), b"new"));
        assert_eq!(Page::new(&buf).get(&key_to_bytes(1)), Some(&b"new"[..]));

        // Larger value: record is removed so the write can move on.
        let mut page = PageMut::new(&mut buf);
        assert!(!page.update_or_remove(&key_to_bytes(1), b"something larger"));
        assert_eq!(Page::new(&buf).get(&key_to_bytes(1)), None);

        // Absent key.
        let mut page = PageMut::new(&mut buf);
        assert!(!page.update_or_remove(&key_to_bytes(50), b"x"));
    }

    #[test]
    fn test_overflow_round_trip() {
        let mut buf = test_page_buf();
        let mut page = PageMut::new(&mut buf);
        page.initialize(&key_to_bytes(0), &key_to_bytes(100));
        assert_eq!(page.as_page().overflow_id(), None);

        page.set_overflow(77);
        assert_eq!(Page::new(&buf).overflow_id(), Some(77));

        let mut page = PageMut::new(&mut buf);
        page.clear_overflow();
        assert_eq!(Page::new(&buf).overflow_id(), None);
    }

    #[test]
    fn test_model_round_trip() {
        let mut buf = test_page_buf();
        let mut page = PageMut::new(&mut buf);
        page.initialize(&key_to_bytes(0), &key_to_bytes(100));

        let line = Line::new(0.01, 0.5);
        page.set_model(&line);
        assert_eq!(Page::new(&buf).model(), Some(line));
    }

    #[test]
    fn test_checksum() {
        let mut buf = test_page_buf();
        let mut page = PageMut::new(&mut buf);
        page.initialize(&key_to_bytes(0), &key_to_bytes(100));
        page.put(&key_to_bytes(3), b"abc").unwrap();
        page.set_sequence_number(9);
        page.update_checksum();

        let view = Page::new(&buf);
        assert_ne!(view.checksum(), 0);
        assert!(view.verify_checksum());
        assert_eq!(view.sequence_number(), 9);

        buf[PAGE_SIZE - 1] ^= 0xFF;
        assert!(!Page::new(&buf).verify_checksum());
    }

    #[test]
    fn test_unbounded_upper_disables_prefix() {
        let mut buf = test_page_buf();
        let mut page = PageMut::new(&mut buf);
        page.initialize(&key_to_bytes(500), &[]);
        assert!(page.as_page().key_prefix().is_empty());
        page.put(&key_to_bytes(501), b"x").unwrap();
        assert_eq!(Page::new(&buf).get(&key_to_bytes(501)), Some(&b"x"[..]));
    }
}
