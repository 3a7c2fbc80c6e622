//! The ordered in-memory write buffer.
//!
//! The `MemTable` stores recent writes and deletes in an ordered,
//! multi-version structure. Deletes are stored explicitly as tombstones:
//! the key may still exist on disk, and the flush path needs to know to
//! remove it there.
//!
//! Entries are never mutated in place. Every insert is stamped with the
//! next sequence number, and records sharing a key are ordered newest
//! first. That ordering is the sole mechanism behind "latest wins": a seek
//! lands on the most recent record for a key, and the iterator's `next`
//! skips the older versions behind it.
//!
//! `put` and `delete` are intended for a single writer; `get` and
//! iteration are safe to use concurrently with it.

use std::ops::Bound;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use bytes::Bytes;
use crossbeam_skiplist::SkipMap;
use linea_common::types::{EntryType, SequenceNumber};

/// Bookkeeping bytes charged per record on top of key and value payloads.
const RECORD_OVERHEAD: usize = 48;

/// Internal ordering key: user key ascending, then sequence number
/// descending, so the newest record for a key sorts first.
#[derive(Debug, Clone, PartialEq, Eq)]
struct RecordKey {
    user_key: Bytes,
    sequence: SequenceNumber,
}

impl Ord for RecordKey {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.user_key
            .cmp(&other.user_key)
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

impl PartialOrd for RecordKey {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// An ordered in-memory table storing recent writes and deletes.
pub struct MemTable {
    table: SkipMap<RecordKey, Bytes>,
    next_sequence: AtomicU64,
    memory_usage: AtomicUsize,
}

impl MemTable {
    /// Creates an empty write buffer.
    #[must_use]
    pub fn new() -> Self {
        Self {
            table: SkipMap::new(),
            next_sequence: AtomicU64::new(0),
            memory_usage: AtomicUsize::new(0),
        }
    }

    /// Inserts or updates a key-value pair.
    pub fn put(&self, key: Bytes, value: Bytes) {
        self.insert(key, value, EntryType::Write);
    }

    /// Records a tombstone for `key`.
    pub fn delete(&self, key: Bytes) {
        self.insert(key, Bytes::new(), EntryType::Delete);
    }

    fn insert(&self, key: Bytes, value: Bytes, entry_type: EntryType) {
        let counter = self.next_sequence.fetch_add(1, Ordering::SeqCst);
        debug_assert!(counter <= SequenceNumber::MAX_COUNTER);
        let entry_size = key.len() + value.len() + RECORD_OVERHEAD;
        self.table.insert(
            RecordKey {
                user_key: key,
                sequence: SequenceNumber::new(counter, entry_type),
            },
            value,
        );
        self.memory_usage.fetch_add(entry_size, Ordering::Relaxed);
    }

    /// Looks up the latest entry for `key`.
    ///
    /// A tombstone is returned as `Some((EntryType::Delete, empty))`, not
    /// `None` - the caller decides what a delete means for it.
    pub fn get(&self, key: &[u8]) -> Option<(EntryType, Bytes)> {
        let sentinel = RecordKey {
            user_key: Bytes::copy_from_slice(key),
            sequence: SequenceNumber::MAX,
        };
        let entry = self
            .table
            .lower_bound(Bound::Included(&sentinel))
            .filter(|entry| entry.key().user_key.as_ref() == key)?;
        Some((entry.key().sequence.entry_type(), entry.value().clone()))
    }

    /// Returns an iterator positioned before the first entry. One of the
    /// seek methods must be called before reading.
    #[must_use]
    pub fn iter(&self) -> MemTableIter<'_> {
        MemTableIter {
            table: &self.table,
            current: None,
        }
    }

    /// Returns the approximate number of bytes held by the buffer.
    #[must_use]
    pub fn approximate_memory_usage(&self) -> usize {
        self.memory_usage.load(Ordering::Relaxed)
    }

    /// Returns true if no entries have been inserted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

impl Default for MemTable {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MemTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemTable")
            .field("entries", &self.table.len())
            .field("memory_usage", &self.approximate_memory_usage())
            .finish()
    }
}

type Entry<'a> = crossbeam_skiplist::map::Entry<'a, RecordKey, Bytes>;

/// Iterator over the latest entry per key, in ascending key order.
pub struct MemTableIter<'a> {
    table: &'a SkipMap<RecordKey, Bytes>,
    current: Option<Entry<'a>>,
}

impl<'a> MemTableIter<'a> {
    /// Returns true if the iterator points at an entry.
    #[inline]
    pub fn valid(&self) -> bool {
        self.current.is_some()
    }

    /// Returns the key at the current position.
    ///
    /// # Panics
    ///
    /// Panics if the iterator is not valid.
    pub fn key(&self) -> &[u8] {
        &self.current.as_ref().expect("iterator is valid").key().user_key
    }

    /// Returns the value at the current position. Empty for tombstones.
    ///
    /// # Panics
    ///
    /// Panics if the iterator is not valid.
    pub fn value(&self) -> &Bytes {
        self.current.as_ref().expect("iterator is valid").value()
    }

    /// Returns the entry type at the current position.
    ///
    /// # Panics
    ///
    /// Panics if the iterator is not valid.
    pub fn entry_type(&self) -> EntryType {
        self.current
            .as_ref()
            .expect("iterator is valid")
            .key()
            .sequence
            .entry_type()
    }

    /// Positions at the first entry.
    pub fn seek_to_first(&mut self) {
        self.current = self.table.front();
    }

    /// Positions at the latest entry of the first key >= `target`.
    pub fn seek(&mut self, target: &[u8]) {
        // Records with equal keys sort newest first, so seeking with the
        // maximum sequence number lands on the latest entry for `target`.
        let sentinel = RecordKey {
            user_key: Bytes::copy_from_slice(target),
            sequence: SequenceNumber::MAX,
        };
        self.current = self.table.lower_bound(Bound::Included(&sentinel));
    }

    /// Advances past every record sharing the current key, so only the
    /// latest entry per key is yielded.
    ///
    /// # Panics
    ///
    /// Panics if the iterator is not valid.
    pub fn next(&mut self) {
        let current = self.current.take().expect("iterator is valid");
        let last_key = current.key().user_key.clone();
        let mut next = current.next();
        self.current = loop {
            match next {
                // Same key: an older version, skip it.
                Some(entry) if entry.key().user_key == last_key => next = entry.next(),
                other => break other,
            }
        };
    }
}
