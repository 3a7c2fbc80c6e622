//! Merge iterators driving the reorganization paths.
//!
//! [`PageMergeIterator`] performs a k-way ordered merge over a set of page
//! iterators using a min-heap, giving O(log k) advancement. Within a single
//! overflow chain the inputs are disjoint per key, so cross-input ties do
//! not arise there; when they do, the lower source index wins.
//!
//! [`PagePlusRecordMerger`] layers a sorted in-memory record batch on top
//! of the page stream. On key collision the in-memory record supersedes the
//! on-disk one (it is a newer write) and both sides advance.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, VecDeque};

use bytes::Bytes;
use linea_common::types::{extract_head64, Key};

use crate::page::PageIter;

/// A record drawn from a page, keyed by its full key bytes.
struct HeapEntry<'a> {
    key: Vec<u8>,
    value: &'a [u8],
    source: usize,
}

impl PartialEq for HeapEntry<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key && self.source == other.source
    }
}

impl Eq for HeapEntry<'_> {}

impl PartialOrd for HeapEntry<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapEntry<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed so the BinaryHeap max-heap behaves as a min-heap; ties
        // resolve toward the lower source index.
        match self.key.cmp(&other.key) {
            Ordering::Equal => other.source.cmp(&self.source),
            ordering => ordering.reverse(),
        }
    }
}

/// K-way ordered merge over a fixed set of page iterators.
///
/// The iterator is positioned at the first record immediately after
/// construction.
pub struct PageMergeIterator<'a> {
    sources: Vec<PageIter<'a>>,
    heap: BinaryHeap<HeapEntry<'a>>,
    current: Option<HeapEntry<'a>>,
}

impl<'a> PageMergeIterator<'a> {
    /// Builds a merge iterator over the given page iterators.
    #[must_use]
    pub fn new(mut sources: Vec<PageIter<'a>>) -> Self {
        let mut heap = BinaryHeap::with_capacity(sources.len());
        for (source, it) in sources.iter_mut().enumerate() {
            if it.valid() {
                heap.push(HeapEntry {
                    key: it.key(),
                    value: it.value(),
                    source,
                });
                it.next();
            }
        }
        let mut merged = Self {
            sources,
            heap,
            current: None,
        };
        merged.advance();
        merged
    }

    /// Returns true if the iterator points at a record.
    #[inline]
    #[must_use]
    pub fn valid(&self) -> bool {
        self.current.is_some()
    }

    /// Returns the key at the current position.
    ///
    /// # Panics
    ///
    /// Panics if the iterator is not valid.
    #[must_use]
    pub fn key(&self) -> &[u8] {
        &self.current.as_ref().expect("iterator is valid").key
    }

    /// Returns the value at the current position.
    ///
    /// # Panics
    ///
    /// Panics if the iterator is not valid.
    #[must_use]
    pub fn value(&self) -> &'a [u8] {
        self.current.as_ref().expect("iterator is valid").value
    }

    /// Advances to the next record in ascending key order.
    pub fn next(&mut self) {
        self.advance();
    }

    /// Positions at the record with the globally largest key. Subsequent
    /// `next` calls invalidate the iterator.
    pub fn seek_to_last(&mut self) {
        self.heap.clear();
        let mut last: Option<HeapEntry<'a>> = None;
        for (source, it) in self.sources.iter_mut().enumerate() {
            it.seek_to_last();
            if it.valid() {
                let candidate = HeapEntry {
                    key: it.key(),
                    value: it.value(),
                    source,
                };
                if last
                    .as_ref()
                    .map_or(true, |best| candidate.key > best.key)
                {
                    last = Some(candidate);
                }
                it.next();
            }
        }
        self.current = last;
    }

    /// Returns the number of records at or after the current position.
    #[must_use]
    pub fn records_left(&self) -> usize {
        usize::from(self.current.is_some())
            + self.heap.len()
            + self.sources.iter().map(PageIter::remaining).sum::<usize>()
    }

    fn advance(&mut self) {
        self.current = self.heap.pop();
        if let Some(entry) = &self.current {
            let it = &mut self.sources[entry.source];
            if it.valid() {
                let refill = HeapEntry {
                    key: it.key(),
                    value: it.value(),
                    source: entry.source,
                };
                it.next();
                self.heap.push(refill);
            }
        }
    }
}

/// Two-way merge of page records and a sorted in-memory record batch.
///
/// The page side is fed in chunks: `update_page_iterator` points the merger
/// at the next chain while the in-memory cursor keeps its position, which
/// is what lets a single merger span successive page chains during a
/// rewrite.
pub struct PagePlusRecordMerger<'a> {
    page_records: VecDeque<(Key, Bytes)>,
    records: &'a [(Key, Bytes)],
    pos: usize,
}

impl<'a> PagePlusRecordMerger<'a> {
    /// Creates a merger over a sorted in-memory batch. The page side starts
    /// empty.
    #[must_use]
    pub fn new(records: &'a [(Key, Bytes)]) -> Self {
        debug_assert!(records.windows(2).all(|w| w[0].0 < w[1].0));
        Self {
            page_records: VecDeque::new(),
            records,
            pos: 0,
        }
    }

    /// Replaces the page-record source with the records remaining in `pmi`.
    ///
    /// The previous page source must be exhausted.
    pub fn update_page_iterator(&mut self, mut pmi: PageMergeIterator<'_>) {
        debug_assert!(self.page_records.is_empty());
        self.page_records.reserve(pmi.records_left());
        while pmi.valid() {
            let key = extract_head64(pmi.key());
            self.page_records
                .push_back((key, Bytes::copy_from_slice(pmi.value())));
            pmi.next();
        }
    }

    /// Returns true while records from the current page source remain.
    #[inline]
    #[must_use]
    pub fn has_page_records(&self) -> bool {
        !self.page_records.is_empty()
    }

    /// Returns true while any record remains on either side.
    #[inline]
    #[must_use]
    pub fn has_records(&self) -> bool {
        self.has_page_records() || self.pos < self.records.len()
    }

    /// Returns the next record in ascending key order, preferring the
    /// in-memory record on key collision.
    ///
    /// # Panics
    ///
    /// Panics if no records remain.
    pub fn get_next(&mut self) -> (Key, Bytes) {
        assert!(self.has_records());
        let page_key = self.page_records.front().map(|(key, _)| *key);
        let mem_key = self.records.get(self.pos).map(|(key, _)| *key);
        match (page_key, mem_key) {
            (None, Some(_)) => {
                let record = self.records[self.pos].clone();
                self.pos += 1;
                record
            }
            (Some(_), None) => self.page_records.pop_front().expect("front exists"),
            (Some(pk), Some(mk)) => {
                if mk <= pk {
                    if mk == pk {
                        // The disk record is superseded; drop it.
                        self.page_records.pop_front();
                    }
                    let record = self.records[self.pos].clone();
                    self.pos += 1;
                    record
                } else {
                    self.page_records.pop_front().expect("front exists")
                }
            }
            (None, None) => unreachable!("has_records checked above"),
        }
    }
}
