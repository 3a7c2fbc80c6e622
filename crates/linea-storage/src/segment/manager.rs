//! The segmented store: segment files, index, free list, and the rewrite
//! procedures.
//!
//! # Rewrite overview
//!
//! A rewrite streams a window of neighboring segments (plus a sorted batch
//! of in-memory records) through the [`SegmentBuilder`] and back to disk in
//! one pass, with staging memory held fixed: pages are staged in a
//! [`CircularPageBuffer`] of [`REWRITE_WINDOW_PAGES`] slots and freed, in
//! allocation order, as soon as every key they held has been written out.
//! The index is only touched at the very end, after the replacement
//! segments are durable, so readers resolve through a consistent view
//! throughout.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};

use bytes::Bytes;
use parking_lot::Mutex;

use linea_common::constants::{
    DEBUG_DIR_NAME, PAGE_SIZE, REWRITE_WINDOW_PAGES, SEGMENT_FILE_PREFIX, SEGMENT_PAGE_COUNTS,
    SEGMENT_SUMMARY_CSV,
};
use linea_common::types::{extract_head64, key_to_bytes, Key};
use linea_common::{LineaError, LineaResult, SegmentId, StorageOptions};

use crate::file::SegmentFile;
use crate::index::SegmentIndex;
use crate::merge::{PageMergeIterator, PagePlusRecordMerger};
use crate::page::{Page, PageMut};

use super::{
    page_lower_boundaries, CircularPageBuffer, FreeList, Record, Segment, SegmentBuilder,
    SegmentInfo, SegmentWrap,
};

/// The segmented storage context: size-class files, index, free list, and
/// the background write pool.
pub struct SegmentManager {
    options: StorageOptions,
    dir: PathBuf,
    files: Vec<SegmentFile>,
    index: SegmentIndex,
    free: FreeList,
    next_sequence: AtomicU32,
    pool: Option<rayon::ThreadPool>,
}

impl SegmentManager {
    /// Opens a segmented store rooted at `dir`, creating the segment files
    /// as needed.
    pub fn open(dir: impl AsRef<Path>, options: StorageOptions) -> LineaResult<Self> {
        options
            .validate()
            .map_err(|message| LineaError::InvalidConfig { message })?;
        let dir = dir.as_ref().to_path_buf();
        if !options.use_memory_based_io {
            std::fs::create_dir_all(&dir)?;
        }

        let mut files = Vec::with_capacity(SEGMENT_PAGE_COUNTS.len());
        for (idx, pages) in SEGMENT_PAGE_COUNTS.iter().enumerate() {
            files.push(SegmentFile::open(
                dir.join(format!("{SEGMENT_FILE_PREFIX}{idx}")),
                *pages,
                options.use_memory_based_io,
            )?);
        }

        let pool = match rayon::ThreadPoolBuilder::new().num_threads(2).build() {
            Ok(pool) => Some(pool),
            Err(error) => {
                tracing::warn!(%error, "background write pool unavailable; invalidation writes run inline");
                None
            }
        };

        Ok(Self {
            options,
            dir,
            files,
            index: SegmentIndex::new(),
            free: FreeList::new(),
            next_sequence: AtomicU32::new(0),
            pool,
        })
    }

    /// Returns the store's options.
    #[inline]
    pub fn options(&self) -> &StorageOptions {
        &self.options
    }

    /// Returns the segment index.
    #[inline]
    pub fn index(&self) -> &SegmentIndex {
        &self.index
    }

    /// Returns the free list of invalidated segments.
    #[inline]
    pub fn free_list(&self) -> &FreeList {
        &self.free
    }

    // =========================================================================
    // Segment I/O
    // =========================================================================

    fn file(&self, id: SegmentId) -> LineaResult<&SegmentFile> {
        self.files
            .get(id.file_id())
            .ok_or(LineaError::SegmentNotFound { segment_id: id })
    }

    /// Reads a whole segment into `buf`.
    pub fn read_segment(&self, id: SegmentId, buf: &mut [u8]) -> LineaResult<()> {
        debug_assert_eq!(buf.len(), id.page_count() * PAGE_SIZE);
        self.file(id)?.read_pages(id.page_offset(), buf)
    }

    /// Reads one page of a segment into `buf`.
    pub fn read_page(&self, id: SegmentId, page_idx: usize, buf: &mut [u8]) -> LineaResult<()> {
        self.file(id)?.read_pages(id.page_offset() + page_idx, buf)
    }

    /// Writes one page of a segment from `buf`.
    pub fn write_page(&self, id: SegmentId, page_idx: usize, buf: &[u8]) -> LineaResult<()> {
        self.file(id)?.write_pages(id.page_offset() + page_idx, buf)
    }

    /// Takes a reusable segment slot of `page_count` pages from the free
    /// list, or allocates a fresh one from the matching size-class file.
    fn acquire_segment_id(&self, page_count: usize) -> SegmentId {
        if let Some(id) = self.free.get(page_count) {
            return id;
        }
        let file_idx = page_count.trailing_zeros() as usize;
        let byte_offset = self.files[file_idx].allocate_segment();
        SegmentId::new(file_idx, byte_offset / PAGE_SIZE)
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Reads the latest on-disk value for `key`, following the overflow
    /// chain of the page the model assigns it.
    pub fn get(&self, key: Key) -> LineaResult<Option<Bytes>> {
        let Some((base, info)) = self.index.segment_for_key(key) else {
            return Ok(None);
        };
        let page_idx = info.page_for(base, key);
        let key_bytes = key_to_bytes(key);

        let mut buf = vec![0u8; PAGE_SIZE];
        self.read_page(info.id(), page_idx, &mut buf)?;
        loop {
            let (found, overflow) = {
                let page = Page::new(&buf);
                if page.is_initialized() && page.checksum() != 0 && !page.verify_checksum() {
                    return Err(LineaError::ChecksumMismatch {
                        expected: page.checksum(),
                        actual: crate::page::compute_page_checksum(&buf),
                    });
                }
                (
                    page.get(&key_bytes).map(Bytes::copy_from_slice),
                    page.overflow_id().map(SegmentId::from_u64),
                )
            };
            if found.is_some() {
                return Ok(found);
            }
            match overflow {
                Some(id) => self.read_page(id, 0, &mut buf)?,
                None => return Ok(None),
            }
        }
    }

    // =========================================================================
    // Loading
    // =========================================================================

    /// Builds segments from a sorted dataset and bulk-loads the index.
    pub fn bulk_load(&self, records: &[Record]) -> LineaResult<()> {
        debug_assert!(records.windows(2).all(|w| w[0].0 < w[1].0));
        let mut builder = SegmentBuilder::new(
            self.options.records_per_page_goal,
            self.options.records_per_page_delta,
        );
        let segments = builder.build_from_dataset(records.iter().cloned());
        if self.options.write_debug_info {
            self.write_segment_summary(&segments)?;
        }

        let mut boundaries = Vec::with_capacity(segments.len());
        for (idx, seg) in segments.iter().enumerate() {
            let upper_bound = segments
                .get(idx + 1)
                .map(|next| next.records[0].0)
                .unwrap_or(Key::MAX);
            boundaries.push(self.load_into_new_segment(0, seg, upper_bound)?);
        }
        self.index.bulk_load(boundaries);
        tracing::info!(
            records = records.len(),
            segments = self.index.len(),
            "bulk load complete"
        );
        Ok(())
    }

    /// Writes one built segment to disk and returns its index entry.
    ///
    /// Per-page lower boundaries are derived from the model by binary
    /// search in the key domain; the records are split at those boundaries
    /// and loaded page by page. The builder's fill constraint guarantees
    /// every page fits.
    fn load_into_new_segment(
        &self,
        sequence_number: u32,
        seg: &Segment,
        upper_bound: Key,
    ) -> LineaResult<(Key, SegmentInfo)> {
        debug_assert!(!seg.records.is_empty());
        let mut buf = vec![0u8; seg.page_count * PAGE_SIZE];

        if seg.page_count > 1 {
            let model = seg.model.as_ref().expect("multi-page segments carry a model");
            let boundaries = page_lower_boundaries(seg);
            let mut start = 0usize;
            for page_idx in 0..seg.page_count - 1 {
                let page_upper = boundaries[page_idx + 1];
                let end = start
                    + seg.records[start..].partition_point(|(key, _)| *key < page_upper);
                load_into_page(
                    &mut buf,
                    page_idx,
                    boundaries[page_idx],
                    page_upper,
                    &seg.records[start..end],
                )?;
                start = end;
            }
            load_into_page(
                &mut buf,
                seg.page_count - 1,
                *boundaries.last().expect("boundaries are non-empty"),
                upper_bound,
                &seg.records[start..],
            )?;
            PageMut::new(&mut buf[..PAGE_SIZE]).set_model(model);
        } else {
            load_into_page(&mut buf, 0, seg.base_key, upper_bound, &seg.records)?;
        }

        let mut wrap = SegmentWrap::new(&mut buf, seg.page_count);
        wrap.set_sequence_number(sequence_number);
        wrap.clear_all_overflows();
        wrap.compute_and_set_checksum();

        let id = self.acquire_segment_id(seg.page_count);
        self.file(id)?.write_pages(id.page_offset(), &buf)?;
        Ok((seg.base_key, SegmentInfo::new(id, seg.model)))
    }

    /// Loads a sorted record run into fresh single-page segments covering
    /// `[lower_bound, upper_bound)`.
    fn load_into_new_pages(
        &self,
        sequence_number: u32,
        lower_bound: Key,
        upper_bound: Key,
        records: &[Record],
    ) -> LineaResult<Vec<(Key, SegmentInfo)>> {
        let per_page = self.options.records_per_page_goal;
        let chunks: Vec<&[Record]> = records.chunks(per_page).collect();
        let mut boundaries = Vec::with_capacity(chunks.len());

        for (idx, chunk) in chunks.iter().enumerate() {
            let lower = if idx == 0 { lower_bound } else { chunk[0].0 };
            let upper = chunks
                .get(idx + 1)
                .map(|next| next[0].0)
                .unwrap_or(upper_bound);

            let mut buf = vec![0u8; PAGE_SIZE];
            load_into_page(&mut buf, 0, lower, upper, chunk)?;
            let mut wrap = SegmentWrap::new(&mut buf, 1);
            wrap.set_sequence_number(sequence_number);
            wrap.clear_all_overflows();
            wrap.compute_and_set_checksum();

            let id = self.acquire_segment_id(1);
            self.file(id)?.write_pages(id.page_offset(), &buf)?;
            boundaries.push((lower, SegmentInfo::new(id, None)));
        }
        Ok(boundaries)
    }

    // =========================================================================
    // Overflow chaining (the slow write path)
    // =========================================================================

    /// Attaches an overflow page to page `page_idx` of the segment based at
    /// `base` and marks the overflow bit in the index.
    pub fn chain_overflow(
        &self,
        base: Key,
        page_idx: usize,
        records: &[Record],
    ) -> LineaResult<SegmentId> {
        let info = self
            .index
            .get(base)
            .ok_or_else(|| LineaError::invalid_argument(format!("no segment based at {base}")))?;
        debug_assert!(page_idx < info.page_count());

        let mut main_buf = vec![0u8; PAGE_SIZE];
        self.read_page(info.id(), page_idx, &mut main_buf)?;
        let (lower, upper, sequence) = {
            let page = Page::new(&main_buf);
            if page.overflow_id().is_some() {
                return Err(LineaError::invalid_argument(
                    "page already has an overflow".to_string(),
                ));
            }
            (
                page.lower_boundary().to_vec(),
                page.upper_boundary().to_vec(),
                page.sequence_number(),
            )
        };

        let overflow_id = self.acquire_segment_id(1);
        let mut overflow_buf = vec![0u8; PAGE_SIZE];
        {
            let mut page = PageMut::new(&mut overflow_buf);
            page.initialize(&lower, &upper);
            for (key, value) in records {
                page.put(&key_to_bytes(*key), value)?;
            }
            page.set_sequence_number(sequence);
            page.update_checksum();
        }
        self.write_page(overflow_id, 0, &overflow_buf)?;

        {
            let mut page = PageMut::new(&mut main_buf);
            page.set_overflow(overflow_id.as_u64());
            page.update_checksum();
        }
        self.write_page(info.id(), page_idx, &main_buf)?;
        self.index.set_overflow(base, true);
        Ok(overflow_id)
    }

    // =========================================================================
    // Segment rewrite (sliding window)
    // =========================================================================

    /// Rewrites the segment based at `segment_base`, folding in the sorted
    /// record batch `records`. With `consider_neighbors_during_rewrite`
    /// set, consecutive neighbors carrying overflows join the rewrite.
    pub fn rewrite_segments(&self, segment_base: Key, records: &[Record]) -> LineaResult<()> {
        let seed = self
            .index
            .get(segment_base)
            .ok_or_else(|| {
                LineaError::invalid_argument(format!("no segment based at {segment_base}"))
            })?;

        let mut segments_to_rewrite = vec![(segment_base, seed)];
        if self.options.consider_neighbors_during_rewrite {
            // Scan backward, then forward; stop at the first neighbor
            // without overflow.
            let mut cursor = segment_base;
            while let Some((base, info)) = self.index.prev_entry(cursor) {
                if !info.has_overflow() {
                    break;
                }
                segments_to_rewrite.push((base, info));
                cursor = base;
            }
            cursor = segment_base;
            while let Some((base, info)) = self.index.next_entry(cursor) {
                if !info.has_overflow() {
                    break;
                }
                segments_to_rewrite.push((base, info));
                cursor = base;
            }
            segments_to_rewrite.sort_by_key(|(base, _)| *base);
        }

        let sequence_number = self.next_sequence.fetch_add(1, Ordering::SeqCst);
        // Recovery hook: the sequence number and the segment set are
        // recorded before any page is touched.
        tracing::debug!(
            sequence_number,
            bases = ?segments_to_rewrite.iter().map(|(base, _)| *base).collect::<Vec<_>>(),
            "starting segment rewrite"
        );

        let mut window = RewriteWindow::new(REWRITE_WINDOW_PAGES);
        let mut builder = SegmentBuilder::new(
            self.options.records_per_page_goal,
            self.options.records_per_page_delta,
        );
        let mut merger = PagePlusRecordMerger::new(records);
        let mut rewritten: Vec<(Key, SegmentInfo)> = Vec::new();
        let mut overflows_to_clear: Vec<SegmentId> = Vec::new();

        for (_, info) in &segments_to_rewrite {
            let segment_pages = info.page_count();
            if segment_pages > window.page_buf.num_free_pages() {
                // Out of window memory: write the in-flight segments out.
                let finished = builder.finish();
                self.write_out_segments(
                    sequence_number,
                    finished,
                    &builder,
                    &mut window,
                    &mut rewritten,
                )?;
                debug_assert!(segment_pages <= window.page_buf.num_free_pages());
            }

            let mut seg_buf = vec![0u8; segment_pages * PAGE_SIZE];
            self.read_segment(info.id(), &mut seg_buf)?;
            let overflows = SegmentWrap::new(&mut seg_buf, segment_pages).overflows();
            if segment_pages + overflows.len() > window.page_buf.num_free_pages() {
                let finished = builder.finish();
                self.write_out_segments(
                    sequence_number,
                    finished,
                    &builder,
                    &mut window,
                    &mut rewritten,
                )?;
                debug_assert!(
                    segment_pages + overflows.len() <= window.page_buf.num_free_pages()
                );
            }

            // Stage the segment's pages in the window, reserving a slot
            // behind every page that carries an overflow.
            let mut chains = Vec::with_capacity(segment_pages);
            let mut overflow_loads: Vec<(SegmentId, usize)> = Vec::new();
            for page_idx in 0..segment_pages {
                let main_slot = window
                    .page_buf
                    .allocate()
                    .expect("window is sized for a segment and its overflows");
                window
                    .page_buf
                    .page_mut(main_slot)
                    .copy_from_slice(&seg_buf[page_idx * PAGE_SIZE..(page_idx + 1) * PAGE_SIZE]);
                let overflow = overflows
                    .iter()
                    .find(|(idx, _)| *idx == page_idx)
                    .map(|(_, id)| *id);
                match overflow {
                    Some(overflow_id) => {
                        let overflow_slot = window
                            .page_buf
                            .allocate()
                            .expect("window is sized for a segment and its overflows");
                        overflow_loads.push((overflow_id, overflow_slot));
                        overflows_to_clear.push(overflow_id);
                        chains.push(PageChain::with_overflow(main_slot, overflow_slot));
                    }
                    None => chains.push(PageChain::single(main_slot)),
                }
            }
            for (overflow_id, slot) in overflow_loads {
                self.read_page(overflow_id, 0, window.page_buf.page_mut(slot))?;
            }
            window.pages_to_process.extend(chains);

            // Feed the staged chains through the builder, mixing in the
            // in-memory records.
            while let Some(chain) = window.pages_to_process.front().copied() {
                merger.update_page_iterator(chain.iterator(&window.page_buf));
                while merger.has_page_records() {
                    let emitted = builder.offer(merger.get_next());
                    if !emitted.is_empty() {
                        self.write_out_segments(
                            sequence_number,
                            emitted,
                            &builder,
                            &mut window,
                            &mut rewritten,
                        )?;
                    }
                }
                let chain = window.pages_to_process.pop_front().expect("front exists");
                window.pages_processed.push_back(chain);
            }
        }
        debug_assert!(!merger.has_page_records());

        // Leftover in-memory records past the last chain.
        while merger.has_records() {
            let emitted = builder.offer(merger.get_next());
            if !emitted.is_empty() {
                self.write_out_segments(
                    sequence_number,
                    emitted,
                    &builder,
                    &mut window,
                    &mut rewritten,
                )?;
            }
        }
        let finished = builder.finish();
        self.write_out_segments(sequence_number, finished, &builder, &mut window, &mut rewritten)?;

        // Invalidate the old segments and swap the index.
        let mut old_ids: Vec<SegmentId> =
            segments_to_rewrite.iter().map(|(_, info)| info.id()).collect();
        old_ids.extend(overflows_to_clear);
        let erase_bases: Vec<Key> = segments_to_rewrite.iter().map(|(base, _)| *base).collect();
        self.invalidate_and_swap(&old_ids, &erase_bases, &rewritten)?;

        tracing::debug!(sequence_number, segments = rewritten.len(), "segment rewrite complete");
        Ok(())
    }

    /// Writes finished segments out and frees window slots whose keys are
    /// all durable.
    fn write_out_segments(
        &self,
        sequence_number: u32,
        segments: Vec<Segment>,
        builder: &SegmentBuilder,
        window: &mut RewriteWindow,
        rewritten: &mut Vec<(Key, SegmentInfo)>,
    ) -> LineaResult<()> {
        for (idx, seg) in segments.iter().enumerate() {
            let upper_bound = if idx + 1 < segments.len() {
                segments[idx + 1].base_key
            } else if let Some(next_base) = builder.current_base_key() {
                next_base
            } else {
                // The builder is drained; the next boundary comes from the
                // index, whose old entries are still present at this point.
                let last_key = seg.records.last().expect("segments are non-empty").0;
                self.index.next_base_after(last_key).unwrap_or(Key::MAX)
            };
            rewritten.push(self.load_into_new_segment(sequence_number, seg, upper_bound)?);
        }

        match builder.current_base_key() {
            Some(next_key) => {
                // Chains whose largest key precedes the builder's base hold
                // only durable keys now.
                while let Some(front) = window.pages_processed.front() {
                    if let Some(largest) = front.largest_key(&window.page_buf) {
                        if largest >= next_key {
                            break;
                        }
                    }
                    let pages = front.num_pages();
                    for _ in 0..pages {
                        window.page_buf.free();
                    }
                    window.pages_processed.pop_front();
                }
            }
            None => {
                while let Some(front) = window.pages_processed.pop_front() {
                    for _ in 0..front.num_pages() {
                        window.page_buf.free();
                    }
                }
            }
        }
        Ok(())
    }

    // =========================================================================
    // Chain flatten
    // =========================================================================

    /// Flattens a single-page segment and its overflow, merging in the
    /// sorted record batch `records`, into fresh single-page segments.
    pub fn flatten_chain(&self, base: Key, records: &[Record]) -> LineaResult<()> {
        let info = self
            .index
            .get(base)
            .ok_or_else(|| LineaError::invalid_argument(format!("no segment based at {base}")))?;
        debug_assert_eq!(info.page_count(), 1, "flatten applies to one-page segments");
        let main_id = info.id();
        let upper = self.index.next_base_after(base).unwrap_or(Key::MAX);

        let mut buf = vec![0u8; 2 * PAGE_SIZE];
        self.read_page(main_id, 0, &mut buf[..PAGE_SIZE])?;
        let overflow_id = Page::new(&buf[..PAGE_SIZE])
            .overflow_id()
            .map(SegmentId::from_u64);
        if let Some(id) = overflow_id {
            let (_, overflow_half) = buf.split_at_mut(PAGE_SIZE);
            self.read_page(id, 0, overflow_half)?;
        }

        // Merge chain records with the in-memory batch, newest wins.
        let merged: Vec<Record> = {
            let mut sources = vec![Page::new(&buf[..PAGE_SIZE]).iter()];
            if overflow_id.is_some() {
                sources.push(Page::new(&buf[PAGE_SIZE..]).iter());
            }
            let mut merger = PagePlusRecordMerger::new(records);
            merger.update_page_iterator(PageMergeIterator::new(sources));
            let mut out = Vec::new();
            while merger.has_records() {
                out.push(merger.get_next());
            }
            out
        };

        let sequence_number = self.next_sequence.fetch_add(1, Ordering::SeqCst);
        tracing::debug!(sequence_number, base, segment = %main_id, "flattening page chain");

        let new_pages = self.load_into_new_pages(sequence_number, base, upper, &merged)?;

        let mut old_ids = vec![main_id];
        old_ids.extend(overflow_id);
        self.invalidate_and_swap(&old_ids, &[base], &new_pages)?;

        tracing::debug!(sequence_number, pages = new_pages.len(), "page chain flattened");
        Ok(())
    }

    // =========================================================================
    // Invalidation
    // =========================================================================

    /// Zeroes page 0 of every old segment (the durability commit point for
    /// invalidation), adds the ids to the free list, and swaps the index
    /// entries. The zeroing writes run on the background pool and are
    /// joined before returning.
    fn invalidate_and_swap(
        &self,
        old_ids: &[SegmentId],
        erase_bases: &[Key],
        insert_entries: &[(Key, SegmentInfo)],
    ) -> LineaResult<()> {
        let zero = vec![0u8; PAGE_SIZE];
        let write_error: Mutex<Option<LineaError>> = Mutex::new(None);

        match &self.pool {
            Some(pool) => {
                pool.scope(|scope| {
                    for &id in old_ids {
                        let zero = &zero;
                        let write_error = &write_error;
                        scope.spawn(move |_| {
                            if let Err(error) = self.write_page(id, 0, zero) {
                                write_error.lock().get_or_insert(error);
                            }
                        });
                        self.free.add(id);
                    }
                    // The index swap proceeds while the zeroing writes
                    // drain; the scope joins them before returning.
                    for base in erase_bases {
                        let removed = self.index.erase(*base);
                        debug_assert!(removed, "rewritten base must have been indexed");
                    }
                    for (base, info) in insert_entries {
                        self.index.insert(*base, info.clone());
                    }
                });
            }
            None => {
                for &id in old_ids {
                    self.write_page(id, 0, &zero)?;
                    self.free.add(id);
                }
                for base in erase_bases {
                    let removed = self.index.erase(*base);
                    debug_assert!(removed, "rewritten base must have been indexed");
                }
                for (base, info) in insert_entries {
                    self.index.insert(*base, info.clone());
                }
            }
        }

        match write_error.into_inner() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    // =========================================================================
    // Debug output
    // =========================================================================

    /// Emits `debug/segment_summary.csv` with per-size-class segment
    /// counts.
    fn write_segment_summary(&self, segments: &[Segment]) -> LineaResult<()> {
        let mut counts = vec![0usize; SEGMENT_PAGE_COUNTS.len()];
        for seg in segments {
            counts[seg.page_count.trailing_zeros() as usize] += 1;
        }
        let mut csv = String::from("segment_page_count,num_segments\n");
        for (idx, count) in counts.iter().enumerate() {
            csv.push_str(&format!("{},{}\n", 1usize << idx, count));
        }
        let debug_dir = self.dir.join(DEBUG_DIR_NAME);
        std::fs::create_dir_all(&debug_dir)?;
        std::fs::write(debug_dir.join(SEGMENT_SUMMARY_CSV), csv)?;
        Ok(())
    }
}

impl std::fmt::Debug for SegmentManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SegmentManager")
            .field("segments", &self.index.len())
            .field("free", &self.free.len())
            .finish()
    }
}

/// Loads one run of records into page `page_idx` of `buf` with the given
/// exclusive boundaries.
fn load_into_page(
    buf: &mut [u8],
    page_idx: usize,
    lower: Key,
    upper: Key,
    records: &[Record],
) -> LineaResult<()> {
    let mut page = PageMut::new(&mut buf[page_idx * PAGE_SIZE..(page_idx + 1) * PAGE_SIZE]);
    page.initialize(&key_to_bytes(lower), &key_to_bytes(upper));
    for (key, value) in records {
        match page.put(&key_to_bytes(*key), value) {
            Ok(()) => {}
            Err(LineaError::PageFull { .. }) => {
                return Err(LineaError::internal(
                    "segment builder fill constraint violated: page overflowed during load",
                ));
            }
            Err(other) => return Err(other),
        }
    }
    Ok(())
}

/// The sliding window of a rewrite: the page slots plus the two chain
/// queues.
struct RewriteWindow {
    page_buf: CircularPageBuffer,
    pages_to_process: std::collections::VecDeque<PageChain>,
    pages_processed: std::collections::VecDeque<PageChain>,
}

impl RewriteWindow {
    fn new(capacity: usize) -> Self {
        Self {
            page_buf: CircularPageBuffer::new(capacity),
            pages_to_process: std::collections::VecDeque::new(),
            pages_processed: std::collections::VecDeque::new(),
        }
    }
}

/// A staged main page and its optional overflow, by window slot index.
#[derive(Debug, Clone, Copy)]
struct PageChain {
    main_slot: usize,
    overflow_slot: Option<usize>,
}

impl PageChain {
    fn single(main_slot: usize) -> Self {
        Self {
            main_slot,
            overflow_slot: None,
        }
    }

    fn with_overflow(main_slot: usize, overflow_slot: usize) -> Self {
        Self {
            main_slot,
            overflow_slot: Some(overflow_slot),
        }
    }

    fn num_pages(&self) -> usize {
        1 + usize::from(self.overflow_slot.is_some())
    }

    fn iterator<'a>(&self, buf: &'a CircularPageBuffer) -> PageMergeIterator<'a> {
        let mut sources = vec![Page::new(buf.page(self.main_slot)).iter()];
        if let Some(slot) = self.overflow_slot {
            sources.push(Page::new(buf.page(slot)).iter());
        }
        PageMergeIterator::new(sources)
    }

    /// Largest key held anywhere in the chain; `None` for an empty chain.
    fn largest_key(&self, buf: &CircularPageBuffer) -> Option<Key> {
        let mut merged = self.iterator(buf);
        merged.seek_to_last();
        if merged.valid() {
            Some(extract_head64(merged.key()))
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn value(text: &str) -> Bytes {
        Bytes::copy_from_slice(text.as_bytes())
    }

    fn test_manager() -> SegmentManager {
        let mut options = StorageOptions::for_testing();
        options.records_per_page_goal = 10;
        options.records_per_page_delta = 2;
        SegmentManager::open("unused", options).unwrap()
    }

    fn dataset(n: u64, step: u64) -> Vec<Record> {
        (0..n).map(|i| (i * step, value(&format!("v{i}")))).collect()
    }

    #[test]
    fn test_bulk_load_and_get() {
        let manager = test_manager();
        let records = dataset(400, 7);
        manager.bulk_load(&records).unwrap();

        assert!(!manager.index().is_empty());
        for (key, val) in &records {
            assert_eq!(manager.get(*key).unwrap().as_ref(), Some(val), "key {key}");
        }
        // Between and past the loaded keys.
        assert_eq!(manager.get(3).unwrap(), None);
        assert_eq!(manager.get(400 * 7 + 1).unwrap(), None);
    }

    #[test]
    fn test_index_agrees_with_storage_after_bulk_load() {
        let manager = test_manager();
        manager.bulk_load(&dataset(300, 3)).unwrap();

        let mut buf = vec![0u8; PAGE_SIZE];
        for (base, info) in manager.index().snapshot() {
            manager.read_page(info.id(), 0, &mut buf).unwrap();
            let page = Page::new(&buf);
            assert!(page.is_initialized());
            assert_ne!(page.checksum(), 0);
            assert!(page.verify_checksum());
            assert_eq!(extract_head64(page.lower_boundary()), base);
        }
    }

    #[test]
    fn test_chain_overflow_readable() {
        let manager = test_manager();
        manager.bulk_load(&dataset(20, 10)).unwrap();

        let (base, _) = manager.index().segment_for_key(0).unwrap();
        let overflow_id = manager
            .chain_overflow(base, 0, &[(5, value("ov5"))])
            .unwrap();
        assert!(overflow_id.is_valid());
        assert!(manager.index().get(base).unwrap().has_overflow());

        // Key 5 is only reachable through the overflow.
        assert_eq!(manager.get(5).unwrap(), Some(value("ov5")));
        // Main-page keys are still reachable.
        assert_eq!(manager.get(10).unwrap(), Some(value("v1")));
    }

    #[test]
    fn test_debug_summary_written() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut options = StorageOptions::for_testing();
        options.use_memory_based_io = false;
        options.write_debug_info = true;
        options.records_per_page_goal = 10;
        let manager = SegmentManager::open(dir.path(), options).unwrap();
        manager.bulk_load(&dataset(200, 2)).unwrap();

        let csv = std::fs::read_to_string(
            dir.path().join(DEBUG_DIR_NAME).join(SEGMENT_SUMMARY_CSV),
        )
        .unwrap();
        assert!(csv.starts_with("segment_page_count,num_segments\n"));
        assert_eq!(csv.lines().count(), 1 + SEGMENT_PAGE_COUNTS.len());
    }
}
