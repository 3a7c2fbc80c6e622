//! The page-chain store variant.
//!
//! `ChainStore` composes the process-wide pieces - buffer manager, page
//! model, write buffer, options - and hands them into each operation; there
//! are no globals. Writes land in the memtable; the flush worker drains it,
//! groups records by the page the model assigns them, and applies each
//! group to that page's overflow chain. Chains that grow past the
//! configured length are reorganized (see [`crate::reorg`]).
//!
//! Chain access and reorganization serialize on the first link of the
//! chain: whichever side fixes the head exclusively first wins. The loser
//! observes the model's page count changing across its own head fix,
//! receives `None`, and must re-resolve - the flush worker by re-inserting
//! its records, readers by retrying through the model.

use bytes::Bytes;
use parking_lot::RwLock;
use std::path::Path;

use linea_common::types::EntryType;
use linea_common::{LineaError, LineaResult, PageId, StorageOptions};

use crate::buffer::{BufferManager, FrameGuard};
use crate::file::PageFileManager;
use crate::index::PageModel;
use crate::memtable::MemTable;
use crate::page::PageMut;

/// A record drained from the memtable, headed for a chain.
type FlushRecord = (Bytes, Bytes, EntryType);

/// The page-chain storage context.
pub struct ChainStore {
    options: StorageOptions,
    buffer: BufferManager,
    model: PageModel,
    memtable: RwLock<MemTable>,
}

impl ChainStore {
    /// Opens a store whose page file lives under `dir`.
    pub fn open(dir: impl AsRef<Path>, options: StorageOptions) -> LineaResult<Self> {
        options
            .validate()
            .map_err(|message| LineaError::InvalidConfig { message })?;
        let file = if options.use_memory_based_io {
            PageFileManager::in_memory()
        } else {
            std::fs::create_dir_all(dir.as_ref())?;
            PageFileManager::open(dir.as_ref().join("pages"))?
        };
        Ok(Self {
            options,
            buffer: BufferManager::new(file),
            model: PageModel::new(),
            memtable: RwLock::new(MemTable::new()),
        })
    }

    /// Returns the store's options.
    #[inline]
    pub fn options(&self) -> &StorageOptions {
        &self.options
    }

    /// Returns the buffer manager.
    #[inline]
    pub fn buffer_manager(&self) -> &BufferManager {
        &self.buffer
    }

    /// Returns the page model.
    #[inline]
    pub fn model(&self) -> &PageModel {
        &self.model
    }

    /// Buffers a write.
    pub fn put(&self, key: Bytes, value: Bytes) {
        self.memtable.read().put(key, value);
    }

    /// Buffers a delete.
    pub fn delete(&self, key: Bytes) {
        self.memtable.read().delete(key);
    }

    /// Returns the write buffer's approximate memory usage.
    pub fn memtable_usage(&self) -> usize {
        self.memtable.read().approximate_memory_usage()
    }

    /// Reads the latest value for `key`, or `None` if it does not exist
    /// (or was deleted).
    pub fn get(&self, key: &[u8]) -> LineaResult<Option<Bytes>> {
        if let Some((entry_type, value)) = self.memtable.read().get(key) {
            return Ok(match entry_type {
                EntryType::Write => Some(value),
                EntryType::Delete => None,
            });
        }

        loop {
            let Some(page_id) = self.model.lookup(key) else {
                return Ok(None);
            };
            let Some(chain) = self.fix_overflow_chain(page_id, false)? else {
                // A reorganization slipped in; re-resolve through the model.
                continue;
            };
            let mut found = None;
            for guard in &chain {
                if let Some(value) = guard.page().get(key) {
                    found = Some(Bytes::copy_from_slice(value));
                    break;
                }
            }
            for guard in chain {
                self.buffer.unfix(guard, false);
            }
            return Ok(found);
        }
    }

    /// Loads a sorted dataset into fresh pages, `records_per_page_goal`
    /// records per page, and registers their boundaries in the model.
    pub fn bulk_load(&self, records: &[(Bytes, Bytes)]) -> LineaResult<()> {
        debug_assert!(records.windows(2).all(|w| w[0].0 < w[1].0));
        let per_page = self.options.records_per_page_goal;
        let chunks: Vec<&[(Bytes, Bytes)]> = records.chunks(per_page).collect();
        for (idx, chunk) in chunks.iter().enumerate() {
            let lower = chunk[0].0.to_vec();
            let upper = chunks
                .get(idx + 1)
                .map(|next| next[0].0.to_vec())
                .unwrap_or_default();

            let page_id = self.buffer.file_manager().allocate_page();
            let mut guard = self.buffer.fix_page(page_id, true, true)?;
            let mut page = PageMut::new(guard.data_mut());
            page.initialize(&lower, &upper);
            for (key, value) in *chunk {
                page.put(key, value)?;
            }
            self.model.insert(lower, page_id);
            self.buffer.unfix(guard, true);
        }
        Ok(())
    }

    /// Fixes the whole overflow chain rooted at `head`.
    ///
    /// Returns `None` when the model's page count changed across the head
    /// fix - a reorganization won the race and the caller's page resolution
    /// is stale.
    pub fn fix_overflow_chain(
        &self,
        head: PageId,
        exclusive: bool,
    ) -> LineaResult<Option<Vec<FrameGuard>>> {
        let pages_before = self.model.page_count();
        let head_guard = self.buffer.fix_page(head, exclusive, false)?;
        if self.model.page_count() != pages_before {
            self.buffer.unfix(head_guard, false);
            return Ok(None);
        }

        let mut chain = vec![head_guard];
        loop {
            let overflow = chain.last().expect("chain is non-empty").page().overflow_id();
            match overflow {
                Some(id) => chain.push(self.buffer.fix_page(PageId::new(id), exclusive, false)?),
                None => break,
            }
        }
        Ok(Some(chain))
    }

    /// Drains the write buffer into the store.
    ///
    /// Records are grouped by the page the model assigns them; each group
    /// is applied to that page's chain, extending it with a fresh overflow
    /// page when the tail fills. Groups whose chain fix is defeated by a
    /// concurrent reorganization are re-inserted into the (new) write
    /// buffer. Chains that reach `reorg_length` links are reorganized
    /// before returning.
    pub fn flush(&self) -> LineaResult<()> {
        let drained = std::mem::take(&mut *self.memtable.write());
        if drained.is_empty() {
            return Ok(());
        }

        let mut groups: Vec<(PageId, Vec<FlushRecord>)> = Vec::new();
        let mut it = drained.iter();
        it.seek_to_first();
        while it.valid() {
            let page_id = self
                .model
                .lookup(it.key())
                .ok_or_else(|| LineaError::internal("no page covers a flushed key"))?;
            let record = (
                Bytes::copy_from_slice(it.key()),
                it.value().clone(),
                it.entry_type(),
            );
            match groups.last_mut() {
                Some((last_id, records)) if *last_id == page_id => records.push(record),
                _ => groups.push((page_id, vec![record])),
            }
            it.next();
        }
        drop(it);

        let mut reorg_heads = Vec::new();
        for (page_id, records) in groups {
            match self.fix_overflow_chain(page_id, true)? {
                None => self.reinsert(records),
                Some(mut chain) => {
                    self.apply_to_chain(&mut chain, records)?;
                    if chain.len() >= self.options.reorg_length {
                        reorg_heads.push(chain[0].page_id());
                    }
                    for guard in chain {
                        self.buffer.unfix(guard, true);
                    }
                }
            }
        }

        for head in reorg_heads {
            self.reorganize_overflow_chain(head, self.options.page_fill_pct)?;
        }
        Ok(())
    }

    /// Puts a group back into the write buffer after a lost race. The
    /// records pick up fresh sequence numbers; they are still the latest
    /// versions of their keys, so recency is preserved.
    fn reinsert(&self, records: Vec<FlushRecord>) {
        let memtable = self.memtable.read();
        for (key, value, entry_type) in records {
            match entry_type {
                EntryType::Write => memtable.put(key, value),
                EntryType::Delete => memtable.delete(key),
            }
        }
    }

    fn apply_to_chain(
        &self,
        chain: &mut Vec<FrameGuard>,
        records: Vec<FlushRecord>,
    ) -> LineaResult<()> {
        for (key, value, entry_type) in records {
            match entry_type {
                EntryType::Delete => {
                    for guard in chain.iter_mut() {
                        if PageMut::new(guard.data_mut()).delete(&key) {
                            break;
                        }
                    }
                }
                EntryType::Write => self.insert_into_chain(chain, &key, &value)?,
            }
        }
        Ok(())
    }

    /// Writes one record into the chain: update in an earlier link if the
    /// key lives there, insert at the tail otherwise, growing the chain
    /// when the tail is full.
    fn insert_into_chain(
        &self,
        chain: &mut Vec<FrameGuard>,
        key: &[u8],
        value: &[u8],
    ) -> LineaResult<()> {
        let mut idx = 0;
        while idx < chain.len() {
            let is_tail = chain[idx].page().overflow_id().is_none();
            if !is_tail {
                if PageMut::new(chain[idx].data_mut()).update_or_remove(key, value) {
                    return Ok(());
                }
            } else {
                let put_result = PageMut::new(chain[idx].data_mut()).put(key, value);
                match put_result {
                    Ok(()) => return Ok(()),
                    Err(LineaError::PageFull { .. }) => {
                        let new_id = self.buffer.file_manager().allocate_page();
                        let (lower, upper) = {
                            let page = chain[idx].page();
                            (
                                page.lower_boundary().to_vec(),
                                page.upper_boundary().to_vec(),
                            )
                        };
                        let mut new_guard = self.buffer.fix_page(new_id, true, true)?;
                        let mut new_page = PageMut::new(new_guard.data_mut());
                        new_page.initialize(&lower, &upper);
                        new_page.put(key, value).map_err(|_| {
                            LineaError::internal("record does not fit in an empty overflow page")
                        })?;
                        PageMut::new(chain[idx].data_mut()).set_overflow(new_id.as_u64());
                        chain.push(new_guard);
                        return Ok(());
                    }
                    Err(other) => return Err(other),
                }
            }
            idx += 1;
        }
        Err(LineaError::internal("chain tail did not accept the record"))
    }
}

impl Drop for ChainStore {
    fn drop(&mut self) {
        if let Err(error) = self.buffer.flush_all() {
            tracing::warn!(%error, "failed to write back dirty pages on shutdown");
        }
    }
}

impl std::fmt::Debug for ChainStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChainStore")
            .field("pages", &self.model.page_count())
            .field("memtable_bytes", &self.memtable_usage())
            .finish()
    }
}
