//! The buffer manager: an in-memory pool of page frames.
//!
//! Fixing a page pins its frame and takes the frame's reader/writer lock;
//! the returned [`FrameGuard`] releases both when unfixed or dropped.
//! Frames persist until written back - eviction is not this engine's
//! concern, mutual exclusion on chains is, and that is carried entirely by
//! the per-frame locks.

mod frame;

pub use frame::{BufferFrame, FrameGuard};

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use linea_common::constants::PAGE_SIZE;
use linea_common::{LineaResult, PageId};

use crate::file::PageFileManager;

/// Manages the in-memory buffer of pages backed by the page file.
pub struct BufferManager {
    file: PageFileManager,
    frames: RwLock<HashMap<PageId, Arc<BufferFrame>>>,
}

impl BufferManager {
    /// Creates a buffer manager over the given page file.
    #[must_use]
    pub fn new(file: PageFileManager) -> Self {
        Self {
            file,
            frames: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the underlying file manager.
    #[inline]
    pub fn file_manager(&self) -> &PageFileManager {
        &self.file
    }

    /// Fixes the page `page_id`, blocking until the requested lock mode is
    /// available. Newly allocated pages skip the disk read; their frames
    /// start zeroed.
    pub fn fix_page(
        &self,
        page_id: PageId,
        exclusive: bool,
        is_newly_allocated: bool,
    ) -> LineaResult<FrameGuard> {
        let frame = {
            let mut frames = self.frames.write();
            match frames.get(&page_id) {
                Some(frame) => Arc::clone(frame),
                None => {
                    let mut data = vec![0u8; PAGE_SIZE];
                    if !is_newly_allocated {
                        self.file.read_page(page_id, &mut data)?;
                    }
                    let frame = Arc::new(BufferFrame::new(page_id, data));
                    frames.insert(page_id, Arc::clone(&frame));
                    frame
                }
            }
        };
        Ok(frame.lock(exclusive))
    }

    /// Unfixes a page, recording whether it was modified.
    pub fn unfix(&self, guard: FrameGuard, is_dirty: bool) {
        if is_dirty {
            guard.mark_dirty();
        }
        drop(guard);
    }

    /// Writes every dirty frame back to the page file.
    pub fn flush_all(&self) -> LineaResult<()> {
        let dirty: Vec<Arc<BufferFrame>> = self
            .frames
            .read()
            .values()
            .filter(|frame| frame.is_dirty())
            .map(Arc::clone)
            .collect();
        for frame in dirty {
            let data = frame.read_data();
            self.file.write_page(frame.page_id(), &data)?;
            frame.set_dirty(false);
        }
        self.file.sync()
    }

    /// Returns the number of frames currently held.
    #[must_use]
    pub fn num_frames(&self) -> usize {
        self.frames.read().len()
    }
}

impl std::fmt::Debug for BufferManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferManager")
            .field("frames", &self.num_frames())
            .finish()
    }
}
