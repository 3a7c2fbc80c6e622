//! Buffer frames and fix guards.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use parking_lot::lock_api::{ArcRwLockReadGuard, ArcRwLockWriteGuard};
use parking_lot::{RawRwLock, RwLock};

use linea_common::PageId;

use crate::page::Page;

type SharedGuard = ArcRwLockReadGuard<RawRwLock, Vec<u8>>;
type ExclusiveGuard = ArcRwLockWriteGuard<RawRwLock, Vec<u8>>;

/// A slot in the buffer pool holding one page in memory.
///
/// The page bytes sit behind a reader/writer lock; fixing a page acquires
/// that lock (shared or exclusive) and pins the frame. The dirty flag is
/// raised at unfix time and lowered by write-back.
pub struct BufferFrame {
    page_id: PageId,
    data: Arc<RwLock<Vec<u8>>>,
    pin_count: AtomicU32,
    dirty: AtomicBool,
}

impl BufferFrame {
    /// Creates a frame holding `data` for `page_id`.
    pub(crate) fn new(page_id: PageId, data: Vec<u8>) -> Self {
        Self {
            page_id,
            data: Arc::new(RwLock::new(data)),
            pin_count: AtomicU32::new(0),
            dirty: AtomicBool::new(false),
        }
    }

    /// Returns the page this frame holds.
    #[inline]
    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    /// Increments the pin count.
    #[inline]
    pub(crate) fn pin(&self) {
        self.pin_count.fetch_add(1, Ordering::AcqRel);
    }

    /// Decrements the pin count.
    #[inline]
    pub(crate) fn unpin(&self) {
        let old = self.pin_count.fetch_sub(1, Ordering::AcqRel);
        debug_assert!(old > 0, "unpinned frame with pin_count = 0");
    }

    /// Returns the current pin count.
    #[inline]
    pub fn pin_count(&self) -> u32 {
        self.pin_count.load(Ordering::Acquire)
    }

    /// Returns true if the frame holds unwritten modifications.
    #[inline]
    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }

    /// Sets or clears the dirty flag.
    #[inline]
    pub(crate) fn set_dirty(&self, dirty: bool) {
        self.dirty.store(dirty, Ordering::Release);
    }

    /// Acquires the frame's data lock, shared or exclusive.
    pub(crate) fn lock(self: &Arc<Self>, exclusive: bool) -> FrameGuard {
        self.pin();
        let lock = if exclusive {
            FrameLock::Exclusive(self.data.write_arc())
        } else {
            FrameLock::Shared(self.data.read_arc())
        };
        FrameGuard {
            frame: Arc::clone(self),
            lock,
        }
    }

    /// Locks the data shared without pinning through a guard; used by
    /// write-back.
    pub(crate) fn read_data(&self) -> parking_lot::RwLockReadGuard<'_, Vec<u8>> {
        self.data.read()
    }
}

impl std::fmt::Debug for BufferFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferFrame")
            .field("page_id", &self.page_id)
            .field("pin_count", &self.pin_count())
            .field("dirty", &self.is_dirty())
            .finish()
    }
}

enum FrameLock {
    Shared(SharedGuard),
    Exclusive(ExclusiveGuard),
}

/// A fixed page: holds the frame's lock and pin until unfixed or dropped.
///
/// Every fix is paired with an unfix on every exit path - dropping the
/// guard releases the lock and the pin, so an early `?` return cannot leak
/// a fixed frame.
pub struct FrameGuard {
    frame: Arc<BufferFrame>,
    lock: FrameLock,
}

impl FrameGuard {
    /// Returns the fixed page's ID.
    #[inline]
    pub fn page_id(&self) -> PageId {
        self.frame.page_id()
    }

    /// Returns true if the guard holds the exclusive lock.
    #[inline]
    pub fn is_exclusive(&self) -> bool {
        matches!(self.lock, FrameLock::Exclusive(_))
    }

    /// Returns the page bytes.
    pub fn data(&self) -> &[u8] {
        match &self.lock {
            FrameLock::Shared(guard) => guard,
            FrameLock::Exclusive(guard) => guard,
        }
    }

    /// Returns the page bytes mutably.
    ///
    /// # Panics
    ///
    /// Panics if the guard is not exclusive.
    pub fn data_mut(&mut self) -> &mut [u8] {
        match &mut self.lock {
            FrameLock::Exclusive(guard) => guard,
            FrameLock::Shared(_) => panic!("data_mut on a shared fix"),
        }
    }

    /// Returns a page view over the frame's bytes.
    pub fn page(&self) -> Page<'_> {
        Page::new(self.data())
    }

    /// Raises the frame's dirty flag.
    pub(crate) fn mark_dirty(&self) {
        self.frame.set_dirty(true);
    }
}

impl Drop for FrameGuard {
    fn drop(&mut self) {
        self.frame.unpin();
    }
}

impl std::fmt::Debug for FrameGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameGuard")
            .field("page_id", &self.page_id())
            .field("exclusive", &self.is_exclusive())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use linea_common::constants::PAGE_SIZE;

    #[test]
    fn test_pin_released_on_drop() {
        let frame = Arc::new(BufferFrame::new(PageId::new(1), vec![0u8; PAGE_SIZE]));
        {
            let _guard = frame.lock(false);
            assert_eq!(frame.pin_count(), 1);
            let _second = frame.lock(false);
            assert_eq!(frame.pin_count(), 2);
        }
        assert_eq!(frame.pin_count(), 0);
    }

    #[test]
    fn test_exclusive_guard_mutates() {
        let frame = Arc::new(BufferFrame::new(PageId::new(1), vec![0u8; PAGE_SIZE]));
        {
            let mut guard = frame.lock(true);
            guard.data_mut()[0] = 0xEE;
            guard.mark_dirty();
        }
        assert!(frame.is_dirty());
        assert_eq!(frame.read_data()[0], 0xEE);
    }

    #[test]
    #[should_panic(expected = "data_mut on a shared fix")]
    fn test_shared_guard_rejects_mutation() {
        let frame = Arc::new(BufferFrame::new(PageId::new(1), vec![0u8; PAGE_SIZE]));
        let mut guard = frame.lock(false);
        let _ = guard.data_mut();
    }

    #[test]
    fn test_exclusive_blocks_readers() {
        let frame = Arc::new(BufferFrame::new(PageId::new(1), vec![0u8; PAGE_SIZE]));
        let guard = frame.lock(true);

        let contender = Arc::clone(&frame);
        let handle = std::thread::spawn(move || {
            let _read = contender.lock(false);
            true
        });

        // The reader cannot finish while the exclusive guard is held.
        std::thread::sleep(std::time::Duration::from_millis(50));
        assert!(!handle.is_finished());
        drop(guard);
        assert!(handle.join().unwrap());
    }
}
