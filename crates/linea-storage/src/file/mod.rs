//! File management and page-granular I/O.
//!
//! Two file shapes exist: the page-chain store keeps all pages in a single
//! page file managed by [`PageFileManager`]; the segmented store keeps one
//! [`SegmentFile`] per size class, each holding fixed-size segments of
//! `2^i` pages. Either can be memory-backed for tests and benchmarks.
//!
//! Reads past the end of a file yield zeroed pages: allocation is a
//! counter bump, and a page that was allocated but never written is
//! indistinguishable from an invalidated one.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use linea_common::constants::PAGE_SIZE;
use linea_common::{LineaResult, PageId};

/// Storage behind a file abstraction: a real file or an in-memory buffer.
enum Backend {
    Disk(Mutex<File>),
    Memory(Mutex<Vec<u8>>),
}

impl Backend {
    fn open_disk(path: &Path) -> LineaResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path)?;
        Ok(Self::Disk(Mutex::new(file)))
    }

    fn len(&self) -> LineaResult<u64> {
        match self {
            Self::Disk(file) => Ok(file.lock().metadata()?.len()),
            Self::Memory(data) => Ok(data.lock().len() as u64),
        }
    }

    /// Reads `buf.len()` bytes at `offset`, zero-filling anything past the
    /// end of the backing store.
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> LineaResult<()> {
        match self {
            Self::Disk(file) => {
                let mut file = file.lock();
                file.seek(SeekFrom::Start(offset))?;
                let mut filled = 0;
                while filled < buf.len() {
                    match file.read(&mut buf[filled..])? {
                        0 => break,
                        n => filled += n,
                    }
                }
                buf[filled..].fill(0);
            }
            Self::Memory(data) => {
                let data = data.lock();
                let offset = offset as usize;
                let available = data.len().saturating_sub(offset).min(buf.len());
                buf[..available].copy_from_slice(&data[offset..offset + available]);
                buf[available..].fill(0);
            }
        }
        Ok(())
    }

    fn write_at(&self, offset: u64, buf: &[u8]) -> LineaResult<()> {
        match self {
            Self::Disk(file) => {
                let mut file = file.lock();
                file.seek(SeekFrom::Start(offset))?;
                file.write_all(buf)?;
            }
            Self::Memory(data) => {
                let mut data = data.lock();
                let end = offset as usize + buf.len();
                if data.len() < end {
                    data.resize(end, 0);
                }
                data[offset as usize..end].copy_from_slice(buf);
            }
        }
        Ok(())
    }

    fn sync(&self) -> LineaResult<()> {
        if let Self::Disk(file) = self {
            file.lock().sync_all()?;
        }
        Ok(())
    }
}

/// Allocates and persists 4 KiB pages in a single file.
pub struct PageFileManager {
    backend: Backend,
    next_page: AtomicU64,
}

impl PageFileManager {
    /// Opens (or creates) the page file at `path`.
    pub fn open(path: impl AsRef<Path>) -> LineaResult<Self> {
        let backend = Backend::open_disk(path.as_ref())?;
        let next_page = backend.len()? / PAGE_SIZE as u64;
        Ok(Self {
            backend,
            next_page: AtomicU64::new(next_page),
        })
    }

    /// Creates a memory-backed page file.
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            backend: Backend::Memory(Mutex::new(Vec::new())),
            next_page: AtomicU64::new(0),
        }
    }

    /// Allocates a fresh page on disk and returns its ID.
    pub fn allocate_page(&self) -> PageId {
        PageId::new(self.next_page.fetch_add(1, Ordering::SeqCst))
    }

    /// Returns the number of pages allocated so far.
    #[must_use]
    pub fn num_pages(&self) -> u64 {
        self.next_page.load(Ordering::SeqCst)
    }

    /// Reads the page `id` into `buf`.
    pub fn read_page(&self, id: PageId, buf: &mut [u8]) -> LineaResult<()> {
        debug_assert_eq!(buf.len(), PAGE_SIZE);
        self.backend.read_at(id.as_u64() * PAGE_SIZE as u64, buf)
    }

    /// Writes the page `id` from `buf`.
    pub fn write_page(&self, id: PageId, buf: &[u8]) -> LineaResult<()> {
        debug_assert_eq!(buf.len(), PAGE_SIZE);
        self.backend.write_at(id.as_u64() * PAGE_SIZE as u64, buf)
    }

    /// Forces written pages to stable storage.
    pub fn sync(&self) -> LineaResult<()> {
        self.backend.sync()
    }
}

/// A file of fixed-size segments, each `pages_per_segment` pages.
pub struct SegmentFile {
    backend: Backend,
    pages_per_segment: usize,
    allocated_segments: AtomicU64,
}

impl SegmentFile {
    /// Opens (or creates) a segment file. When `use_memory` is set the file
    /// is backed by memory instead of `path`.
    pub fn open(
        path: impl AsRef<Path>,
        pages_per_segment: usize,
        use_memory: bool,
    ) -> LineaResult<Self> {
        debug_assert!(pages_per_segment.is_power_of_two());
        let backend = if use_memory {
            Backend::Memory(Mutex::new(Vec::new()))
        } else {
            Backend::open_disk(path.as_ref())?
        };
        let segment_bytes = (pages_per_segment * PAGE_SIZE) as u64;
        let allocated = backend.len()?.div_ceil(segment_bytes);
        Ok(Self {
            backend,
            pages_per_segment,
            allocated_segments: AtomicU64::new(allocated),
        })
    }

    /// Returns the number of pages per segment in this file.
    #[inline]
    #[must_use]
    pub fn pages_per_segment(&self) -> usize {
        self.pages_per_segment
    }

    /// Reserves space for one more segment and returns its byte offset.
    pub fn allocate_segment(&self) -> usize {
        let index = self.allocated_segments.fetch_add(1, Ordering::SeqCst);
        index as usize * self.pages_per_segment * PAGE_SIZE
    }

    /// Reads `buf.len() / PAGE_SIZE` pages starting at `page_offset`.
    pub fn read_pages(&self, page_offset: usize, buf: &mut [u8]) -> LineaResult<()> {
        debug_assert_eq!(buf.len() % PAGE_SIZE, 0);
        self.backend.read_at((page_offset * PAGE_SIZE) as u64, buf)
    }

    /// Writes `buf.len() / PAGE_SIZE` pages starting at `page_offset`.
    pub fn write_pages(&self, page_offset: usize, buf: &[u8]) -> LineaResult<()> {
        debug_assert_eq!(buf.len() % PAGE_SIZE, 0);
        self.backend.write_at((page_offset * PAGE_SIZE) as u64, buf)
    }

    /// Forces written segments to stable storage.
    pub fn sync(&self) -> LineaResult<()> {
        self.backend.sync()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_page_file_round_trip() {
        let dir = TempDir::new().unwrap();
        let manager = PageFileManager::open(dir.path().join("pages")).unwrap();

        let a = manager.allocate_page();
        let b = manager.allocate_page();
        assert_ne!(a, b);

        let data = vec![0x5Au8; PAGE_SIZE];
        manager.write_page(b, &data).unwrap();

        let mut read = vec![0u8; PAGE_SIZE];
        manager.read_page(b, &mut read).unwrap();
        assert_eq!(read, data);

        // Allocated but never written: reads as zeros.
        manager.read_page(a, &mut read).unwrap();
        assert!(read.iter().all(|byte| *byte == 0));
    }

    #[test]
    fn test_page_file_reopen_preserves_allocation() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("pages");
        {
            let manager = PageFileManager::open(&path).unwrap();
            let id = manager.allocate_page();
            manager.write_page(id, &vec![1u8; PAGE_SIZE]).unwrap();
            manager.sync().unwrap();
        }
        let manager = PageFileManager::open(&path).unwrap();
        assert_eq!(manager.num_pages(), 1);
        assert_eq!(manager.allocate_page(), PageId::new(1));
    }

    #[test]
    fn test_memory_backend() {
        let manager = PageFileManager::in_memory();
        let id = manager.allocate_page();
        manager.write_page(id, &vec![7u8; PAGE_SIZE]).unwrap();
        let mut read = vec![0u8; PAGE_SIZE];
        manager.read_page(id, &mut read).unwrap();
        assert_eq!(read[0], 7);
        manager.sync().unwrap();
    }

    #[test]
    fn test_segment_file_allocation() {
        let file = SegmentFile::open("unused", 4, true).unwrap();
        assert_eq!(file.allocate_segment(), 0);
        assert_eq!(file.allocate_segment(), 4 * PAGE_SIZE);

        let data = vec![0xCDu8; 4 * PAGE_SIZE];
        file.write_pages(4, &data).unwrap();
        let mut read = vec![0u8; 4 * PAGE_SIZE];
        file.read_pages(4, &mut read).unwrap();
        assert_eq!(read, data);
    }

    #[test]
    fn test_segment_file_on_disk() {
        let dir = TempDir::new().unwrap();
        let file = SegmentFile::open(dir.path().join("segments-0"), 1, false).unwrap();
        let offset = file.allocate_segment();
        assert_eq!(offset, 0);
        file.write_pages(0, &vec![9u8; PAGE_SIZE]).unwrap();
        file.sync().unwrap();

        let reopened = SegmentFile::open(dir.path().join("segments-0"), 1, false).unwrap();
        assert_eq!(reopened.allocate_segment(), PAGE_SIZE);
    }
}
