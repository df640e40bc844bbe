//! Page-granular persistence.
//!
//! `DiskManager` is the boundary the rest of the engine sees: numbered
//! fixed-size blocks that can be read, written, and unlinked. The file
//! variant backs a real database file; the in-memory variant backs unit
//! tests with an unbounded page count.

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;

use parking_lot::Mutex;
use vellum_common::constants::PAGE_SIZE;
use vellum_common::types::PageId;

/// Persists numbered fixed-size pages to backing store.
pub trait DiskManager: Send + Sync {
    /// Reads the page into `dst`. Pages never written are all zeroes.
    fn read_page(&self, page_id: PageId, dst: &mut [u8]) -> io::Result<()>;

    /// Writes the page from `src`.
    fn write_page(&self, page_id: PageId, src: &[u8]) -> io::Result<()>;

    /// Unlinks the page. Its id is never handed out again.
    fn delete_page(&self, page_id: PageId) -> io::Result<()>;
}

/// Disk manager backed by a single data file.
///
/// Page `n` lives at byte offset `n * PAGE_SIZE`. Reads past the end of the
/// file zero-fill, so freshly allocated pages read back as zeroes before
/// their first flush.
pub struct FileDiskManager {
    file: Mutex<File>,
}

impl FileDiskManager {
    /// Opens (or creates) the data file at `path`.
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }

    fn offset(page_id: PageId) -> u64 {
        page_id.as_u32() as u64 * PAGE_SIZE as u64
    }
}

impl DiskManager for FileDiskManager {
    fn read_page(&self, page_id: PageId, dst: &mut [u8]) -> io::Result<()> {
        debug_assert_eq!(dst.len(), PAGE_SIZE);
        let mut file = self.file.lock();
        let len = file.metadata()?.len();
        let offset = Self::offset(page_id);
        if offset >= len {
            dst.fill(0);
            return Ok(());
        }
        file.seek(SeekFrom::Start(offset))?;
        let mut filled = 0;
        while filled < dst.len() {
            match file.read(&mut dst[filled..])? {
                0 => break,
                n => filled += n,
            }
        }
        dst[filled..].fill(0);
        Ok(())
    }

    fn write_page(&self, page_id: PageId, src: &[u8]) -> io::Result<()> {
        debug_assert_eq!(src.len(), PAGE_SIZE);
        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(Self::offset(page_id)))?;
        file.write_all(src)?;
        file.flush()
    }

    fn delete_page(&self, _page_id: PageId) -> io::Result<()> {
        // Space reclamation is out of scope; the id is simply retired.
        Ok(())
    }
}

/// In-memory disk manager for tests.
pub struct MemoryDiskManager {
    pages: Mutex<HashMap<PageId, Box<[u8]>>>,
}

impl MemoryDiskManager {
    /// Creates an empty in-memory disk.
    pub fn new() -> Self {
        Self {
            pages: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the number of pages ever written.
    pub fn page_count(&self) -> usize {
        self.pages.lock().len()
    }
}

impl Default for MemoryDiskManager {
    fn default() -> Self {
        Self::new()
    }
}

impl DiskManager for MemoryDiskManager {
    fn read_page(&self, page_id: PageId, dst: &mut [u8]) -> io::Result<()> {
        debug_assert_eq!(dst.len(), PAGE_SIZE);
        let pages = self.pages.lock();
        match pages.get(&page_id) {
            Some(data) => dst.copy_from_slice(data),
            None => dst.fill(0),
        }
        Ok(())
    }

    fn write_page(&self, page_id: PageId, src: &[u8]) -> io::Result<()> {
        debug_assert_eq!(src.len(), PAGE_SIZE);
        self.pages.lock().insert(page_id, src.into());
        Ok(())
    }

    fn delete_page(&self, page_id: PageId) -> io::Result<()> {
        self.pages.lock().remove(&page_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn memory_round_trip() {
        let disk = MemoryDiskManager::new();
        let mut page = [0u8; PAGE_SIZE];
        page[0..4].copy_from_slice(&[1, 2, 3, 4]);
        disk.write_page(PageId::new(3), &page).unwrap();

        let mut out = [0u8; PAGE_SIZE];
        disk.read_page(PageId::new(3), &mut out).unwrap();
        assert_eq!(&out[0..4], &[1, 2, 3, 4]);
    }

    #[test]
    fn memory_unwritten_page_reads_zeroes() {
        let disk = MemoryDiskManager::new();
        let mut out = [7u8; PAGE_SIZE];
        disk.read_page(PageId::new(9), &mut out).unwrap();
        assert!(out.iter().all(|&b| b == 0));
    }

    #[test]
    fn file_round_trip() {
        let dir = tempdir().unwrap();
        let disk = FileDiskManager::open(dir.path().join("data.db")).unwrap();

        let mut page = [0u8; PAGE_SIZE];
        page[100] = 0xAB;
        disk.write_page(PageId::new(5), &page).unwrap();

        let mut out = [0u8; PAGE_SIZE];
        disk.read_page(PageId::new(5), &mut out).unwrap();
        assert_eq!(out[100], 0xAB);

        // Page 0 was never written; it sits inside the file's extent but
        // must still read back as zeroes.
        disk.read_page(PageId::new(0), &mut out).unwrap();
        assert!(out.iter().all(|&b| b == 0));
    }

    #[test]
    fn file_read_past_eof_zero_fills() {
        let dir = tempdir().unwrap();
        let disk = FileDiskManager::open(dir.path().join("data.db")).unwrap();
        let mut out = [1u8; PAGE_SIZE];
        disk.read_page(PageId::new(100), &mut out).unwrap();
        assert!(out.iter().all(|&b| b == 0));
    }

    #[test]
    fn memory_delete_removes_page() {
        let disk = MemoryDiskManager::new();
        let page = [9u8; PAGE_SIZE];
        disk.write_page(PageId::new(1), &page).unwrap();
        assert_eq!(disk.page_count(), 1);
        disk.delete_page(PageId::new(1)).unwrap();
        assert_eq!(disk.page_count(), 0);
    }
}
