//! The buffer pool manager.
//!
//! Owns the frame array, the page table, the ARC replacer, and the disk
//! scheduler. Hands out latch-owning page guards.
//!
//! Locking protocol: all metadata (page table, free list, replacer) sits
//! behind one mutex; page bytes sit behind per-frame latches. A thread
//! never blocks on a contended latch while holding the metadata mutex:
//! the only latch taken under the mutex is the victim frame's, which is
//! uncontended because its pin count is zero. Disk waits happen with at
//! most that one latch held.

use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::lock_api::ArcRwLockWriteGuard;
use parking_lot::Mutex;
use tracing::debug;
use vellum_common::constants::PAGE_SIZE;
use vellum_common::error::{StorageError, StorageResult};
use vellum_common::types::{FrameId, PageId};

use super::config::BufferPoolConfig;
use super::frame::BufferFrame;
use super::latch::{PageLatchWrite, ReadPageGuard, WritePageGuard};
use super::replacer::{AccessType, ArcReplacer};
use crate::disk::{DiskManager, DiskScheduler, PromiseFuture};

/// Metadata shared between the manager and its guards.
pub(crate) struct PoolState {
    pub(crate) page_table: HashMap<PageId, FrameId>,
    pub(crate) free_list: Vec<FrameId>,
    pub(crate) replacer: ArcReplacer,
}

/// Counters exposed by [`BufferPoolManager::stats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BufferPoolStats {
    /// Page requests served from memory.
    pub hits: u64,
    /// Page requests that went to disk.
    pub misses: u64,
    /// Frames recycled through the replacer.
    pub evictions: u64,
    /// Dirty pages written back.
    pub flushes: u64,
}

/// Outcome of locating or loading a frame for a page.
enum Acquired {
    /// The page was resident; the caller still has to latch it.
    Resident(Arc<BufferFrame>),
    /// The page was loaded into a frame that is still write-latched.
    Filled(Arc<BufferFrame>, PageLatchWrite),
}

/// The buffer pool manager.
pub struct BufferPoolManager {
    frames: Vec<Arc<BufferFrame>>,
    state: Arc<Mutex<PoolState>>,
    scheduler: DiskScheduler,
    next_page_id: AtomicU32,
    hit_count: AtomicU64,
    miss_count: AtomicU64,
    eviction_count: AtomicU64,
    flush_count: AtomicU64,
}

impl BufferPoolManager {
    /// Creates a pool over the given disk manager.
    pub fn new(config: BufferPoolConfig, disk: Arc<dyn DiskManager>) -> StorageResult<Self> {
        config.validate()?;
        let num_frames = config.num_frames;

        let frames: Vec<Arc<BufferFrame>> = (0..num_frames)
            .map(|i| Arc::new(BufferFrame::new(FrameId::new(i))))
            .collect();
        // Pop order is irrelevant; reversed so frame 0 goes out first.
        let free_list: Vec<FrameId> = (0..num_frames).rev().map(FrameId::new).collect();

        Ok(Self {
            frames,
            state: Arc::new(Mutex::new(PoolState {
                page_table: HashMap::with_capacity(num_frames),
                free_list,
                replacer: ArcReplacer::new(num_frames),
            })),
            scheduler: DiskScheduler::new(disk),
            next_page_id: AtomicU32::new(0),
            hit_count: AtomicU64::new(0),
            miss_count: AtomicU64::new(0),
            eviction_count: AtomicU64::new(0),
            flush_count: AtomicU64::new(0),
        })
    }

    /// Convenience constructor with just a frame count.
    pub fn with_pool_size(num_frames: usize, disk: Arc<dyn DiskManager>) -> StorageResult<Self> {
        Self::new(BufferPoolConfig::new(num_frames), disk)
    }

    /// Number of frames in the pool.
    pub fn num_frames(&self) -> usize {
        self.frames.len()
    }

    /// Allocates a fresh page and returns it write-latched, zeroed, dirty,
    /// and pinned once.
    pub fn new_page(&self) -> StorageResult<WritePageGuard> {
        let page_id = PageId::new(self.next_page_id.fetch_add(1, Ordering::Relaxed));

        let mut state = self.state.lock();
        let (frame, mut latch, pending_write) =
            self.grab_frame(&mut state, page_id, AccessType::Unknown)?;
        drop(state);

        if let Some(write) = pending_write {
            write.wait()?;
        }

        latch.fill(0);
        frame.set_dirty(true);
        Ok(WritePageGuard::new(
            page_id,
            frame,
            Arc::clone(&self.state),
            latch,
        ))
    }

    /// Returns a shared-latch guard over the page, fetching it from disk if
    /// necessary.
    pub fn read_page(&self, page_id: PageId) -> StorageResult<ReadPageGuard> {
        self.read_page_with(page_id, AccessType::Unknown)
    }

    /// [`read_page`](Self::read_page) with an explicit access classification.
    pub fn read_page_with(
        &self,
        page_id: PageId,
        access: AccessType,
    ) -> StorageResult<ReadPageGuard> {
        match self.acquire(page_id, access)? {
            Acquired::Resident(frame) => {
                let latch = frame.buffer().read_arc();
                Ok(ReadPageGuard::new(
                    page_id,
                    frame,
                    Arc::clone(&self.state),
                    latch,
                ))
            }
            Acquired::Filled(frame, latch) => {
                let latch = ArcRwLockWriteGuard::downgrade(latch);
                Ok(ReadPageGuard::new(
                    page_id,
                    frame,
                    Arc::clone(&self.state),
                    latch,
                ))
            }
        }
    }

    /// Returns an exclusive-latch guard over the page, fetching it from disk
    /// if necessary.
    pub fn write_page(&self, page_id: PageId) -> StorageResult<WritePageGuard> {
        self.write_page_with(page_id, AccessType::Unknown)
    }

    /// [`write_page`](Self::write_page) with an explicit access classification.
    pub fn write_page_with(
        &self,
        page_id: PageId,
        access: AccessType,
    ) -> StorageResult<WritePageGuard> {
        let (frame, latch) = match self.acquire(page_id, access)? {
            Acquired::Resident(frame) => {
                let latch = frame.buffer().write_arc();
                (frame, latch)
            }
            Acquired::Filled(frame, latch) => (frame, latch),
        };
        Ok(WritePageGuard::new(
            page_id,
            frame,
            Arc::clone(&self.state),
            latch,
        ))
    }

    /// Drops the page from the pool and unlinks it on disk.
    ///
    /// The page must be unpinned. Its id is never reused.
    pub fn delete_page(&self, page_id: PageId) -> StorageResult<()> {
        {
            let mut state = self.state.lock();
            if let Some(&fid) = state.page_table.get(&page_id) {
                let frame = &self.frames[fid.index()];
                if frame.pin_count() > 0 {
                    return Err(StorageError::PagePinned(page_id));
                }
                state.page_table.remove(&page_id);
                state.replacer.remove(fid);
                frame.reset();
                state.free_list.push(fid);
            }
        }
        self.scheduler.schedule_delete(page_id);
        Ok(())
    }

    /// Writes the page back to disk if it is resident and dirty.
    pub fn flush_page(&self, page_id: PageId) -> StorageResult<()> {
        // Pin without recording an access; flushing is not a touch.
        let frame = {
            let mut state = self.state.lock();
            match state.page_table.get(&page_id) {
                Some(&fid) => {
                    let frame = Arc::clone(&self.frames[fid.index()]);
                    if frame.pin() == 1 {
                        state.replacer.set_evictable(fid, false);
                    }
                    frame
                }
                None => return Ok(()),
            }
        };

        let result = if frame.is_dirty() {
            let data = {
                let latch = frame.buffer().read();
                Bytes::copy_from_slice(&latch)
            };
            let result = self.write_back(page_id, data);
            if result.is_ok() {
                frame.set_dirty(false);
            }
            result
        } else {
            Ok(())
        };

        let mut state = self.state.lock();
        if frame.unpin() == 0 {
            state.replacer.set_evictable(frame.frame_id(), true);
        }
        result
    }

    /// Flushes every resident dirty page.
    pub fn flush_all_pages(&self) -> StorageResult<()> {
        let page_ids: Vec<PageId> = {
            let state = self.state.lock();
            state.page_table.keys().copied().collect()
        };
        for page_id in page_ids {
            self.flush_page(page_id)?;
        }
        Ok(())
    }

    /// Observational pin count; `None` if the page is not resident.
    pub fn pin_count(&self, page_id: PageId) -> Option<u32> {
        let state = self.state.lock();
        state
            .page_table
            .get(&page_id)
            .map(|fid| self.frames[fid.index()].pin_count())
    }

    /// Returns cumulative counters.
    pub fn stats(&self) -> BufferPoolStats {
        BufferPoolStats {
            hits: self.hit_count.load(Ordering::Relaxed),
            misses: self.miss_count.load(Ordering::Relaxed),
            evictions: self.eviction_count.load(Ordering::Relaxed),
            flushes: self.flush_count.load(Ordering::Relaxed),
        }
    }

    // -------------------------------------------------------------------------
    // Private helpers
    // -------------------------------------------------------------------------

    /// Pins the page's frame, loading it from disk on a miss.
    fn acquire(&self, page_id: PageId, access: AccessType) -> StorageResult<Acquired> {
        let mut state = self.state.lock();
        if let Some(&fid) = state.page_table.get(&page_id) {
            let frame = Arc::clone(&self.frames[fid.index()]);
            if frame.pin() == 1 {
                state.replacer.set_evictable(fid, false);
            }
            state.replacer.record_access(fid, page_id, access);
            self.hit_count.fetch_add(1, Ordering::Relaxed);
            return Ok(Acquired::Resident(frame));
        }

        self.miss_count.fetch_add(1, Ordering::Relaxed);
        let (frame, mut latch, pending_write) = self.grab_frame(&mut state, page_id, access)?;
        drop(state);

        if let Some(write) = pending_write {
            write.wait()?;
        }

        // A failed read would leave the pool in a state no caller can
        // reason about, so it is fatal.
        let data = self
            .scheduler
            .schedule_read(page_id)
            .wait()
            .unwrap_or_else(|e| panic!("disk read of page {page_id} failed: {e}"));
        latch.copy_from_slice(&data);
        frame.set_dirty(false);

        Ok(Acquired::Filled(frame, latch))
    }

    /// Obtains a frame for `page_id`: from the free list, or by evicting.
    ///
    /// Returns the frame write-latched and pinned once, plus the pending
    /// write-back of the evicted page when that page was dirty. The write
    /// is scheduled before the metadata mutex is released, so the single
    /// FIFO disk queue orders it ahead of any later re-read of the victim;
    /// the caller awaits the promise after unlocking. The latch acquisition
    /// cannot block because the victim's pin count is zero.
    fn grab_frame(
        &self,
        state: &mut PoolState,
        page_id: PageId,
        access: AccessType,
    ) -> StorageResult<(
        Arc<BufferFrame>,
        PageLatchWrite,
        Option<PromiseFuture<io::Result<()>>>,
    )> {
        let fid = match state.free_list.pop() {
            Some(fid) => fid,
            None => state
                .replacer
                .evict()
                .ok_or(StorageError::PoolExhausted)?,
        };
        let frame = Arc::clone(&self.frames[fid.index()]);
        let latch = frame
            .buffer()
            .try_write_arc()
            .unwrap_or_else(|| panic!("unpinned frame {fid:?} still latched"));

        let mut pending_write = None;
        let old_page = frame.page_id();
        if old_page.is_valid() {
            state.page_table.remove(&old_page);
            if frame.is_dirty() {
                let data = Bytes::copy_from_slice(&latch);
                pending_write = Some(self.scheduler.schedule_write(old_page, data));
                self.flush_count.fetch_add(1, Ordering::Relaxed);
            }
            self.eviction_count.fetch_add(1, Ordering::Relaxed);
            debug!(victim = %old_page, incoming = %page_id, "evicting page");
        }

        frame.reset();
        frame.set_page_id(page_id);
        frame.pin();
        state.page_table.insert(page_id, fid);
        state.replacer.record_access(fid, page_id, access);
        state.replacer.set_evictable(fid, false);

        Ok((frame, latch, pending_write))
    }

    fn write_back(&self, page_id: PageId, data: Bytes) -> StorageResult<()> {
        debug_assert_eq!(data.len(), PAGE_SIZE);
        self.scheduler.schedule_write(page_id, data).wait()?;
        self.flush_count.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

impl std::fmt::Debug for BufferPoolManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferPoolManager")
            .field("num_frames", &self.frames.len())
            .field("stats", &self.stats())
            .finish()
    }
}
