//! Page guards: scoped latch + pin over a buffer frame.
//!
//! A guard owns its frame's reader-writer latch for its whole lifetime and
//! releases the latch and the pin exactly once on drop. While any read
//! guard exists for a page no write guard can coexist, and a write guard
//! excludes every other guard. That is the rwlock itself, not convention.

use std::sync::Arc;

use parking_lot::lock_api::{ArcRwLockReadGuard, ArcRwLockWriteGuard};
use parking_lot::{Mutex, RawRwLock};
use vellum_common::types::PageId;

use super::frame::BufferFrame;
use super::pool::PoolState;

pub(crate) type PageLatchRead = ArcRwLockReadGuard<RawRwLock, Vec<u8>>;
pub(crate) type PageLatchWrite = ArcRwLockWriteGuard<RawRwLock, Vec<u8>>;

/// Releases one pin, flipping the frame back to evictable on the last one.
///
/// Must run after the latch has been released.
fn unpin(frame: &BufferFrame, state: &Mutex<PoolState>) {
    let mut state = state.lock();
    if frame.unpin() == 0 {
        state.replacer.set_evictable(frame.frame_id(), true);
    }
}

/// Shared-latch guard over a page.
pub struct ReadPageGuard {
    page_id: PageId,
    frame: Arc<BufferFrame>,
    state: Arc<Mutex<PoolState>>,
    latch: Option<PageLatchRead>,
}

impl ReadPageGuard {
    pub(crate) fn new(
        page_id: PageId,
        frame: Arc<BufferFrame>,
        state: Arc<Mutex<PoolState>>,
        latch: PageLatchRead,
    ) -> Self {
        Self {
            page_id,
            frame,
            state,
            latch: Some(latch),
        }
    }

    /// Returns the guarded page's id.
    #[inline]
    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    /// Returns the page bytes.
    #[inline]
    pub fn data(&self) -> &[u8] {
        self.latch.as_ref().expect("latch held for guard lifetime")
    }
}

impl Drop for ReadPageGuard {
    fn drop(&mut self) {
        self.latch.take();
        unpin(&self.frame, &self.state);
    }
}

impl std::fmt::Debug for ReadPageGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadPageGuard")
            .field("page_id", &self.page_id)
            .field("frame_id", &self.frame.frame_id())
            .finish()
    }
}

/// Exclusive-latch guard over a page.
pub struct WritePageGuard {
    page_id: PageId,
    frame: Arc<BufferFrame>,
    state: Arc<Mutex<PoolState>>,
    latch: Option<PageLatchWrite>,
}

impl WritePageGuard {
    pub(crate) fn new(
        page_id: PageId,
        frame: Arc<BufferFrame>,
        state: Arc<Mutex<PoolState>>,
        latch: PageLatchWrite,
    ) -> Self {
        Self {
            page_id,
            frame,
            state,
            latch: Some(latch),
        }
    }

    /// Returns the guarded page's id.
    #[inline]
    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    /// Returns the page bytes.
    #[inline]
    pub fn data(&self) -> &[u8] {
        self.latch.as_ref().expect("latch held for guard lifetime")
    }

    /// Returns the page bytes mutably, marking the page dirty.
    #[inline]
    pub fn data_mut(&mut self) -> &mut [u8] {
        self.frame.set_dirty(true);
        self.latch.as_mut().expect("latch held for guard lifetime")
    }

    /// Marks the page dirty without touching the bytes.
    #[inline]
    pub fn mark_dirty(&self) {
        self.frame.set_dirty(true);
    }
}

impl Drop for WritePageGuard {
    fn drop(&mut self) {
        self.latch.take();
        unpin(&self.frame, &self.state);
    }
}

impl std::fmt::Debug for WritePageGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WritePageGuard")
            .field("page_id", &self.page_id)
            .field("frame_id", &self.frame.frame_id())
            .finish()
    }
}
