//! Buffer frame: a slot in the buffer pool that holds one page.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use vellum_common::constants::PAGE_SIZE;
use vellum_common::types::{FrameId, PageId};

/// A buffer frame holds a single page in memory.
///
/// The page bytes sit behind a reader-writer latch shared with the page
/// guards; the bookkeeping (page id, pin count, dirty flag) uses atomics so
/// it can be inspected without taking the latch.
pub struct BufferFrame {
    /// Frame ID (index in the frame array).
    frame_id: FrameId,
    /// Page data, latched by guards for their whole lifetime.
    data: Arc<RwLock<Vec<u8>>>,
    /// Page currently held, or `PageId::INVALID` when empty.
    page_id: AtomicU32,
    /// Number of live references.
    pin_count: AtomicU32,
    /// Whether the page was modified since its last flush.
    dirty: AtomicBool,
}

impl BufferFrame {
    /// Creates an empty frame.
    pub fn new(frame_id: FrameId) -> Self {
        Self {
            frame_id,
            data: Arc::new(RwLock::new(vec![0u8; PAGE_SIZE])),
            page_id: AtomicU32::new(PageId::INVALID.as_u32()),
            pin_count: AtomicU32::new(0),
            dirty: AtomicBool::new(false),
        }
    }

    /// Returns the frame ID.
    #[inline]
    pub fn frame_id(&self) -> FrameId {
        self.frame_id
    }

    /// Returns the page held by this frame.
    #[inline]
    pub fn page_id(&self) -> PageId {
        PageId::new(self.page_id.load(Ordering::Acquire))
    }

    /// Assigns a page to this frame.
    #[inline]
    pub fn set_page_id(&self, page_id: PageId) {
        self.page_id.store(page_id.as_u32(), Ordering::Release);
    }

    /// Returns true if no page is assigned.
    #[inline]
    pub fn is_empty(&self) -> bool {
        !self.page_id().is_valid()
    }

    /// Returns the current pin count.
    #[inline]
    pub fn pin_count(&self) -> u32 {
        self.pin_count.load(Ordering::Acquire)
    }

    /// Increments the pin count, returning the new value.
    #[inline]
    pub fn pin(&self) -> u32 {
        self.pin_count.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Decrements the pin count, returning the new value.
    #[inline]
    pub fn unpin(&self) -> u32 {
        let old = self.pin_count.fetch_sub(1, Ordering::AcqRel);
        debug_assert!(old > 0, "unpinned frame with pin_count = 0");
        old - 1
    }

    /// Returns true if the frame is dirty.
    #[inline]
    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }

    /// Sets the dirty flag.
    #[inline]
    pub fn set_dirty(&self, dirty: bool) {
        self.dirty.store(dirty, Ordering::Release);
    }

    /// Returns the shared handle to the page latch.
    #[inline]
    pub(crate) fn buffer(&self) -> &Arc<RwLock<Vec<u8>>> {
        &self.data
    }

    /// Resets the frame to its empty state.
    pub fn reset(&self) {
        self.page_id
            .store(PageId::INVALID.as_u32(), Ordering::Release);
        self.pin_count.store(0, Ordering::Release);
        self.dirty.store(false, Ordering::Release);
    }
}

impl std::fmt::Debug for BufferFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferFrame")
            .field("frame_id", &self.frame_id)
            .field("page_id", &self.page_id())
            .field("pin_count", &self.pin_count())
            .field("dirty", &self.is_dirty())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_frame_is_empty() {
        let frame = BufferFrame::new(FrameId::new(0));
        assert!(frame.is_empty());
        assert_eq!(frame.pin_count(), 0);
        assert!(!frame.is_dirty());
    }

    #[test]
    fn pin_unpin_counts() {
        let frame = BufferFrame::new(FrameId::new(0));
        assert_eq!(frame.pin(), 1);
        assert_eq!(frame.pin(), 2);
        assert_eq!(frame.unpin(), 1);
        assert_eq!(frame.unpin(), 0);
    }

    #[test]
    fn reset_clears_state() {
        let frame = BufferFrame::new(FrameId::new(3));
        frame.set_page_id(PageId::new(9));
        frame.pin();
        frame.set_dirty(true);

        frame.reset();
        assert!(frame.is_empty());
        assert_eq!(frame.pin_count(), 0);
        assert!(!frame.is_dirty());
    }

    #[test]
    fn latch_guards_data() {
        let frame = BufferFrame::new(FrameId::new(0));
        {
            let mut data = frame.buffer().write();
            data[0..4].copy_from_slice(&[1, 2, 3, 4]);
        }
        let data = frame.buffer().read();
        assert_eq!(&data[0..4], &[1, 2, 3, 4]);
    }
}
