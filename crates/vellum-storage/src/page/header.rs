//! B+ tree header page.
//!
//! Exactly one per tree: holds the root page id. Modifying the root
//! requires the header's write latch, which is what serializes root
//! changes against concurrent traversals.

use vellum_common::types::PageId;

use super::{read_u32, write_u32, PageType};

const OFFSET_ROOT: usize = 4;

/// View over a B+ tree header page.
pub struct HeaderView<B> {
    buf: B,
}

impl<B: AsRef<[u8]>> HeaderView<B> {
    /// Wraps an initialized header page.
    pub fn new(buf: B) -> Self {
        debug_assert_eq!(PageType::of(buf.as_ref()), Some(PageType::Header));
        Self { buf }
    }

    /// Returns the root page id, `PageId::INVALID` for an empty tree.
    #[inline]
    pub fn root_page_id(&self) -> PageId {
        PageId::new(read_u32(self.buf.as_ref(), OFFSET_ROOT))
    }
}

impl<B: AsRef<[u8]> + AsMut<[u8]>> HeaderView<B> {
    /// Initializes a zeroed page as a header with no root.
    pub fn init(mut buf: B) -> Self {
        let raw = buf.as_mut();
        raw[0] = PageType::Header as u8;
        write_u32(raw, OFFSET_ROOT, PageId::INVALID.as_u32());
        Self { buf }
    }

    /// Sets the root page id.
    #[inline]
    pub fn set_root_page_id(&mut self, root: PageId) {
        write_u32(self.buf.as_mut(), OFFSET_ROOT, root.as_u32());
    }
}
