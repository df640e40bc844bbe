//! Intermediate result page.
//!
//! Holds variable-length tuples for operators that spill: hash-join
//! partitions and external-sort runs. Slots (one 4-byte offset each) grow
//! upward from the header; tuple payloads, each with a 4-byte length
//! prefix, grow downward from the end of the page.

use vellum_common::constants::PAGE_SIZE;

use super::{read_u32, write_u32, PageType};

const OFFSET_NUM_TUPLES: usize = 4;
const OFFSET_FREE_SPACE: usize = 8;

/// Header size: type byte + padding, tuple count, free-space offset.
pub const INTERMEDIATE_HEADER_SIZE: usize = 12;

/// Size of one slot (payload offset).
pub const INTERMEDIATE_SLOT_SIZE: usize = 4;

/// View over an intermediate result page.
pub struct IntermediateView<B> {
    buf: B,
}

impl<B: AsRef<[u8]>> IntermediateView<B> {
    /// Wraps an initialized intermediate page.
    pub fn new(buf: B) -> Self {
        debug_assert_eq!(
            PageType::of(buf.as_ref()),
            Some(PageType::IntermediateResult)
        );
        Self { buf }
    }

    /// Number of tuples stored.
    #[inline]
    pub fn num_tuples(&self) -> usize {
        read_u32(self.buf.as_ref(), OFFSET_NUM_TUPLES) as usize
    }

    #[inline]
    fn free_space_offset(&self) -> usize {
        read_u32(self.buf.as_ref(), OFFSET_FREE_SPACE) as usize
    }

    /// Returns the tuple bytes at `index`.
    pub fn tuple(&self, index: usize) -> &[u8] {
        debug_assert!(index < self.num_tuples());
        let raw = self.buf.as_ref();
        let slot = INTERMEDIATE_HEADER_SIZE + index * INTERMEDIATE_SLOT_SIZE;
        let offset = read_u32(raw, slot) as usize;
        let len = read_u32(raw, offset) as usize;
        &raw[offset + 4..offset + 4 + len]
    }

    /// Bytes a tuple of `len` payload bytes occupies, slot included.
    pub fn space_needed(len: usize) -> usize {
        4 + len + INTERMEDIATE_SLOT_SIZE
    }
}

impl<B: AsRef<[u8]> + AsMut<[u8]>> IntermediateView<B> {
    /// Initializes a zeroed page as an empty intermediate page.
    pub fn init(mut buf: B) -> Self {
        let raw = buf.as_mut();
        raw[0] = PageType::IntermediateResult as u8;
        write_u32(raw, OFFSET_NUM_TUPLES, 0);
        write_u32(raw, OFFSET_FREE_SPACE, PAGE_SIZE as u32);
        Self { buf }
    }

    /// Appends a tuple; returns false if the page has no room.
    pub fn insert_tuple(&mut self, data: &[u8]) -> bool {
        let n = self.num_tuples();
        let total = 4 + data.len();
        let slots_end = INTERMEDIATE_HEADER_SIZE + (n + 1) * INTERMEDIATE_SLOT_SIZE;
        let free = self.free_space_offset();
        if free < slots_end + total {
            return false;
        }

        let offset = free - total;
        let raw = self.buf.as_mut();
        write_u32(raw, offset, data.len() as u32);
        raw[offset + 4..offset + 4 + data.len()].copy_from_slice(data);
        write_u32(
            raw,
            INTERMEDIATE_HEADER_SIZE + n * INTERMEDIATE_SLOT_SIZE,
            offset as u32,
        );
        write_u32(raw, OFFSET_NUM_TUPLES, (n + 1) as u32);
        write_u32(raw, OFFSET_FREE_SPACE, offset as u32);
        true
    }
}
