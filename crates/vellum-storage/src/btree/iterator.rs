//! Tombstone-skipping forward iterator over the leaf chain.

use std::sync::Arc;

use vellum_common::types::{PageId, Rid};

use crate::buffer::{BufferPoolManager, ReadPageGuard};
use crate::page::{IndexKey, LeafView};

/// Forward cursor over a B+ tree's leaves.
///
/// Holds a read latch on the current leaf only; crossing a leaf boundary
/// drops the old guard before acquiring the next, so iteration never holds
/// two latches. Because of that, scans are not linearizable against
/// concurrent mutators; callers wanting a stable view must serialize
/// externally.
pub struct IndexIterator<const T: usize> {
    bpm: Arc<BufferPoolManager>,
    guard: Option<ReadPageGuard>,
    page_id: PageId,
    index: usize,
}

impl<const T: usize> IndexIterator<T> {
    /// Positions a cursor at `index` within the latched leaf, then skips
    /// forward past tombstones and exhausted pages.
    pub(crate) fn new(bpm: Arc<BufferPoolManager>, guard: ReadPageGuard, index: usize) -> Self {
        let page_id = guard.page_id();
        let mut iter = Self {
            bpm,
            guard: Some(guard),
            page_id,
            index,
        };
        iter.skip_forward();
        iter
    }

    /// The exhausted sentinel.
    pub(crate) fn end(bpm: Arc<BufferPoolManager>) -> Self {
        Self {
            bpm,
            guard: None,
            page_id: PageId::INVALID,
            index: 0,
        }
    }

    /// Whether the cursor is past the last entry.
    pub fn is_end(&self) -> bool {
        !self.page_id.is_valid()
    }

    /// Advances until the cursor sits on a live entry or reaches the end.
    fn skip_forward(&mut self) {
        while self.page_id.is_valid() {
            let Some(guard) = self.guard.as_ref() else {
                self.page_id = PageId::INVALID;
                return;
            };

            let (size, next, tombstoned) = {
                let leaf = LeafView::<_, T>::new(guard.data());
                let size = leaf.size();
                let tombstoned = self.index < size && leaf.is_tombstone(self.index);
                (size, leaf.next_page_id(), tombstoned)
            };

            if self.index >= size {
                // Old latch drops before the next is acquired.
                self.guard = None;
                if next.is_valid() {
                    match self.bpm.read_page(next) {
                        Ok(next_guard) => {
                            self.guard = Some(next_guard);
                            self.page_id = next;
                            self.index = 0;
                            continue;
                        }
                        Err(_) => {
                            self.page_id = PageId::INVALID;
                            self.index = 0;
                            return;
                        }
                    }
                }
                self.page_id = PageId::INVALID;
                self.index = 0;
                return;
            }

            if tombstoned {
                self.index += 1;
            } else {
                return;
            }
        }
    }
}

impl<const T: usize> Iterator for IndexIterator<T> {
    type Item = (IndexKey, Rid);

    fn next(&mut self) -> Option<Self::Item> {
        if self.is_end() {
            return None;
        }
        let item = {
            let guard = self.guard.as_ref()?;
            let leaf = LeafView::<_, T>::new(guard.data());
            (leaf.key_at(self.index), leaf.rid_at(self.index))
        };
        self.index += 1;
        self.skip_forward();
        Some(item)
    }
}

impl<const T: usize> std::fmt::Debug for IndexIterator<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexIterator")
            .field("page_id", &self.page_id)
            .field("index", &self.index)
            .finish()
    }
}
