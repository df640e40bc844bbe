//! Table heap: an unordered chain of table pages.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;
use vellum_common::error::StorageResult;
use vellum_common::types::{PageId, Rid};
use vellum_storage::buffer::BufferPoolManager;
use vellum_storage::page::TablePageView;

use crate::tuple::{Tuple, TupleMeta};

/// A table heap storing tuples in a singly linked chain of pages.
///
/// Tuples never move: a rid stays valid for the life of the table, and
/// deletion just flips the slot's meta flag.
pub struct TableHeap {
    bpm: Arc<BufferPoolManager>,
    first_page_id: PageId,
    /// Tail of the chain; appends serialize on this lock.
    last_page_id: Mutex<PageId>,
}

impl TableHeap {
    /// Creates an empty heap with one table page.
    pub fn new(bpm: Arc<BufferPoolManager>) -> StorageResult<Self> {
        let mut guard = bpm.new_page()?;
        TablePageView::init(guard.data_mut());
        let first_page_id = guard.page_id();
        drop(guard);

        Ok(Self {
            bpm,
            first_page_id,
            last_page_id: Mutex::new(first_page_id),
        })
    }

    /// The head of the page chain.
    pub fn first_page_id(&self) -> PageId {
        self.first_page_id
    }

    /// Appends a tuple, growing the chain when the tail page is full.
    /// Returns `None` when no frame can be produced or the tuple can never
    /// fit a page.
    pub fn insert_tuple(&self, meta: TupleMeta, tuple: &Tuple) -> Option<Rid> {
        let mut last = self.last_page_id.lock();

        let mut guard = self.bpm.write_page(*last).ok()?;
        {
            let mut page = TablePageView::new(guard.data_mut());
            if let Some(slot) = page.insert_tuple(meta.into(), tuple.data()) {
                return Some(Rid::new(*last, slot));
            }
        }

        // Tail is full: chain a new page and retry there.
        let mut new_guard = self.bpm.new_page().ok()?;
        let new_page_id = new_guard.page_id();
        let slot = {
            let mut new_page = TablePageView::init(new_guard.data_mut());
            new_page.insert_tuple(meta.into(), tuple.data())?
        };
        {
            let mut old_page = TablePageView::new(guard.data_mut());
            old_page.set_next_page_id(new_page_id);
        }
        *last = new_page_id;
        debug!(page = %new_page_id, "table heap grew");
        Some(Rid::new(new_page_id, slot))
    }

    /// Overwrites a tuple's metadata (the delete path).
    pub fn update_tuple_meta(&self, meta: TupleMeta, rid: Rid) {
        let mut guard = self
            .bpm
            .write_page(rid.page_id)
            .expect("heap page resident for meta update");
        let mut page = TablePageView::new(guard.data_mut());
        page.set_tuple_meta(rid.slot as usize, meta.into());
    }

    /// Fetches a tuple and its metadata.
    pub fn get_tuple(&self, rid: Rid) -> Option<(TupleMeta, Tuple)> {
        let guard = self.bpm.read_page(rid.page_id).ok()?;
        let page = TablePageView::new(guard.data());
        if rid.slot as usize >= page.tuple_count() {
            return None;
        }
        let meta = page.tuple_meta(rid.slot as usize);
        let mut tuple = Tuple::from_bytes(page.tuple_data(rid.slot as usize).to_vec());
        tuple.set_rid(rid);
        Some((meta.into(), tuple))
    }

    /// The position one past the heap's current last tuple.
    ///
    /// Scans bound themselves to this at creation so tuples they insert
    /// behind themselves are never revisited (the classic self-update
    /// anomaly).
    pub fn stop_position(&self) -> (PageId, u32) {
        let last = *self.last_page_id.lock();
        let count = match self.bpm.read_page(last) {
            Ok(guard) => TablePageView::new(guard.data()).tuple_count() as u32,
            Err(_) => 0,
        };
        (last, count)
    }

    /// A cursor over every slot present at creation time, deleted ones
    /// included.
    pub fn iter(&self) -> TableIterator<'_> {
        let stop = self.stop_position();
        self.iter_range(self.first_page_id, 0, stop)
    }

    /// A cursor from an explicit position up to `stop`, for batched scans
    /// that resume where the previous batch stopped.
    pub fn iter_range(&self, page_id: PageId, slot: u32, stop: (PageId, u32)) -> TableIterator<'_> {
        TableIterator {
            heap: self,
            page_id,
            slot,
            stop_page: stop.0,
            stop_slot: stop.1,
        }
    }
}

/// Forward cursor over a table heap.
pub struct TableIterator<'a> {
    heap: &'a TableHeap,
    page_id: PageId,
    slot: u32,
    /// Creation-time tail; the cursor never reads at or past it.
    stop_page: PageId,
    stop_slot: u32,
}

impl TableIterator<'_> {
    /// The position the cursor would read next; feed it back into
    /// [`TableHeap::iter_range`] to resume.
    pub fn position(&self) -> (PageId, u32) {
        (self.page_id, self.slot)
    }
}

impl Iterator for TableIterator<'_> {
    type Item = (Rid, TupleMeta, Tuple);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if !self.page_id.is_valid() {
                return None;
            }
            if self.page_id == self.stop_page && self.slot >= self.stop_slot {
                self.page_id = PageId::INVALID;
                return None;
            }
            let guard = self.heap.bpm.read_page(self.page_id).ok()?;
            let page = TablePageView::new(guard.data());

            if (self.slot as usize) < page.tuple_count() {
                let rid = Rid::new(self.page_id, self.slot);
                let meta = page.tuple_meta(self.slot as usize);
                let mut tuple = Tuple::from_bytes(page.tuple_data(self.slot as usize).to_vec());
                tuple.set_rid(rid);
                self.slot += 1;
                return Some((rid, meta.into(), tuple));
            }

            if self.page_id == self.stop_page {
                self.page_id = PageId::INVALID;
                return None;
            }
            self.page_id = page.next_page_id();
            self.slot = 0;
        }
    }
}
