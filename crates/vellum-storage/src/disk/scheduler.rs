//! Background disk scheduler.
//!
//! All reads and writes funnel through a bounded queue serviced by a single
//! worker thread, which invokes the disk manager synchronously and then
//! fulfills the request's promise. Requests against the same page therefore
//! complete in the order they were scheduled.

use std::io;
use std::sync::mpsc::{sync_channel, SyncSender};
use std::sync::Arc;
use std::thread::JoinHandle;

use bytes::Bytes;
use parking_lot::{Condvar, Mutex};
use tracing::error;
use vellum_common::constants::{DISK_QUEUE_DEPTH, PAGE_SIZE};
use vellum_common::types::PageId;

use super::DiskManager;

/// Write-once completion cell shared between a scheduler caller and the
/// worker thread.
pub struct Promise<T> {
    inner: Arc<PromiseInner<T>>,
}

/// The waiting half of a [`Promise`].
pub struct PromiseFuture<T> {
    inner: Arc<PromiseInner<T>>,
}

struct PromiseInner<T> {
    slot: Mutex<Option<T>>,
    cond: Condvar,
}

impl<T> Promise<T> {
    /// Creates a linked promise/future pair.
    pub fn new() -> (Self, PromiseFuture<T>) {
        let inner = Arc::new(PromiseInner {
            slot: Mutex::new(None),
            cond: Condvar::new(),
        });
        (
            Self {
                inner: Arc::clone(&inner),
            },
            PromiseFuture { inner },
        )
    }

    /// Fulfills the promise, waking any waiter.
    pub fn set(self, value: T) {
        let mut slot = self.inner.slot.lock();
        debug_assert!(slot.is_none(), "promise fulfilled twice");
        *slot = Some(value);
        self.inner.cond.notify_all();
    }
}

impl<T> PromiseFuture<T> {
    /// Blocks until the promise is fulfilled.
    pub fn wait(self) -> T {
        let mut slot = self.inner.slot.lock();
        loop {
            if let Some(value) = slot.take() {
                return value;
            }
            self.inner.cond.wait(&mut slot);
        }
    }
}

/// A scheduled disk operation.
pub enum DiskRequest {
    /// Read a page; the promise completes with the page contents.
    Read {
        /// Target page.
        page_id: PageId,
        /// Completion carrying the page bytes.
        promise: Promise<io::Result<Bytes>>,
    },
    /// Write a page; the promise completes once the bytes are durable.
    Write {
        /// Target page.
        page_id: PageId,
        /// Page contents to persist.
        data: Bytes,
        /// Completion flag.
        promise: Promise<io::Result<()>>,
    },
    /// Unlink a page.
    Delete {
        /// Target page.
        page_id: PageId,
    },
}

/// Serializes concurrent disk requests onto a single background worker.
pub struct DiskScheduler {
    queue: SyncSender<Option<DiskRequest>>,
    worker: Option<JoinHandle<()>>,
}

impl DiskScheduler {
    /// Spawns the worker thread over the given disk manager.
    pub fn new(disk: Arc<dyn DiskManager>) -> Self {
        let (tx, rx) = sync_channel::<Option<DiskRequest>>(DISK_QUEUE_DEPTH);
        let worker = std::thread::Builder::new()
            .name("vellum-disk".into())
            .spawn(move || {
                // Runs until the shutdown sentinel arrives.
                while let Ok(Some(request)) = rx.recv() {
                    match request {
                        DiskRequest::Read { page_id, promise } => {
                            let mut buf = vec![0u8; PAGE_SIZE];
                            let result = disk
                                .read_page(page_id, &mut buf)
                                .map(|()| Bytes::from(buf));
                            promise.set(result);
                        }
                        DiskRequest::Write {
                            page_id,
                            data,
                            promise,
                        } => {
                            promise.set(disk.write_page(page_id, &data));
                        }
                        DiskRequest::Delete { page_id } => {
                            if let Err(e) = disk.delete_page(page_id) {
                                error!(page = %page_id, "failed to unlink page: {e}");
                            }
                        }
                    }
                }
            })
            .expect("failed to spawn disk worker");

        Self {
            queue: tx,
            worker: Some(worker),
        }
    }

    /// Appends requests to the queue; returns immediately.
    pub fn schedule(&self, requests: impl IntoIterator<Item = DiskRequest>) {
        for request in requests {
            self.queue
                .send(Some(request))
                .expect("disk worker exited while scheduler alive");
        }
    }

    /// Schedules a read and returns its completion future.
    pub fn schedule_read(&self, page_id: PageId) -> PromiseFuture<io::Result<Bytes>> {
        let (promise, future) = Promise::new();
        self.schedule([DiskRequest::Read { page_id, promise }]);
        future
    }

    /// Schedules a write and returns its completion future.
    pub fn schedule_write(&self, page_id: PageId, data: Bytes) -> PromiseFuture<io::Result<()>> {
        let (promise, future) = Promise::new();
        self.schedule([DiskRequest::Write {
            page_id,
            data,
            promise,
        }]);
        future
    }

    /// Schedules an unlink. Fire-and-forget.
    pub fn schedule_delete(&self, page_id: PageId) {
        self.schedule([DiskRequest::Delete { page_id }]);
    }
}

impl Drop for DiskScheduler {
    fn drop(&mut self) {
        // Sentinel, then join.
        let _ = self.queue.send(None);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disk::MemoryDiskManager;

    #[test]
    fn write_then_read_completes_in_order() {
        let disk = Arc::new(MemoryDiskManager::new());
        let scheduler = DiskScheduler::new(disk);

        let mut page = vec![0u8; PAGE_SIZE];
        page[0] = 42;
        let write = scheduler.schedule_write(PageId::new(0), Bytes::from(page));
        let read = scheduler.schedule_read(PageId::new(0));

        write.wait().unwrap();
        let data = read.wait().unwrap();
        assert_eq!(data[0], 42);
    }

    #[test]
    fn interleaved_writes_to_same_page_apply_in_schedule_order() {
        let disk = Arc::new(MemoryDiskManager::new());
        let scheduler = DiskScheduler::new(disk);

        let mut futures = Vec::new();
        for i in 0..16u8 {
            let mut page = vec![0u8; PAGE_SIZE];
            page[0] = i;
            futures.push(scheduler.schedule_write(PageId::new(7), Bytes::from(page)));
        }
        for f in futures {
            f.wait().unwrap();
        }

        let data = scheduler.schedule_read(PageId::new(7)).wait().unwrap();
        assert_eq!(data[0], 15);
    }

    #[test]
    fn drop_joins_worker_after_draining() {
        let disk = Arc::new(MemoryDiskManager::new());
        let scheduler = DiskScheduler::new(Arc::clone(&disk) as Arc<dyn DiskManager>);
        let f = scheduler.schedule_write(PageId::new(1), Bytes::from(vec![1u8; PAGE_SIZE]));
        f.wait().unwrap();
        drop(scheduler);
        assert_eq!(disk.page_count(), 1);
    }

    #[test]
    fn promise_wait_after_set() {
        let (promise, future) = Promise::new();
        promise.set(123);
        assert_eq!(future.wait(), 123);
    }
}
