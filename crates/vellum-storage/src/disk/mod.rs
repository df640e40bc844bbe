//! Disk abstraction: the page-granular disk manager and the background
//! scheduler that serializes I/O onto a single worker thread.

mod manager;
mod scheduler;

pub use manager::{DiskManager, FileDiskManager, MemoryDiskManager};
pub use scheduler::{DiskRequest, DiskScheduler, Promise, PromiseFuture};
