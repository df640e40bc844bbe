//! # vellum-storage
//!
//! The storage engine for vellum: a disk abstraction with a background
//! scheduler, a buffer pool with ARC eviction and latch-owning page guards,
//! typed page layouts, and a concurrent B+ tree index.

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Buffer pool: frames, ARC replacer, page guards, and the manager.
pub mod buffer;

/// B+ tree index and its iterator.
pub mod btree;

/// Disk manager and the background disk scheduler.
pub mod disk;

/// Typed page layouts.
pub mod page;
