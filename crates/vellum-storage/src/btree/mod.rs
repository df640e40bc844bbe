//! Concurrent B+ tree index.
//!
//! Keys route to leaves through internal nodes; leaves chain left-to-right
//! for range scans. Traversals crab latches top-down: optimistically with
//! read latches and a single leaf write latch, pessimistically with write
//! latches accumulated in a context stack so splits and merges can
//! propagate upward.

mod iterator;
mod tree;

pub use crate::page::IndexKey;
pub use iterator::IndexIterator;
pub use tree::BPlusTree;
