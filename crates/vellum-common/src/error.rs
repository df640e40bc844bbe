//! Common error types for vellum.
//!
//! Subsystems define their own focused error enums; this module holds the
//! pieces shared between them.

use thiserror::Error;

use crate::types::PageId;

/// Errors that can surface from the storage layer.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O operation failed.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// A page was requested that is not present.
    #[error("page {0} not found")]
    PageNotFound(PageId),

    /// The buffer pool could not produce a free frame.
    #[error("buffer pool exhausted: all frames pinned")]
    PoolExhausted,

    /// A page was deleted while still pinned.
    #[error("page {0} is pinned and cannot be deleted")]
    PagePinned(PageId),

    /// Invalid configuration.
    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Result alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
