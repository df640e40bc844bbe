//! System-wide constants for vellum.

// =============================================================================
// Page and Buffer Pool Constants
// =============================================================================

/// Size of a single page in bytes (4 KB).
///
/// Every disk block, buffer frame, and typed page view in the engine is
/// exactly this many bytes.
pub const PAGE_SIZE: usize = 4096;

/// Default number of frames in the buffer pool.
pub const DEFAULT_POOL_SIZE: usize = 128;

/// Capacity of the disk scheduler's request queue.
pub const DISK_QUEUE_DEPTH: usize = 64;

// =============================================================================
// Executor Constants
// =============================================================================

/// Default number of tuples per executor output batch.
pub const BATCH_SIZE: usize = 64;

/// Number of partitions used by the GRACE hash join.
pub const HASH_JOIN_PARTITIONS: usize = 8;

// =============================================================================
// B+ Tree Constants
// =============================================================================

/// Default tombstone buffer capacity per leaf page.
pub const DEFAULT_TOMBSTONE_CAPACITY: usize = 4;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_size_is_power_of_two() {
        assert!(PAGE_SIZE.is_power_of_two());
    }

    #[test]
    fn batch_size_is_nonzero() {
        assert!(BATCH_SIZE > 0);
        assert!(HASH_JOIN_PARTITIONS > 0);
    }
}
