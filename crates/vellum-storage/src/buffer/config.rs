//! Buffer pool configuration.

use vellum_common::constants::DEFAULT_POOL_SIZE;
use vellum_common::error::{StorageError, StorageResult};

/// Configuration for the buffer pool.
#[derive(Debug, Clone)]
pub struct BufferPoolConfig {
    /// Number of frames in the pool.
    pub num_frames: usize,
}

impl BufferPoolConfig {
    /// Creates a configuration with the given frame count.
    pub fn new(num_frames: usize) -> Self {
        Self { num_frames }
    }

    /// Validates the configuration.
    pub fn validate(&self) -> StorageResult<()> {
        if self.num_frames == 0 {
            return Err(StorageError::Config(
                "buffer pool must have at least one frame".into(),
            ));
        }
        Ok(())
    }
}

impl Default for BufferPoolConfig {
    fn default() -> Self {
        Self {
            num_frames: DEFAULT_POOL_SIZE,
        }
    }
}
