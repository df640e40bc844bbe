//! Buffer pool: in-memory frames caching disk pages, an ARC replacer
//! choosing eviction victims, and latch-owning page guards.

mod config;
mod frame;
mod latch;
mod pool;
mod replacer;

pub use config::BufferPoolConfig;
pub use frame::BufferFrame;
pub use latch::{ReadPageGuard, WritePageGuard};
pub use pool::{BufferPoolManager, BufferPoolStats};
pub use replacer::{AccessType, ArcReplacer};
