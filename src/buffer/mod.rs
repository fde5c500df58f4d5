mod buffer_pool;
mod clock_replacer;
mod lru_k_replacer;
mod page_guard;
mod replacer;

pub use buffer_pool::{BufferPool, BufferStats, FlushHook};
pub use clock_replacer::ClockReplacer;
pub use lru_k_replacer::LruKReplacer;
pub use page_guard::{ReadPageGuard, WritePageGuard};
pub use replacer::{build_replacer, Replacer};
