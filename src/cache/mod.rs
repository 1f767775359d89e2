//! 缓冲区缓存模块
//!
//! 这个模块提供多处理器安全的块缓冲区缓存：固定容量的缓冲池按块号哈希分桶，
//! 每个桶有自己的短锁；命中只锁一个桶，未命中由全局驱逐锁串行化后在本桶
//! 驱逐或跨桶窃取。
//!
//! # 主要组件
//!
//! - [`BufferCache`] - 缓存本体：缓冲池、桶索引、全局驱逐锁
//! - [`BufGuard`] - 加锁的缓存块句柄（acquire / load / flush / release）
//! - [`PinnedBuf`] - 固定的缓存块（pin / unpin）
//! - [`BufFlags`] - 缓存块状态标志
//! - [`CacheConfig`] - 容量、桶数量、块大小
//! - [`CacheStats`] - 缓存统计信息
//!
//! # 替换策略
//!
//! 近似 LRU：引用计数降到 0 时记录逻辑时钟，驱逐时在单个桶内选最小时间戳。
//! 桶链表的顺序从不因释放而调整，近期性只保存在时间戳里。只有本桶没有空闲
//! 缓存块时才会看到其他桶，因此不是严格的全局 LRU。
//!
//! 从未释放过的缓存块时间戳为 0，会被当作最旧的块优先驱逐。
//!
//! 初始化后所有缓存块的块标识都是 (0, 0) 且无效。第一次获取块 (0, 0) 会直接
//! 命中其中一个（计入 `hits` 而不是 `misses`），拿到的句柄同样无效，需要
//! 载入后才能使用。
//!
//! # 已知限制
//!
//! 缓冲池耗尽（所有缓存块都被引用）时直接致命中止，不排队等待。
//!
//! # 使用示例
//!
//! ```rust,ignore
//! use bcache_core::{BufferCache, CacheConfig, MemDisk, TickClock};
//!
//! let cache = BufferCache::new(CacheConfig::default(), MemDisk::new(1024), TickClock::new())?;
//!
//! let mut buf = cache.read(1, 100)?;
//! buf[0] = 42;
//! buf.flush()?;
//! buf.release();
//!
//! let stats = cache.stats();
//! println!("hits={} misses={} steals={}", stats.hits, stats.misses, stats.steals);
//! ```

mod bucket;
mod buffer;
mod buffer_cache;
mod handle;
mod stats;

pub use buffer::{BufFlags, BufId, BufferInfo};
pub use buffer_cache::{BufferCache, CacheConfig};
pub use handle::{BufGuard, PinnedBuf};
pub use stats::CacheStats;
