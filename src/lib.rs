//! bcache_core: 多处理器内核的分桶块缓冲区缓存
//!
//! 这是一个纯 Rust 实现的块缓存核心，旨在提供：
//! - **零 unsafe 代码**（元数据使用原子类型 + 锁约束）
//! - **分桶并发**：不同块的查找不会串行化在同一把锁上
//! - **无死锁的跨桶驱逐**：未命中的慢路径由全局驱逐锁串行化
//! - **近似 LRU**：每个缓存块记录最后使用时间戳，没有全局有序链表
//!
//! # 示例
//!
//! ```rust,ignore
//! use bcache_core::{BufferCache, CacheConfig, MemDisk, TickClock};
//!
//! let disk = MemDisk::new(1024);
//! let cache = BufferCache::new(CacheConfig::default(), disk, TickClock::new())?;
//!
//! // 读取块（未缓存时从设备载入）
//! let mut buf = cache.read(1, 42)?;
//! buf[0] = 0x42;
//! buf.flush()?;
//! buf.release();
//! ```
//!
//! # 模块结构
//!
//! - [`error`] - 错误类型定义
//! - [`block`] - 块设备传输接口
//! - [`clock`] - 逻辑时钟
//! - [`consts`] - 常量定义
//! - [`cache`] - 缓冲区缓存

#![no_std]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]

extern crate alloc;

#[cfg(feature = "std")]
extern crate std;

// ===== 核心模块 =====

/// 错误处理
pub mod error;

/// 块设备传输接口
pub mod block;

/// 逻辑时钟
pub mod clock;

/// 常量定义
pub mod consts;

/// 缓冲区缓存
pub mod cache;

/// CRC32 校验和计算
pub(crate) mod crc;

// ===== 公共导出 =====

// 错误处理
pub use error::{Error, ErrorKind, Result};

// 块设备
pub use block::{BlockKey, DiskIo, MemDisk};

// 时钟
pub use clock::{LogicalClock, TickClock};

// Cache
pub use cache::{
    BufFlags, BufGuard, BufId, BufferCache, BufferInfo, CacheConfig, CacheStats, PinnedBuf,
};
