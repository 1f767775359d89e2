//! 逻辑时钟
//!
//! 缓存只读取时钟，用作最后使用时间戳的来源；时钟由外部推进
//! （例如定时器中断中的 tick）。

use alloc::sync::Arc;
use core::sync::atomic::{AtomicU64, Ordering};

/// 单调递增的逻辑时钟
pub trait LogicalClock: Send + Sync {
    /// 当前时钟值
    fn now(&self) -> u64;
}

impl<T: LogicalClock + ?Sized> LogicalClock for Arc<T> {
    #[inline]
    fn now(&self) -> u64 {
        (**self).now()
    }
}

impl<T: LogicalClock + ?Sized> LogicalClock for &T {
    #[inline]
    fn now(&self) -> u64 {
        (**self).now()
    }
}

/// 基于 tick 计数的时钟
#[derive(Debug, Default)]
pub struct TickClock {
    ticks: AtomicU64,
}

impl TickClock {
    /// 创建从 0 开始的时钟
    pub const fn new() -> Self {
        Self {
            ticks: AtomicU64::new(0),
        }
    }

    /// 推进一个 tick，返回推进后的值
    pub fn tick(&self) -> u64 {
        self.ticks.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// 推进 `n` 个 tick
    pub fn advance(&self, n: u64) -> u64 {
        self.ticks.fetch_add(n, Ordering::AcqRel) + n
    }
}

impl LogicalClock for TickClock {
    #[inline]
    fn now(&self) -> u64 {
        self.ticks.load(Ordering::Acquire)
    }
}
