//! 缓存统计信息

use core::sync::atomic::{AtomicU64, Ordering};

/// 缓存统计信息快照
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// 快路径命中次数（不触碰全局锁）
    pub hits: u64,
    /// 进入慢路径后在重新扫描时命中的次数
    pub slow_hits: u64,
    /// 未命中次数（需要改作他用一个缓存块）
    pub misses: u64,
    /// 在本桶内完成的驱逐次数
    pub local_evictions: u64,
    /// 从其他桶窃取缓存块的次数
    pub steals: u64,
    /// 缓冲池耗尽次数
    pub exhaustions: u64,
    /// 设备读取次数
    pub disk_reads: u64,
    /// 设备写入次数
    pub disk_writes: u64,
}

impl CacheStats {
    /// 总访问次数
    pub fn total_accesses(&self) -> u64 {
        self.hits + self.slow_hits + self.misses
    }

    /// 计算命中率
    pub fn hit_rate(&self) -> f64 {
        let total = self.total_accesses();
        if total == 0 {
            0.0
        } else {
            (self.hits + self.slow_hits) as f64 / total as f64
        }
    }
}

/// 并发计数器
#[derive(Debug, Default)]
pub(crate) struct StatCounters {
    pub hits: AtomicU64,
    pub slow_hits: AtomicU64,
    pub misses: AtomicU64,
    pub local_evictions: AtomicU64,
    pub steals: AtomicU64,
    pub exhaustions: AtomicU64,
    pub disk_reads: AtomicU64,
    pub disk_writes: AtomicU64,
}

impl StatCounters {
    #[inline]
    pub fn inc(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CacheStats {
        let get = |c: &AtomicU64| c.load(Ordering::Relaxed);
        CacheStats {
            hits: get(&self.hits),
            slow_hits: get(&self.slow_hits),
            misses: get(&self.misses),
            local_evictions: get(&self.local_evictions),
            steals: get(&self.steals),
            exhaustions: get(&self.exhaustions),
            disk_reads: get(&self.disk_reads),
            disk_writes: get(&self.disk_writes),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_rate() {
        let stats = CacheStats::default();
        assert_eq!(stats.hit_rate(), 0.0);

        let counters = StatCounters::default();
        StatCounters::inc(&counters.hits);
        StatCounters::inc(&counters.slow_hits);
        StatCounters::inc(&counters.misses);
        StatCounters::inc(&counters.misses);

        let stats = counters.snapshot();
        assert_eq!(stats.total_accesses(), 4);
        assert_eq!(stats.hit_rate(), 0.5);
    }
}
