//! 分桶缓冲区缓存
//!
//! # 架构
//!
//! ```text
//! struct BufferCache {
//!     buffers: Vec<Buffer>,       // 固定缓冲池，ID = 下标，永不移动
//!     index: BucketIndex,         // N 个桶，每个桶一把短锁 + 侵入式链表
//!     evict_lock: Mutex<()>,      // 全局驱逐锁，只串行化未命中的慢路径
//!     disk: D,                    // 同步块传输
//!     clock: C,                   // 最后使用时间戳来源
//! }
//! ```
//!
//! # 锁层次
//!
//! 1. 全局驱逐锁（仅慢路径）
//! 2. 本桶锁
//! 3. 其他桶锁（仅在持有 1、2 时按固定循环顺序逐个获取，同一时刻最多一个）
//! 4. 缓存块独占锁（只在释放所有短锁之后获取，可能阻塞）
//!
//! 命中永远不碰全局锁；所有跨桶遍历都在持有全局锁之后进行，两个未命中
//! 不可能同时窃取对方的桶，因此不会死锁。

use super::bucket::{BucketGuard, BucketIndex};
use super::buffer::{BufFlags, BufId, Buffer, BufferInfo};
use super::handle::{BufGuard, BufRef};
use super::stats::{CacheStats, StatCounters};
use crate::block::{BlockKey, DiskIo};
use crate::clock::{LogicalClock, TickClock};
use crate::consts::{BSIZE, NBUCKET, NBUF};
use crate::error::{fatal, Error, ErrorKind, Result};
use alloc::vec::Vec;
use spin::Mutex;

/// 缓存配置
///
/// 容量和桶数量在初始化时固定；桶数量与容量无关，通常远小于容量。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    /// 缓冲池容量（缓存块数量）
    pub capacity: usize,
    /// 桶数量
    pub buckets: usize,
    /// 块大小（字节）
    pub block_size: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: NBUF,
            buckets: NBUCKET,
            block_size: BSIZE,
        }
    }
}

impl CacheConfig {
    /// 校验配置
    pub fn validate(&self) -> Result<()> {
        if self.capacity == 0 {
            return Err(Error::new(ErrorKind::InvalidInput, "cache capacity must be non-zero"));
        }
        if self.buckets == 0 {
            return Err(Error::new(ErrorKind::InvalidInput, "bucket count must be non-zero"));
        }
        if self.block_size == 0 {
            return Err(Error::new(ErrorKind::InvalidInput, "block size must be non-zero"));
        }
        Ok(())
    }
}

/// 缓冲区缓存
///
/// 由存储子系统显式构造并拥有；多个执行上下文通过 `&BufferCache`
/// （或 `Arc<BufferCache>`）并发调用，无需外部同步。
pub struct BufferCache<D: DiskIo, C: LogicalClock = TickClock> {
    buffers: Vec<Buffer>,
    index: BucketIndex,
    evict_lock: Mutex<()>,
    disk: D,
    clock: C,
    block_size: usize,
    stats: StatCounters,
}

impl<D: DiskIo, C: LogicalClock> BufferCache<D, C> {
    /// 创建缓存，分配全部缓存块并放入桶 0
    ///
    /// # 示例
    ///
    /// ```rust,ignore
    /// let cache = BufferCache::new(CacheConfig::default(), disk, TickClock::new())?;
    /// ```
    pub fn new(config: CacheConfig, disk: D, clock: C) -> Result<Self> {
        config.validate()?;

        let buffers = (0..config.capacity)
            .map(|id| Buffer::new(id, config.block_size))
            .collect();

        log::debug!(
            "[BCACHE] init: {} buffers x {} bytes, {} buckets",
            config.capacity,
            config.block_size,
            config.buckets
        );

        Ok(Self {
            buffers,
            index: BucketIndex::new(config.capacity, config.buckets),
            evict_lock: Mutex::new(()),
            disk,
            clock,
            block_size: config.block_size,
            stats: StatCounters::default(),
        })
    }

    /// 获取块的加锁句柄
    ///
    /// 不读取设备：返回的句柄可能无效，需要 [`BufGuard::load`]。
    /// 缓冲池耗尽是致命错误。
    #[track_caller]
    pub fn acquire(&self, dev: u32, blockno: u32) -> BufGuard<'_, D, C> {
        match self.try_acquire(dev, blockno) {
            Ok(buf) => buf,
            Err(err) => fatal(err),
        }
    }

    /// 获取块的加锁句柄，缓冲池耗尽时返回 [`ErrorKind::PoolExhausted`]
    ///
    /// 不会排队或重试；调用者应按最坏情况下的并发工作集确定缓冲池大小。
    pub fn try_acquire(&self, dev: u32, blockno: u32) -> Result<BufGuard<'_, D, C>> {
        let key = BlockKey::new(dev, blockno);
        let home = self.index.bucket_of(blockno);

        let id = match self.lookup_fast(home, key) {
            Some(id) => {
                StatCounters::inc(&self.stats.hits);
                log::trace!("[BCACHE] acquire {} HIT buf={}", key, id);
                id
            }
            None => self.resolve_miss(home, key)?,
        };

        // 所有短锁都已释放，才获取（可能阻塞的）独占锁
        Ok(BufGuard::lock(BufRef::new(self, id)))
    }

    /// 获取块并确保负载有效
    ///
    /// 设备读取失败时句柄被释放，缓存块保持无效。
    #[track_caller]
    pub fn read(&self, dev: u32, blockno: u32) -> Result<BufGuard<'_, D, C>> {
        let mut buf = self.acquire(dev, blockno);
        buf.load()?;
        Ok(buf)
    }

    /// 快路径：只持有本桶锁
    fn lookup_fast(&self, home: usize, key: BlockKey) -> Option<BufId> {
        let bucket = self.index.lock(home);
        let id = self.find(&bucket, key)?;
        self.buffers[id].get();
        Some(id)
    }

    /// 慢路径：持有全局驱逐锁
    fn resolve_miss(&self, home: usize, key: BlockKey) -> Result<BufId> {
        let _evict = self.evict_lock.lock();
        let mut local = self.index.lock(home);

        // 释放本桶锁到获取全局锁之间，其他上下文可能已经缓存了同一个块
        if let Some(id) = self.find(&local, key) {
            self.buffers[id].get();
            StatCounters::inc(&self.stats.slow_hits);
            log::trace!("[BCACHE] acquire {} HIT after escalation buf={}", key, id);
            return Ok(id);
        }

        StatCounters::inc(&self.stats.misses);

        if let Some(id) = self.least_recent(&local) {
            self.repurpose(id, key);
            StatCounters::inc(&self.stats.local_evictions);
            log::debug!(
                "[BCACHE] acquire {} MISS, evicted buf={} in bucket {}",
                key,
                id,
                local.index()
            );
            return Ok(id);
        }

        for victim_bucket in self.index.steal_order(home) {
            let mut foreign = self.index.lock(victim_bucket);
            if let Some(id) = self.least_recent(&foreign) {
                self.repurpose(id, key);
                foreign.unlink(id);
                drop(foreign);
                local.push_front(id);
                StatCounters::inc(&self.stats.steals);
                log::debug!(
                    "[BCACHE] acquire {} MISS, stole buf={} from bucket {} into bucket {} ({} members)",
                    key,
                    id,
                    victim_bucket,
                    home,
                    local.len()
                );
                return Ok(id);
            }
        }

        StatCounters::inc(&self.stats.exhaustions);
        log::debug!("[BCACHE] acquire {} MISS, all {} buffers referenced", key, self.capacity());
        Err(Error::new(
            ErrorKind::PoolExhausted,
            "no unreferenced buffer in any bucket",
        ))
    }

    /// 在桶内查找块
    fn find(&self, bucket: &BucketGuard<'_>, key: BlockKey) -> Option<BufId> {
        bucket.iter().find(|&id| self.buffers[id].key() == key)
    }

    /// 桶内最后使用时间最小的空闲缓存块（相同时按扫描顺序取第一个）
    fn least_recent(&self, bucket: &BucketGuard<'_>) -> Option<BufId> {
        bucket
            .iter()
            .filter(|&id| self.buffers[id].is_free())
            .min_by_key(|&id| self.buffers[id].last_use())
    }

    fn repurpose(&self, id: BufId, key: BlockKey) {
        let buf = &self.buffers[id];
        let old_key = buf.key();
        let old_flags = buf.repurpose(key);
        if old_flags.contains(BufFlags::DIRTY) {
            log::warn!(
                "[BCACHE] buf={} repurposed for {} with unflushed changes to {}",
                id,
                key,
                old_key
            );
        }
    }

    /// 在所属桶锁下增加引用计数（pin / 重新加锁已固定的块）
    pub(crate) fn pin_ref(&self, id: BufId) -> BufRef<'_, D, C> {
        let buf = &self.buffers[id];
        let bucket = self.index.lock(self.index.bucket_of(buf.blockno()));
        buf.get();
        drop(bucket);
        BufRef::new(self, id)
    }

    /// 在所属桶锁下减少引用计数，降到 0 时记录最后使用时间
    ///
    /// 链表位置不变：近期性只体现在时间戳上。
    pub(crate) fn unref(&self, id: BufId) {
        let buf = &self.buffers[id];
        let bucket = self.index.lock(self.index.bucket_of(buf.blockno()));
        match buf.put() {
            Some(0) => buf.stamp(self.clock.now()),
            Some(_) => {}
            None => {
                drop(bucket);
                fatal(Error::new(
                    ErrorKind::OwnershipViolation,
                    "reference count underflow on release",
                ));
            }
        }
    }

    pub(crate) fn buffer(&self, id: BufId) -> &Buffer {
        &self.buffers[id]
    }

    pub(crate) fn counters(&self) -> &StatCounters {
        &self.stats
    }

    /// 底层设备
    pub fn disk(&self) -> &D {
        &self.disk
    }

    /// 逻辑时钟
    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// 缓冲池容量
    pub fn capacity(&self) -> usize {
        self.buffers.len()
    }

    /// 桶数量
    pub fn bucket_count(&self) -> usize {
        self.index.len()
    }

    /// 块大小
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// 块号所属的桶
    pub fn bucket_of(&self, blockno: u32) -> usize {
        self.index.bucket_of(blockno)
    }

    /// 获取缓存统计信息
    pub fn stats(&self) -> CacheStats {
        self.stats.snapshot()
    }

    /// 查找已缓存块的元数据快照（不改变引用计数）
    pub fn lookup(&self, dev: u32, blockno: u32) -> Option<BufferInfo> {
        let key = BlockKey::new(dev, blockno);
        let bucket = self.index.lock(self.index.bucket_of(blockno));
        self.find(&bucket, key)
            .map(|id| BufferInfo::of(&self.buffers[id]))
    }

    /// 按扫描顺序列出桶成员的元数据快照
    pub fn bucket_members(&self, bucket: usize) -> Vec<BufferInfo> {
        let guard = self.index.lock(bucket);
        guard
            .iter()
            .map(|id| BufferInfo::of(&self.buffers[id]))
            .collect()
    }
}

impl<D: DiskIo, C: LogicalClock> core::fmt::Debug for BufferCache<D, C> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("BufferCache")
            .field("capacity", &self.capacity())
            .field("buckets", &self.bucket_count())
            .field("block_size", &self.block_size)
            .field("stats", &self.stats())
            .finish()
    }
}
