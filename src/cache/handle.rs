//! 缓存块句柄 - RAII 风格的块访问
//!
//! - [`BufGuard`]：持有引用计数 + 独占锁，可以读写负载
//! - [`PinnedBuf`]：只持有引用计数，使缓存块在多个独立临界区之间保持驻留
//!
//! 两者析构时都会归还引用计数，因此 acquire/release、pin/unpin 自动配对。
//!
//! # 示例
//!
//! ```rust,ignore
//! let mut buf = cache.read(dev, blockno)?;
//! buf[0] = 0x42;
//! buf.flush()?;
//!
//! // 跨越多个临界区保持驻留
//! let pinned = buf.pin();
//! buf.release();
//!
//! let again = pinned.lock();
//! assert_eq!(again[0], 0x42);
//! again.release();
//! pinned.unpin();
//! ```

use super::buffer::{BufFlags, BufId, Buffer, PayloadGuard};
use super::buffer_cache::BufferCache;
use super::stats::StatCounters;
use crate::block::{BlockKey, DiskIo};
use crate::clock::LogicalClock;
use crate::crc;
use crate::error::{fatal, Error, ErrorKind, Result};
use core::ops::{Deref, DerefMut};

/// 一份引用计数
///
/// 创建前调用者已经在桶锁下增加了引用计数；析构时归还。
pub(crate) struct BufRef<'a, D: DiskIo, C: LogicalClock> {
    cache: &'a BufferCache<D, C>,
    id: BufId,
    key: BlockKey,
}

impl<'a, D: DiskIo, C: LogicalClock> BufRef<'a, D, C> {
    pub(crate) fn new(cache: &'a BufferCache<D, C>, id: BufId) -> Self {
        let key = cache.buffer(id).key();
        Self { cache, id, key }
    }

    fn buffer(&self) -> &'a Buffer {
        self.cache.buffer(self.id)
    }
}

impl<D: DiskIo, C: LogicalClock> Drop for BufRef<'_, D, C> {
    fn drop(&mut self) {
        self.cache.unref(self.id);
    }
}

/// 加锁的缓存块句柄
///
/// 由 [`BufferCache::acquire`] / [`BufferCache::read`] 返回。持有期间调用者独占
/// 负载；显式 [`release`](Self::release) 或析构时先释放独占锁，再在所属桶锁下
/// 归还引用计数。
pub struct BufGuard<'a, D: DiskIo, C: LogicalClock> {
    // 字段按声明顺序析构：先释放独占锁，再归还引用计数
    payload: PayloadGuard<'a>,
    hold: BufRef<'a, D, C>,
}

impl<'a, D: DiskIo, C: LogicalClock> BufGuard<'a, D, C> {
    /// 获取独占锁（可能阻塞）
    pub(crate) fn lock(hold: BufRef<'a, D, C>) -> Self {
        let payload = hold.buffer().lock();
        Self { payload, hold }
    }

    fn buffer(&self) -> &'a Buffer {
        self.hold.buffer()
    }

    fn counters(&self) -> &'a StatCounters {
        self.hold.cache.counters()
    }

    /// 缓存块 ID
    pub fn id(&self) -> BufId {
        self.hold.id
    }

    /// 块标识
    pub fn key(&self) -> BlockKey {
        self.hold.key
    }

    /// 设备号
    pub fn dev(&self) -> u32 {
        self.hold.key.dev
    }

    /// 块号
    pub fn blockno(&self) -> u32 {
        self.hold.key.blockno
    }

    /// 状态标志
    pub fn flags(&self) -> BufFlags {
        self.buffer().flags()
    }

    /// 负载是否有效
    pub fn is_valid(&self) -> bool {
        self.flags().contains(BufFlags::VALID)
    }

    /// 负载是否被修改且尚未写回
    pub fn is_dirty(&self) -> bool {
        self.flags().contains(BufFlags::DIRTY)
    }

    /// 负载数据
    pub fn data(&self) -> &[u8] {
        &self.payload
    }

    /// 可变负载数据（标记为脏）
    pub fn data_mut(&mut self) -> &mut [u8] {
        self.buffer().set_flags(BufFlags::DIRTY);
        &mut self.payload
    }

    /// 负载的 CRC32 校验和
    pub fn checksum(&self) -> u32 {
        crc::checksum(&self.payload)
    }

    /// 确认当前句柄仍持有独占锁和引用计数
    pub(crate) fn check_owner(&self) -> Result<()> {
        let buf = self.buffer();
        if buf.is_locked() && buf.refcnt() > 0 && buf.key() == self.hold.key {
            Ok(())
        } else {
            Err(Error::new(
                ErrorKind::OwnershipViolation,
                "buffer handle does not hold the exclusive lock",
            ))
        }
    }

    #[track_caller]
    fn assert_owner(&self) {
        if let Err(err) = self.check_owner() {
            fatal(err);
        }
    }

    /// 负载无效时从设备读取
    ///
    /// 读取失败时缓存块保持无效，之后的 `load` 会重新读取。
    pub fn load(&mut self) -> Result<()> {
        let buf = self.buffer();
        if buf.is_valid() {
            return Ok(());
        }

        let key = self.hold.key;
        self.hold.cache.disk().read_block(key, &mut self.payload[..])?;
        buf.set_flags(BufFlags::VALID);
        buf.clear_flags(BufFlags::DIRTY);
        StatCounters::inc(&self.counters().disk_reads);
        log::trace!(
            "[BCACHE] load {} buf={} crc={:#010x}",
            key,
            self.id(),
            crc::checksum(&self.payload)
        );
        Ok(())
    }

    /// 同步写回负载
    ///
    /// 未持有独占锁是致命错误。
    #[track_caller]
    pub fn flush(&mut self) -> Result<()> {
        self.assert_owner();

        let key = self.hold.key;
        self.hold.cache.disk().write_block(key, &self.payload[..])?;
        self.buffer().clear_flags(BufFlags::DIRTY);
        StatCounters::inc(&self.counters().disk_writes);
        log::trace!(
            "[BCACHE] flush {} buf={} crc={:#010x}",
            key,
            self.id(),
            crc::checksum(&self.payload)
        );
        Ok(())
    }

    /// 用 `data` 覆盖整个负载并标记为有效，不读取设备
    ///
    /// 用于调用者马上要覆盖整个块的场景（如分配新块后清零）。
    pub fn overwrite(&mut self, data: &[u8]) -> Result<()> {
        if data.len() != self.payload.len() {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                "overwrite requires a full block",
            ));
        }
        self.payload.copy_from_slice(data);
        self.buffer().set_flags(BufFlags::VALID | BufFlags::DIRTY);
        Ok(())
    }

    /// 固定缓存块：只增加引用计数，不涉及独占锁
    pub fn pin(&self) -> PinnedBuf<'a, D, C> {
        PinnedBuf {
            hold: self.hold.cache.pin_ref(self.hold.id),
        }
    }

    /// 释放句柄
    ///
    /// 先释放独占锁，再在所属桶锁下减少引用计数；降到 0 时记录最后使用时间。
    /// 缓存块在桶链表中的位置不变。
    #[track_caller]
    pub fn release(self) {
        self.assert_owner();
        log::trace!("[BCACHE] release {} buf={}", self.hold.key, self.hold.id);
    }
}

impl<D: DiskIo, C: LogicalClock> Deref for BufGuard<'_, D, C> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.data()
    }
}

impl<D: DiskIo, C: LogicalClock> DerefMut for BufGuard<'_, D, C> {
    fn deref_mut(&mut self) -> &mut [u8] {
        self.data_mut()
    }
}

impl<D: DiskIo, C: LogicalClock> core::fmt::Debug for BufGuard<'_, D, C> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("BufGuard")
            .field("id", &self.id())
            .field("key", &self.key())
            .field("flags", &self.flags())
            .finish()
    }
}

/// 固定的缓存块
///
/// 持有一份引用计数但不持有独占锁；存在期间缓存块不会被驱逐，块标识不变。
/// 析构或 [`unpin`](Self::unpin) 时在所属桶锁下归还引用计数。
pub struct PinnedBuf<'a, D: DiskIo, C: LogicalClock> {
    hold: BufRef<'a, D, C>,
}

impl<'a, D: DiskIo, C: LogicalClock> PinnedBuf<'a, D, C> {
    /// 缓存块 ID
    pub fn id(&self) -> BufId {
        self.hold.id
    }

    /// 块标识
    pub fn key(&self) -> BlockKey {
        self.hold.key
    }

    /// 重新获取独占锁，不需要查找
    pub fn lock(&self) -> BufGuard<'a, D, C> {
        BufGuard::lock(self.hold.cache.pin_ref(self.hold.id))
    }

    /// 取消固定
    pub fn unpin(self) {
        log::trace!("[BCACHE] unpin {} buf={}", self.hold.key, self.hold.id);
    }
}

impl<D: DiskIo, C: LogicalClock> core::fmt::Debug for PinnedBuf<'_, D, C> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PinnedBuf")
            .field("id", &self.id())
            .field("key", &self.key())
            .finish()
    }
}
