//! 缓存块结构
//!
//! 每个缓存块在初始化时分配一次，之后只会被"改作他用"（改写块标识、清除
//! VALID），永远不会释放或移动。
//!
//! # 锁约束
//!
//! 元数据字段全部是原子类型，但原子性本身不是保护手段：
//!
//! - `dev` / `blockno` / `refcnt` / `last_use` 只在持有所属桶锁时修改
//!   （慢路径驱逐时同时持有全局驱逐锁）
//! - `refcnt > 0` 期间块标识保持不变，持有者可以不加锁读取
//! - `flags` 在持有独占锁时修改；`refcnt == 0` 时没有独占锁持有者，
//!   驱逐路径才可以在桶锁下清除它
//! - 负载数据只能通过独占锁访问
//!
//! 锁的获取/释放提供了所需的 happens-before 关系，因此字段访问使用 `Relaxed`。

use crate::block::BlockKey;
use alloc::boxed::Box;
use alloc::vec;
use bitflags::bitflags;
use core::sync::atomic::{AtomicU32, AtomicU64, AtomicU8, Ordering};
use spin::mutex::{TicketMutex, TicketMutexGuard};

/// 缓存块 ID：缓冲池数组下标
pub type BufId = usize;

/// 独占锁等待策略
///
/// 启用 `std` 时让出线程，模拟可睡眠的锁；否则自旋。
#[cfg(feature = "std")]
pub(crate) type Relax = spin::relax::Yield;
#[cfg(not(feature = "std"))]
pub(crate) type Relax = spin::relax::Spin;

/// 缓存块负载独占锁的守卫
pub(crate) type PayloadGuard<'a> = TicketMutexGuard<'a, Box<[u8]>>;

bitflags! {
    /// 缓存块标志
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct BufFlags: u8 {
        /// 负载已从设备载入（有效）
        const VALID = 0x01;
        /// 负载自载入 / 上次写回后被修改
        const DIRTY = 0x02;
    }
}

/// 缓存块
pub(crate) struct Buffer {
    /// 块 ID（固定，不随桶迁移而改变）
    id: BufId,
    /// 设备号
    dev: AtomicU32,
    /// 块号
    blockno: AtomicU32,
    /// 状态标志
    flags: AtomicU8,
    /// 引用计数，> 0 时不能被驱逐
    refcnt: AtomicU32,
    /// 引用计数最后一次降到 0 时的逻辑时钟值
    last_use: AtomicU64,
    /// 独占锁 + 负载
    payload: TicketMutex<Box<[u8]>, Relax>,
}

impl Buffer {
    /// 创建新的缓存块
    pub fn new(id: BufId, block_size: usize) -> Self {
        Self {
            id,
            dev: AtomicU32::new(0),
            blockno: AtomicU32::new(0),
            flags: AtomicU8::new(BufFlags::empty().bits()),
            refcnt: AtomicU32::new(0),
            last_use: AtomicU64::new(0),
            payload: TicketMutex::<_, Relax>::new(vec![0u8; block_size].into_boxed_slice()),
        }
    }

    pub fn id(&self) -> BufId {
        self.id
    }

    pub fn key(&self) -> BlockKey {
        BlockKey::new(
            self.dev.load(Ordering::Relaxed),
            self.blockno.load(Ordering::Relaxed),
        )
    }

    pub fn blockno(&self) -> u32 {
        self.blockno.load(Ordering::Relaxed)
    }

    pub fn refcnt(&self) -> u32 {
        self.refcnt.load(Ordering::Relaxed)
    }

    pub fn last_use(&self) -> u64 {
        self.last_use.load(Ordering::Relaxed)
    }

    pub fn flags(&self) -> BufFlags {
        BufFlags::from_bits_truncate(self.flags.load(Ordering::Relaxed))
    }

    pub fn is_valid(&self) -> bool {
        self.flags().contains(BufFlags::VALID)
    }

    pub fn is_free(&self) -> bool {
        self.refcnt() == 0
    }

    /// 桶锁下：增加引用计数
    pub fn get(&self) {
        self.refcnt.fetch_add(1, Ordering::Relaxed);
    }

    /// 桶锁下：减少引用计数
    ///
    /// 返回减少后的值；计数已为 0 时返回 None 且不做修改。
    pub fn put(&self) -> Option<u32> {
        let cur = self.refcnt.load(Ordering::Relaxed);
        let next = cur.checked_sub(1)?;
        self.refcnt.store(next, Ordering::Relaxed);
        Some(next)
    }

    /// 桶锁下：记录最后使用时间
    pub fn stamp(&self, now: u64) {
        self.last_use.store(now, Ordering::Relaxed);
    }

    /// 桶锁 + 全局锁下：将空闲缓存块改作 `key` 使用
    ///
    /// 返回改写前的标志，调用者据此判断是否丢弃了脏数据。
    pub fn repurpose(&self, key: BlockKey) -> BufFlags {
        debug_assert!(self.is_free());
        self.dev.store(key.dev, Ordering::Relaxed);
        self.blockno.store(key.blockno, Ordering::Relaxed);
        self.refcnt.store(1, Ordering::Relaxed);
        BufFlags::from_bits_truncate(self.flags.swap(0, Ordering::Relaxed))
    }

    pub fn set_flags(&self, flags: BufFlags) {
        self.flags.fetch_or(flags.bits(), Ordering::Relaxed);
    }

    pub fn clear_flags(&self, flags: BufFlags) {
        self.flags.fetch_and(!flags.bits(), Ordering::Relaxed);
    }

    /// 获取独占锁（可能阻塞）
    pub fn lock(&self) -> PayloadGuard<'_> {
        self.payload.lock()
    }

    /// 独占锁当前是否被持有
    pub fn is_locked(&self) -> bool {
        self.payload.is_locked()
    }
}

impl core::fmt::Debug for Buffer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Buffer")
            .field("id", &self.id)
            .field("key", &self.key())
            .field("refcnt", &self.refcnt())
            .field("last_use", &self.last_use())
            .field("flags", &self.flags())
            .field("locked", &self.is_locked())
            .finish()
    }
}

/// 缓存块元数据快照
///
/// 在所属桶锁下采集，释放锁后可能立即过期，仅用于诊断和测试。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferInfo {
    /// 块 ID
    pub id: BufId,
    /// 块标识
    pub key: BlockKey,
    /// 引用计数
    pub refcnt: u32,
    /// 最后使用时间
    pub last_use: u64,
    /// 状态标志
    pub flags: BufFlags,
}

impl BufferInfo {
    pub(crate) fn of(buf: &Buffer) -> Self {
        Self {
            id: buf.id(),
            key: buf.key(),
            refcnt: buf.refcnt(),
            last_use: buf.last_use(),
            flags: buf.flags(),
        }
    }
}
