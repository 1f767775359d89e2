//! 块设备传输接口

use crate::error::Result;
use alloc::sync::Arc;
use core::fmt;

/// 块标识：(设备号, 块号)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct BlockKey {
    /// 设备号
    pub dev: u32,
    /// 块号
    pub blockno: u32,
}

impl BlockKey {
    /// 创建块标识
    pub const fn new(dev: u32, blockno: u32) -> Self {
        Self { dev, blockno }
    }
}

impl fmt::Display for BlockKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "dev={} blockno={}", self.dev, self.blockno)
    }
}

/// 同步块传输接口
///
/// 实现此 trait 以提供底层设备访问。两个方法都是同步的，可以阻塞调用者；
/// 缓存在持有缓存块独占锁时调用它们，绝不会在持有桶锁或全局锁时调用。
///
/// # 示例
///
/// ```rust,ignore
/// use bcache_core::{BlockKey, DiskIo, Result};
///
/// struct VirtioDisk { /* ... */ }
///
/// impl DiskIo for VirtioDisk {
///     fn read_block(&self, key: BlockKey, buf: &mut [u8]) -> Result<()> {
///         // 提交读请求并等待完成
///         Ok(())
///     }
///
///     fn write_block(&self, key: BlockKey, buf: &[u8]) -> Result<()> {
///         // 提交写请求并等待完成
///         Ok(())
///     }
/// }
/// ```
pub trait DiskIo: Send + Sync {
    /// 读取一个完整的块到 `buf`（长度等于缓存块大小）
    fn read_block(&self, key: BlockKey, buf: &mut [u8]) -> Result<()>;

    /// 将 `buf` 写入设备
    fn write_block(&self, key: BlockKey, buf: &[u8]) -> Result<()>;
}

impl<T: DiskIo + ?Sized> DiskIo for Arc<T> {
    fn read_block(&self, key: BlockKey, buf: &mut [u8]) -> Result<()> {
        (**self).read_block(key, buf)
    }

    fn write_block(&self, key: BlockKey, buf: &[u8]) -> Result<()> {
        (**self).write_block(key, buf)
    }
}

impl<T: DiskIo + ?Sized> DiskIo for &T {
    fn read_block(&self, key: BlockKey, buf: &mut [u8]) -> Result<()> {
        (**self).read_block(key, buf)
    }

    fn write_block(&self, key: BlockKey, buf: &[u8]) -> Result<()> {
        (**self).write_block(key, buf)
    }
}
