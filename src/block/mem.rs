//! 内存块设备
//!
//! 稀疏存储：从未写过的块读出全零。用于测试和系统启动早期。

use super::{BlockKey, DiskIo};
use crate::error::{Error, ErrorKind, Result};
use alloc::boxed::Box;
use alloc::collections::BTreeMap;
use core::sync::atomic::{AtomicU64, Ordering};
use spin::Mutex;

/// 内存块设备
pub struct MemDisk {
    block_size: usize,
    blocks: Mutex<BTreeMap<BlockKey, Box<[u8]>>>,
    reads: AtomicU64,
    writes: AtomicU64,
}

impl MemDisk {
    /// 创建块大小为 `block_size` 的空设备
    pub fn new(block_size: usize) -> Self {
        Self {
            block_size,
            blocks: Mutex::new(BTreeMap::new()),
            reads: AtomicU64::new(0),
            writes: AtomicU64::new(0),
        }
    }

    /// 块大小
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// 物理读取次数
    pub fn reads(&self) -> u64 {
        self.reads.load(Ordering::Relaxed)
    }

    /// 物理写入次数
    pub fn writes(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }

    /// 直接读取设备上的块内容（绕过缓存），从未写过的块返回 None
    pub fn snapshot(&self, key: BlockKey) -> Option<Box<[u8]>> {
        self.blocks.lock().get(&key).cloned()
    }

    fn check_len(&self, len: usize) -> Result<()> {
        if len != self.block_size {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                "buffer length does not match device block size",
            ));
        }
        Ok(())
    }
}

impl DiskIo for MemDisk {
    fn read_block(&self, key: BlockKey, buf: &mut [u8]) -> Result<()> {
        self.check_len(buf.len())?;
        self.reads.fetch_add(1, Ordering::Relaxed);
        match self.blocks.lock().get(&key) {
            Some(data) => buf.copy_from_slice(data),
            None => buf.fill(0),
        }
        Ok(())
    }

    fn write_block(&self, key: BlockKey, buf: &[u8]) -> Result<()> {
        self.check_len(buf.len())?;
        self.writes.fetch_add(1, Ordering::Relaxed);
        self.blocks.lock().insert(key, buf.into());
        Ok(())
    }
}

impl core::fmt::Debug for MemDisk {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("MemDisk")
            .field("block_size", &self.block_size)
            .field("blocks", &self.blocks.lock().len())
            .field("reads", &self.reads())
            .field("writes", &self.writes())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    #[test]
    fn test_unwritten_block_reads_zero() {
        let disk = MemDisk::new(64);
        let mut buf = vec![0xAAu8; 64];
        disk.read_block(BlockKey::new(1, 7), &mut buf).unwrap();
        assert!(buf.iter().all(|&b| b == 0));
        assert_eq!(disk.reads(), 1);
    }

    #[test]
    fn test_write_then_read() {
        let disk = MemDisk::new(64);
        let key = BlockKey::new(1, 3);
        disk.write_block(key, &[0x5Au8; 64]).unwrap();

        let mut buf = vec![0u8; 64];
        disk.read_block(key, &mut buf).unwrap();
        assert_eq!(buf, vec![0x5Au8; 64]);
        assert_eq!(disk.writes(), 1);
        assert_eq!(disk.snapshot(key).unwrap().len(), 64);
        assert!(disk.snapshot(BlockKey::new(2, 3)).is_none());
    }

    #[test]
    fn test_length_mismatch() {
        let disk = MemDisk::new(64);
        let mut buf = vec![0u8; 32];
        let err = disk.read_block(BlockKey::new(1, 0), &mut buf).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }
}
