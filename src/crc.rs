//! CRC32 校验和计算
//!
//! 用于缓存块负载的诊断：载入和写回时记录校验和，便于比对设备内容。

/// 计算负载校验和
#[inline]
pub fn checksum(data: &[u8]) -> u32 {
    crc32fast::hash(data)
}
