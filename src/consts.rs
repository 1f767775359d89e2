//! 常量定义
//!
//! 缓冲池容量与桶数量在构建期固定，运行期通过 [`crate::CacheConfig`] 选择。

/// 默认块大小（字节）
pub const BSIZE: usize = 1024;

/// 单个文件系统操作最多写入的块数
pub const MAXOPBLOCKS: usize = 10;

/// 默认缓冲池容量（缓存块数量）
pub const NBUF: usize = MAXOPBLOCKS * 3;

/// 默认桶数量
///
/// 与缓冲池容量无关，选择一个较小的素数以平衡分片数量和单桶竞争。
pub const NBUCKET: usize = 13;
