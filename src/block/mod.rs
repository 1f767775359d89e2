//! 块设备抽象
//!
//! block/device.rs 定义块标识与同步传输接口 [`DiskIo`]，缓存只通过它与设备交互。
//! block/mem.rs 提供内存实现 [`MemDisk`]，用于测试和启动早期。

mod device;
mod mem;

pub use device::{BlockKey, DiskIo};
pub use mem::MemDisk;
