//! 错误类型定义
//!
//! 缓存只有两类致命错误（所有权违规、缓冲池耗尽），它们代表编程错误或
//! 设计容量被突破，而不是可重试的瞬时状况。设备错误由 [`crate::DiskIo`]
//! 返回并原样向上传播。

use core::fmt;

/// 缓存操作错误
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Error {
    kind: ErrorKind,
    message: &'static str,
}

/// 错误类别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorKind {
    /// I/O 错误（来自设备传输）
    Io,
    /// 无效参数（配置错误）
    InvalidInput,
    /// 未持有独占锁却执行 flush / release
    OwnershipViolation,
    /// 未命中时所有桶中都没有引用计数为 0 的缓存块
    PoolExhausted,
}

impl ErrorKind {
    /// 是否为致命错误
    ///
    /// 致命错误在公开 API 上直接中止当前执行上下文。
    pub const fn is_fatal(self) -> bool {
        matches!(self, ErrorKind::OwnershipViolation | ErrorKind::PoolExhausted)
    }
}

impl Error {
    /// 创建新错误
    pub const fn new(kind: ErrorKind, message: &'static str) -> Self {
        Self { kind, message }
    }

    /// 获取错误类型
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// 获取错误消息
    pub const fn message(&self) -> &'static str {
        self.message
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

/// Result 类型别名
pub type Result<T> = core::result::Result<T, Error>;

/// 致命错误：记录日志后中止当前执行上下文
#[cold]
#[track_caller]
pub(crate) fn fatal(err: Error) -> ! {
    log::error!("[BCACHE] fatal: {}", err);
    panic!("bcache: {}", err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::format;

    #[test]
    fn test_fatal_kinds() {
        assert!(ErrorKind::OwnershipViolation.is_fatal());
        assert!(ErrorKind::PoolExhausted.is_fatal());
        assert!(!ErrorKind::Io.is_fatal());
        assert!(!ErrorKind::InvalidInput.is_fatal());
    }

    #[test]
    fn test_display() {
        let err = Error::new(ErrorKind::PoolExhausted, "no buffers");
        assert_eq!(format!("{}", err), "PoolExhausted: no buffers");
        assert_eq!(err.kind(), ErrorKind::PoolExhausted);
        assert_eq!(err.message(), "no buffers");
    }

    #[test]
    #[should_panic(expected = "OwnershipViolation")]
    fn test_fatal_panics() {
        fatal(Error::new(ErrorKind::OwnershipViolation, "release"));
    }
}
