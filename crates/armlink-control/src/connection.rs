//! 消息连接抽象
//!
//! 标定流程的交互步骤需要直接读写操作员的连接（绕过常规分发），
//! 这里只约定"一次读/写一条完整文本消息"，具体传输由上层提供。

use thiserror::Error;

/// 连接错误
#[derive(Error, Debug)]
pub enum ConnectionError {
    /// 对端已关闭连接
    #[error("Connection closed by peer")]
    Closed,

    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Message too long: more than {max} bytes")]
    MessageTooLong { max: usize },

    #[error("Message is not valid UTF-8")]
    InvalidUtf8,
}

impl ConnectionError {
    /// 连接是否已不可用（之后的读写都不会成功）
    ///
    /// 过长消息和非法编码只影响当前这一条消息。
    pub fn is_fatal(&self) -> bool {
        matches!(self, ConnectionError::Closed | ConnectionError::Io(_))
    }
}

/// 面向消息的双工连接
pub trait MessageConnection {
    /// 阻塞读取下一条消息
    fn read_message(&mut self) -> Result<String, ConnectionError>;

    /// 写出一条消息
    fn write_message(&mut self, message: &str) -> Result<(), ConnectionError>;
}

impl<T: MessageConnection + ?Sized> MessageConnection for &mut T {
    fn read_message(&mut self) -> Result<String, ConnectionError> {
        (**self).read_message()
    }

    fn write_message(&mut self, message: &str) -> Result<(), ConnectionError> {
        (**self).write_message(message)
    }
}
