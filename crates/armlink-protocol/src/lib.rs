//! # ArmLink Protocol
//!
//! 机械臂通信协议定义（无硬件依赖）
//!
//! ## 模块
//!
//! - `ids`: 串口动作 ID 与网络命令 ID
//! - `constants`: 协议常量定义（偏移、长度、分隔符）
//! - `control`: 请求帧构建（Move / SetSpeed / 简单动作）
//! - `feedback`: 应答帧解析与设备错误码
//! - `command`: 网络侧 `$` 分隔文本协议（请求解析、响应序列化）
//!
//! ## 字节序
//!
//! 当前固件版本使用小端字节序（little-endian）传输 32 位浮点数。
//! 早期固件使用大端字节序，两者不兼容，本 crate 只支持小端版本。

pub mod command;
pub mod constants;
pub mod control;
pub mod feedback;
pub mod ids;

// 重新导出常用类型
pub use command::*;
pub use constants::*;
pub use control::*;
pub use feedback::*;
pub use ids::*;

use thiserror::Error;

/// 串口帧的统一抽象
///
/// `SerialFrame` 是协议层和传输层之间的中间抽象：
///
/// ```text
/// Protocol Layer (armlink-protocol)
///     ↓ ArmRequest::to_frame() 构建 / ArmReply::parse() 解析
/// SerialFrame (此类型)
///     ↓ 分帧逻辑在串口层实现（长度前缀 / 结束符）
/// Serial Layer (armlink-serial)
///     ↓ serialport / mock
/// Hardware
/// ```
///
/// 帧内容不包含分帧字节。一个帧最多 [`MAX_PAYLOAD_LEN`] 字节，
/// 超出长度时构造失败，**不会**静默截断。
///
/// ```rust
/// use armlink_protocol::SerialFrame;
///
/// let frame = SerialFrame::new(&[1, 2, 3]).unwrap();
/// assert_eq!(frame.data(), &[1, 2, 3]);
/// assert!(SerialFrame::new(&[0u8; 256]).is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SerialFrame {
    data: Vec<u8>,
}

impl SerialFrame {
    /// 从字节切片创建帧
    pub fn new(data: &[u8]) -> Result<Self, ProtocolError> {
        Self::from_vec(data.to_vec())
    }

    /// 从 Vec 创建帧（避免额外拷贝）
    pub fn from_vec(data: Vec<u8>) -> Result<Self, ProtocolError> {
        if data.len() > MAX_PAYLOAD_LEN {
            return Err(ProtocolError::FrameTooLarge { len: data.len() });
        }
        Ok(Self { data })
    }

    /// 协议层内部构造（长度由帧布局常量保证）
    pub(crate) fn from_layout(data: Vec<u8>) -> Self {
        debug_assert!(data.len() <= MAX_PAYLOAD_LEN);
        Self { data }
    }

    /// 获取帧数据
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// 帧长度（不含分帧字节）
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// 首字节（请求帧为 ActionId，应答帧为状态字节）
    pub fn first_byte(&self) -> Option<u8> {
        self.data.first().copied()
    }
}

/// 协议解析错误类型
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProtocolError {
    #[error("Invalid frame length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("Frame too large: {len} bytes (max {max})", max = MAX_PAYLOAD_LEN)]
    FrameTooLarge { len: usize },

    #[error("Unknown action id: {id}")]
    UnknownAction { id: u8 },

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Invalid parameter count: expected {expected}, got {actual}")]
    InvalidParameterCount { expected: usize, actual: usize },

    #[error("Invalid float argument at position {index}: {value:?}")]
    InvalidArgument { index: usize, value: String },
}

/// 字节序转换工具函数
///
/// 当前协议版本使用小端字节序。
///
/// 小端字节序转 f32
pub fn bytes_to_f32_le(bytes: [u8; 4]) -> f32 {
    f32::from_le_bytes(bytes)
}

/// f32 转小端字节序
pub fn f32_to_bytes_le(value: f32) -> [u8; 4] {
    value.to_le_bytes()
}

/// 从切片指定偏移读取小端 f32
///
/// 调用者负责保证 `offset + 4 <= data.len()`。
pub(crate) fn read_f32_le(data: &[u8], offset: usize) -> f32 {
    let mut bytes = [0u8; 4];
    bytes.copy_from_slice(&data[offset..offset + F32_SIZE]);
    bytes_to_f32_le(bytes)
}
