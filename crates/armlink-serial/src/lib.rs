//! # ArmLink Serial Transport Layer
//!
//! 串口传输抽象层，把无结构的字节流切分为离散的 [`SerialFrame`]。
//!
//! - [`framing`]：分帧策略（长度前缀 / 结束符），适用于任何 `Read + Write` 字节流
//! - [`uart`]：基于 `serialport` 的真实串口后端（feature `uart`，默认开启）
//! - [`mock`]：脚本化适配器与固件模拟器（feature `mock`）

use thiserror::Error;

// 重新导出 armlink-protocol 中的 SerialFrame
pub use armlink_protocol::SerialFrame;
use armlink_protocol::{MAX_PAYLOAD_LEN, ProtocolError};

pub mod framing;

#[cfg(feature = "uart")]
pub mod uart;

#[cfg(feature = "mock")]
pub mod mock;

pub use framing::{ByteStream, FramedPort, Framing};

#[cfg(feature = "uart")]
pub use uart::{UartConfig, UartPort, open_uart};

/// 串口层统一错误类型
#[derive(Error, Debug)]
pub enum SerialError {
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),

    #[cfg(feature = "uart")]
    #[error("Serial port error: {0}")]
    Port(#[from] serialport::Error),

    #[error("Frame too large: {len} bytes (max {max})", max = MAX_PAYLOAD_LEN)]
    FrameTooLarge { len: usize },

    #[error("Receive buffer overflow (limit {limit} bytes)")]
    BufferOverflow { limit: usize },

    #[error("Frame payload contains terminator byte 0x{sentinel:02X}")]
    SentinelInPayload { sentinel: u8 },

    #[error("Read timeout")]
    Timeout,

    #[error("Device disconnected")]
    Disconnected,
}

impl From<ProtocolError> for SerialError {
    fn from(error: ProtocolError) -> Self {
        match error {
            ProtocolError::FrameTooLarge { len } => SerialError::FrameTooLarge { len },
            other => SerialError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                other.to_string(),
            )),
        }
    }
}

/// 串口适配器
///
/// 每次 `send` 写出恰好一个逻辑帧，每次 `receive` 阻塞直到收到恰好一个完整帧。
/// 帧不会被拆分或合并。
pub trait SerialAdapter {
    fn send(&mut self, frame: &SerialFrame) -> Result<(), SerialError>;
    fn receive(&mut self) -> Result<SerialFrame, SerialError>;
}

impl<T: SerialAdapter + ?Sized> SerialAdapter for Box<T> {
    fn send(&mut self, frame: &SerialFrame) -> Result<(), SerialError> {
        (**self).send(frame)
    }

    fn receive(&mut self) -> Result<SerialFrame, SerialError> {
        (**self).receive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serial_error_display() {
        assert_eq!(
            SerialError::FrameTooLarge { len: 300 }.to_string(),
            "Frame too large: 300 bytes (max 255)"
        );
        assert_eq!(
            SerialError::SentinelInPayload { sentinel: 4 }.to_string(),
            "Frame payload contains terminator byte 0x04"
        );
        assert_eq!(SerialError::Timeout.to_string(), "Read timeout");
    }

    #[test]
    fn test_from_protocol_error() {
        let err: SerialError = ProtocolError::FrameTooLarge { len: 256 }.into();
        assert!(matches!(err, SerialError::FrameTooLarge { len: 256 }));

        let err: SerialError = ProtocolError::ParseError("x".into()).into();
        assert!(matches!(err, SerialError::Io(_)));
    }
}
