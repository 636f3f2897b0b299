//! 驱动层错误类型定义

use armlink_protocol::{ProtocolError, RobotError};
use armlink_serial::SerialError;
use thiserror::Error;

/// 驱动层错误类型
#[derive(Error, Debug)]
pub enum DriverError {
    /// 串口传输错误
    #[error("Serial transport error: {0}")]
    Serial(#[from] SerialError),

    /// 应答无法解析
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// 控制器返回错误状态
    #[error("{0}")]
    Robot(#[from] RobotError),

    /// 命令通道已关闭（IO 线程退出）
    #[error("Command channel closed")]
    ChannelClosed,

    /// IO 线程启动失败
    #[error("IO thread error: {0}")]
    IoThread(String),
}

impl DriverError {
    /// 设备错误（若是）
    pub fn robot_error(&self) -> Option<&RobotError> {
        match self {
            DriverError::Robot(error) => Some(error),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::DriverError;
    use armlink_protocol::{ProtocolError, RobotError, RobotErrorCode};
    use armlink_serial::SerialError;

    #[test]
    fn test_driver_error_display() {
        let driver_error = DriverError::Serial(SerialError::Timeout);
        assert_eq!(driver_error.to_string(), "Serial transport error: Read timeout");

        let driver_error = DriverError::Protocol(ProtocolError::InvalidLength {
            expected: 21,
            actual: 1,
        });
        assert!(driver_error.to_string().contains("Invalid frame length"));

        // 设备错误原样透出固定描述
        let driver_error =
            DriverError::Robot(RobotError::from_code(RobotErrorCode::ARM_NOT_CALIBRATED));
        assert_eq!(driver_error.to_string(), "Robot error 12: Arm is not calibrated.");

        assert_eq!(DriverError::ChannelClosed.to_string(), "Command channel closed");
    }

    #[test]
    fn test_from_conversions() {
        let driver_error: DriverError = SerialError::Disconnected.into();
        assert!(matches!(driver_error, DriverError::Serial(SerialError::Disconnected)));

        let driver_error: DriverError = RobotError::from_code(RobotErrorCode(15)).into();
        assert_eq!(
            driver_error.robot_error().map(|error| error.code),
            Some(RobotErrorCode::ARM_IN_MOVE)
        );
        assert!(DriverError::ChannelClosed.robot_error().is_none());
    }
}
