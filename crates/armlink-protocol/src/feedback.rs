//! 应答帧解析
//!
//! 应答字节 0 为状态字节：
//! - `>= 10`：设备错误码，之后没有负载
//! - `< 10`：状态值本身不使用；`Move` 和 `GetCurrentPosition` 之后跟随
//!   5 × f32 LE（偏移与请求相同，线序 Z, Y, X, V, W）

use crate::control::{read_angles, write_angles};
use crate::{
    ActionId, FRAME_WITH_ANGLES_LEN, JointsAngles, ProtocolError, ROBOT_ERROR_THRESHOLD,
    SerialFrame,
};
use std::fmt;
use thiserror::Error;

/// 固件返回的成功状态值
pub const STATUS_OK: u8 = 1;

// ============================================================================
// 设备错误码
// ============================================================================

/// 设备错误码（状态字节 >= 10）
///
/// 未在表中的错误码仍然是错误，只是没有预置描述。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RobotErrorCode(pub u8);

impl RobotErrorCode {
    pub const INVALID_NUMBER_OF_PARAMETERS: Self = Self(10);
    pub const UNKNOWN_ACTION: Self = Self(11);
    pub const ARM_NOT_CALIBRATED: Self = Self(12);
    pub const BEYOND_MAX_SPEED_LIMIT: Self = Self(13);
    pub const SPEED_TOO_SLOW: Self = Self(14);
    pub const ARM_IN_MOVE: Self = Self(15);
    pub const ARM_NOT_IN_CALIBRATION_MODE: Self = Self(16);

    /// 状态字节是否表示设备错误
    pub fn is_error_status(status: u8) -> bool {
        status >= ROBOT_ERROR_THRESHOLD
    }

    /// 固定的错误描述表
    pub fn message(self) -> Option<&'static str> {
        match self {
            Self::INVALID_NUMBER_OF_PARAMETERS => {
                Some("Invalid number of parameters for requested action.")
            },
            Self::UNKNOWN_ACTION => Some("Requested action is unknown to the controller."),
            Self::ARM_NOT_CALIBRATED => Some("Arm is not calibrated."),
            Self::BEYOND_MAX_SPEED_LIMIT => Some("Requested speed is beyond max speed limit."),
            Self::SPEED_TOO_SLOW => Some("Requested speed is below min speed limit."),
            Self::ARM_IN_MOVE => Some("Arm is in move."),
            Self::ARM_NOT_IN_CALIBRATION_MODE => Some("Arm is not in calibration mode."),
            _ => None,
        }
    }
}

impl fmt::Display for RobotErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 设备侧错误（控制器返回错误状态）
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("Robot error {code}{}", message_suffix(.message))]
pub struct RobotError {
    pub code: RobotErrorCode,
    pub message: Option<&'static str>,
}

impl RobotError {
    /// 根据错误码构建（描述取自固定表）
    pub fn from_code(code: RobotErrorCode) -> Self {
        Self {
            code,
            message: code.message(),
        }
    }
}

fn message_suffix(message: &Option<&'static str>) -> String {
    match message {
        Some(message) => format!(": {message}"),
        None => String::new(),
    }
}

// ============================================================================
// 应答
// ============================================================================

/// 解析后的串口应答
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ArmReply {
    /// 仅状态字节
    Ack { status: u8 },
    /// 状态字节 + 关节角
    Angles { status: u8, angles: JointsAngles },
    /// 设备错误
    Failed(RobotError),
}

impl ArmReply {
    /// 成功应答（不带负载）
    pub fn ok() -> Self {
        ArmReply::Ack { status: STATUS_OK }
    }

    /// 成功应答（带关节角）
    pub fn with_angles(angles: JointsAngles) -> Self {
        ArmReply::Angles {
            status: STATUS_OK,
            angles,
        }
    }

    /// 错误应答
    pub fn failed(code: RobotErrorCode) -> Self {
        ArmReply::Failed(RobotError::from_code(code))
    }

    /// 按请求的动作解析应答帧
    pub fn parse(action: ActionId, frame: &SerialFrame) -> Result<Self, ProtocolError> {
        let status = frame.first_byte().ok_or(ProtocolError::InvalidLength {
            expected: 1,
            actual: 0,
        })?;

        if RobotErrorCode::is_error_status(status) {
            return Ok(ArmReply::Failed(RobotError::from_code(RobotErrorCode(status))));
        }

        if action.reply_carries_angles() {
            let angles = read_angles(frame.data())?;
            Ok(ArmReply::Angles { status, angles })
        } else {
            Ok(ArmReply::Ack { status })
        }
    }

    /// 编码为应答帧（模拟控制器使用）
    pub fn to_frame(&self) -> SerialFrame {
        let data = match self {
            ArmReply::Ack { status } => vec![*status],
            ArmReply::Angles { status, angles } => {
                let mut data = vec![0u8; FRAME_WITH_ANGLES_LEN];
                data[0] = *status;
                write_angles(&mut data, angles);
                data
            },
            ArmReply::Failed(error) => vec![error.code.0],
        };
        SerialFrame::from_layout(data)
    }

    pub fn angles(&self) -> Option<JointsAngles> {
        match self {
            ArmReply::Angles { angles, .. } => Some(*angles),
            _ => None,
        }
    }

    /// 转换为 `Result`，设备错误映射为 `Err`
    pub fn into_result(self) -> Result<Self, RobotError> {
        match self {
            ArmReply::Failed(error) => Err(error),
            reply => Ok(reply),
        }
    }
}
