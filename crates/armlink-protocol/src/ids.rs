//! 动作 ID 与命令 ID 定义
//!
//! 两个编号空间互不相关：
//! - [`ActionId`]：串口帧首字节，标识控制器执行的动作
//! - [`CommandId`]：网络文本请求首字段，标识操作员发起的命令

use crate::ProtocolError;
use num_enum::{IntoPrimitive, TryFromPrimitive};

// ============================================================================
// 串口动作 ID
// ============================================================================

/// 串口动作 ID（封闭集合）
///
/// 1~8 与控制器固件的动作表一致，夹爪动作在其后扩展。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive, IntoPrimitive)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum ActionId {
    /// 设置新的关节角目标
    Move = 1,
    /// 设置运动速度
    SetSpeed = 2,
    /// 查询当前关节角
    GetCurrentPosition = 3,
    /// 查询是否已标定
    CheckCalibration = 4,
    /// 进入标定模式
    StartCalibration = 5,
    /// 以当前位置为参考点完成标定
    FinishCalibration = 6,
    /// 放弃标定
    AbortCalibration = 7,
    /// 查询是否空闲（无运动）
    CheckIdle = 8,
    /// 张开夹爪
    OpenGripper = 9,
    /// 闭合夹爪
    CloseGripper = 10,
}

impl ActionId {
    /// 从字节解析，未知值视为协议违例
    pub fn from_byte(value: u8) -> Result<Self, ProtocolError> {
        Self::try_from(value).map_err(|_| ProtocolError::UnknownAction { id: value })
    }

    /// 应答是否携带关节角
    pub fn reply_carries_angles(self) -> bool {
        matches!(self, ActionId::Move | ActionId::GetCurrentPosition)
    }

    /// 是否为简单动作（请求帧只有 ActionId 一个字节）
    pub fn is_simple(self) -> bool {
        !matches!(self, ActionId::Move | ActionId::SetSpeed)
    }
}

// ============================================================================
// 网络命令 ID
// ============================================================================

/// 网络命令 ID（封闭集合，编号稳定）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive, IntoPrimitive)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum CommandId {
    StartVideoStream = 1,
    StopVideoStream = 2,
    MoveRobot = 3,
    SetSpeed = 4,
    GetPosition = 5,
    Calibrate = 6,
    OpenGripper = 7,
    CloseGripper = 8,
}

impl CommandId {
    /// 命令要求的最少参数个数
    pub fn min_args(self) -> usize {
        match self {
            CommandId::MoveRobot => crate::JOINT_COUNT,
            CommandId::SetSpeed => 1,
            CommandId::StartVideoStream
            | CommandId::StopVideoStream
            | CommandId::GetPosition
            | CommandId::Calibrate
            | CommandId::OpenGripper
            | CommandId::CloseGripper => 0,
        }
    }
}
