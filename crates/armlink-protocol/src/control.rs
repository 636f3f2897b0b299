//! 请求帧构建
//!
//! 串口请求的字节布局：
//!
//! | 动作 | 字节 0 | 负载 |
//! |------|--------|------|
//! | `Move` | ActionId | 5 × f32 LE，偏移 1/5/9/13/17（Z, Y, X, V, W） |
//! | `SetSpeed` | ActionId | 1 × f32 LE，偏移 1 |
//! | 简单动作 | ActionId | 无 |

use crate::{
    ActionId, F32_SIZE, FRAME_WITH_ANGLES_LEN, JOINT_COUNT, ProtocolError, SET_SPEED_FRAME_LEN,
    SPEED_OFFSET, SerialFrame, V_JOINT_ANGLE_OFFSET, W_JOINT_ANGLE_OFFSET, X_JOINT_ANGLE_OFFSET,
    Y_JOINT_ANGLE_OFFSET, Z_JOINT_ANGLE_OFFSET, f32_to_bytes_le, read_f32_le,
};

// ============================================================================
// 关节角
// ============================================================================

/// 五个关节的角度（度）
///
/// 字段按轴命名；线上顺序固定为 **Z, Y, X, V, W**，
/// 与字段声明顺序无关。网络文本协议沿用同一顺序。
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct JointsAngles {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub v: f32,
    pub w: f32,
}

impl JointsAngles {
    pub fn new(x: f32, y: f32, z: f32, v: f32, w: f32) -> Self {
        Self { x, y, z, v, w }
    }

    /// 按线序（Z, Y, X, V, W）输出
    pub fn to_wire_order(&self) -> [f32; JOINT_COUNT] {
        [self.z, self.y, self.x, self.v, self.w]
    }

    /// 按线序（Z, Y, X, V, W）构建
    pub fn from_wire_order(values: [f32; JOINT_COUNT]) -> Self {
        let [z, y, x, v, w] = values;
        Self { x, y, z, v, w }
    }

    /// 逐位比较（NaN 也能比较）
    pub fn bitwise_eq(&self, other: &Self) -> bool {
        self.to_wire_order()
            .iter()
            .zip(other.to_wire_order().iter())
            .all(|(a, b)| a.to_bits() == b.to_bits())
    }
}

/// 关节角在帧中的偏移，与 [`JointsAngles::to_wire_order`] 顺序一致
const ANGLE_OFFSETS: [usize; JOINT_COUNT] = [
    Z_JOINT_ANGLE_OFFSET,
    Y_JOINT_ANGLE_OFFSET,
    X_JOINT_ANGLE_OFFSET,
    V_JOINT_ANGLE_OFFSET,
    W_JOINT_ANGLE_OFFSET,
];

/// 将关节角写入 `buffer`（长度至少 [`FRAME_WITH_ANGLES_LEN`]）
pub(crate) fn write_angles(buffer: &mut [u8], angles: &JointsAngles) {
    for (offset, value) in ANGLE_OFFSETS.iter().zip(angles.to_wire_order()) {
        buffer[*offset..*offset + F32_SIZE].copy_from_slice(&f32_to_bytes_le(value));
    }
}

/// 从帧数据读取关节角，长度不足时返回错误
pub(crate) fn read_angles(data: &[u8]) -> Result<JointsAngles, ProtocolError> {
    if data.len() < FRAME_WITH_ANGLES_LEN {
        return Err(ProtocolError::InvalidLength {
            expected: FRAME_WITH_ANGLES_LEN,
            actual: data.len(),
        });
    }
    let mut values = [0.0f32; JOINT_COUNT];
    for (value, offset) in values.iter_mut().zip(ANGLE_OFFSETS) {
        *value = read_f32_le(data, offset);
    }
    Ok(JointsAngles::from_wire_order(values))
}

// ============================================================================
// 请求
// ============================================================================

/// 串口请求
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ArmRequest {
    /// 移动到目标关节角
    Move(JointsAngles),
    /// 设置速度
    SetSpeed(f32),
    /// 只有 ActionId 的简单动作
    Simple(ActionId),
}

impl ArmRequest {
    pub fn action_id(&self) -> ActionId {
        match self {
            ArmRequest::Move(_) => ActionId::Move,
            ArmRequest::SetSpeed(_) => ActionId::SetSpeed,
            ArmRequest::Simple(action) => *action,
        }
    }

    /// 编码为串口帧
    pub fn to_frame(&self) -> SerialFrame {
        let data = match self {
            ArmRequest::Move(angles) => {
                let mut data = vec![0u8; FRAME_WITH_ANGLES_LEN];
                data[0] = ActionId::Move.into();
                write_angles(&mut data, angles);
                data
            },
            ArmRequest::SetSpeed(speed) => {
                let mut data = vec![0u8; SET_SPEED_FRAME_LEN];
                data[0] = ActionId::SetSpeed.into();
                data[SPEED_OFFSET..SPEED_OFFSET + F32_SIZE]
                    .copy_from_slice(&f32_to_bytes_le(*speed));
                data
            },
            ArmRequest::Simple(action) => vec![u8::from(*action)],
        };
        SerialFrame::from_layout(data)
    }

    /// 从串口帧解码（控制器侧 / 模拟器使用）
    pub fn decode(frame: &SerialFrame) -> Result<Self, ProtocolError> {
        let data = frame.data();
        let id = frame.first_byte().ok_or(ProtocolError::InvalidLength {
            expected: 1,
            actual: 0,
        })?;
        match ActionId::from_byte(id)? {
            ActionId::Move => Ok(ArmRequest::Move(read_angles(data)?)),
            ActionId::SetSpeed => {
                if data.len() < SET_SPEED_FRAME_LEN {
                    return Err(ProtocolError::InvalidLength {
                        expected: SET_SPEED_FRAME_LEN,
                        actual: data.len(),
                    });
                }
                Ok(ArmRequest::SetSpeed(read_f32_le(data, SPEED_OFFSET)))
            },
            action => Ok(ArmRequest::Simple(action)),
        }
    }
}
