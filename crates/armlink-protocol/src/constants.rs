//! 协议常量定义
//!
//! 集中定义帧布局、分帧和文本协议相关的常量，避免在代码中散落"魔法数"。

// ============================================================================
// 串口帧布局
// ============================================================================

/// 32 位浮点数字节数
pub const F32_SIZE: usize = 4;

/// 动作 ID / 状态字节偏移
pub const ACTION_ID_OFFSET: usize = 0;
pub const ACTION_ID_SIZE: usize = 1;

/// 关节角偏移（线序 Z, Y, X, V, W）
pub const Z_JOINT_ANGLE_OFFSET: usize = ACTION_ID_OFFSET + ACTION_ID_SIZE;
pub const Y_JOINT_ANGLE_OFFSET: usize = Z_JOINT_ANGLE_OFFSET + F32_SIZE;
pub const X_JOINT_ANGLE_OFFSET: usize = Y_JOINT_ANGLE_OFFSET + F32_SIZE;
pub const V_JOINT_ANGLE_OFFSET: usize = X_JOINT_ANGLE_OFFSET + F32_SIZE;
pub const W_JOINT_ANGLE_OFFSET: usize = V_JOINT_ANGLE_OFFSET + F32_SIZE;

/// 关节数量
pub const JOINT_COUNT: usize = 5;

/// 带关节角的帧长度（请求和应答相同：1 + 5 * 4 = 21）
pub const FRAME_WITH_ANGLES_LEN: usize = ACTION_ID_SIZE + JOINT_COUNT * F32_SIZE;

/// 速度字段偏移
pub const SPEED_OFFSET: usize = ACTION_ID_OFFSET + ACTION_ID_SIZE;

/// 设置速度帧长度（1 + 4 = 5）
pub const SET_SPEED_FRAME_LEN: usize = SPEED_OFFSET + F32_SIZE;

/// 状态字节阈值：>= 10 表示设备错误码
pub const ROBOT_ERROR_THRESHOLD: u8 = 10;

// ============================================================================
// 分帧
// ============================================================================

/// 单帧最大负载（长度前缀为 1 字节）
pub const MAX_PAYLOAD_LEN: usize = u8::MAX as usize;

/// 接收缓冲区上限
pub const RECEIVE_BUFFER_LEN: usize = 256;

/// 结束符分帧的默认结束字节（EOT）
pub const DEFAULT_FRAME_TERMINATOR: u8 = 0x04;

// ============================================================================
// 网络文本协议
// ============================================================================

/// 字段分隔符
pub const FIELD_DELIMITER: char = '$';

/// 浮点参数输出精度（小数位数）
pub const FLOAT_PRECISION: usize = 6;
