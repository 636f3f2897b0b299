//! 控制器固件模拟器
//!
//! 复现固件对每个动作的校验顺序与应答内容，供驱动层和上层流程做集成测试。
//! 步进轴角度按 `DEG_PER_STEP / 齿轮比` 量化，舵机轴取整，`Move` 应答返回量化后的角度。

use crate::{SerialAdapter, SerialError, SerialFrame};
use armlink_protocol::{
    ActionId, ArmReply, ArmRequest, JointsAngles, ProtocolError, RobotErrorCode,
};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

const DEG_PER_STEP: f32 = 0.1125;
const X_GEAR_RATIO: f32 = 4.89;
const Y_GEAR_RATIO: f32 = 6.0;
const Z_GEAR_RATIO: f32 = 4.2;

/// 固件允许的速度范围
pub const MIN_SPEED: f32 = 50.0;
pub const MAX_SPEED: f32 = 1000.0;

fn quantize_stepper(angle: f32, gear_ratio: f32) -> f32 {
    let deg_per_step = DEG_PER_STEP / gear_ratio;
    (angle / deg_per_step).round() * deg_per_step
}

fn quantize(target: &JointsAngles) -> JointsAngles {
    JointsAngles {
        x: quantize_stepper(target.x, X_GEAR_RATIO),
        y: quantize_stepper(target.y, Y_GEAR_RATIO),
        z: quantize_stepper(target.z, Z_GEAR_RATIO),
        v: target.v.round(),
        w: target.w.round(),
    }
}

/// 模拟器状态快照
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArmSnapshot {
    pub calibrated: bool,
    pub calibration_mode: bool,
    pub speed: f32,
    pub position: JointsAngles,
    pub gripper_open: bool,
    /// 还需要多少次空闲查询才会报告静止
    pub busy_polls: u32,
}

impl Default for ArmSnapshot {
    fn default() -> Self {
        Self {
            calibrated: false,
            calibration_mode: false,
            speed: MIN_SPEED,
            position: JointsAngles::default(),
            gripper_open: false,
            busy_polls: 0,
        }
    }
}

#[derive(Default)]
struct SimState {
    arm: ArmSnapshot,
    /// 每次 Move 之后 `CheckIdle` 报告"运动中"的次数
    move_busy_polls: u32,
    /// 一次性故障注入
    failures: HashMap<ActionId, RobotErrorCode>,
    pending: VecDeque<SerialFrame>,
    requests: Vec<ArmRequest>,
    disconnected: bool,
}

impl SimState {
    fn execute(&mut self, request: ArmRequest) -> ArmReply {
        if let Some(code) = self.failures.remove(&request.action_id()) {
            return ArmReply::failed(code);
        }

        let arm = &mut self.arm;
        let usable = arm.calibrated || arm.calibration_mode;
        match request {
            ArmRequest::Move(target) => {
                if !usable {
                    return ArmReply::failed(RobotErrorCode::ARM_NOT_CALIBRATED);
                }
                let fallback = quantize(&target);
                arm.position = fallback;
                arm.busy_polls = self.move_busy_polls;
                ArmReply::with_angles(fallback)
            },
            ArmRequest::SetSpeed(speed) => {
                if arm.busy_polls > 0 {
                    ArmReply::failed(RobotErrorCode::ARM_IN_MOVE)
                } else if speed > MAX_SPEED {
                    ArmReply::failed(RobotErrorCode::BEYOND_MAX_SPEED_LIMIT)
                } else if speed < MIN_SPEED || speed.is_nan() {
                    ArmReply::failed(RobotErrorCode::SPEED_TOO_SLOW)
                } else {
                    arm.speed = speed;
                    ArmReply::ok()
                }
            },
            ArmRequest::Simple(ActionId::GetCurrentPosition) => {
                if !usable {
                    return ArmReply::failed(RobotErrorCode::ARM_NOT_CALIBRATED);
                }
                ArmReply::with_angles(arm.position)
            },
            ArmRequest::Simple(ActionId::CheckCalibration) => {
                if arm.calibrated {
                    ArmReply::ok()
                } else {
                    ArmReply::failed(RobotErrorCode::ARM_NOT_CALIBRATED)
                }
            },
            ArmRequest::Simple(ActionId::StartCalibration) => {
                arm.calibration_mode = true;
                ArmReply::ok()
            },
            ArmRequest::Simple(ActionId::FinishCalibration) => {
                if !arm.calibration_mode {
                    return ArmReply::failed(RobotErrorCode::ARM_NOT_IN_CALIBRATION_MODE);
                }
                if arm.busy_polls > 0 {
                    return ArmReply::failed(RobotErrorCode::ARM_IN_MOVE);
                }
                arm.position.x = 0.0;
                arm.position.y = 0.0;
                arm.position.z = 0.0;
                arm.calibrated = true;
                arm.calibration_mode = false;
                ArmReply::ok()
            },
            ArmRequest::Simple(ActionId::AbortCalibration) => {
                if !arm.calibration_mode {
                    return ArmReply::failed(RobotErrorCode::ARM_NOT_IN_CALIBRATION_MODE);
                }
                arm.calibration_mode = false;
                ArmReply::ok()
            },
            ArmRequest::Simple(ActionId::CheckIdle) => {
                if arm.busy_polls > 0 {
                    arm.busy_polls -= 1;
                    ArmReply::failed(RobotErrorCode::ARM_IN_MOVE)
                } else {
                    ArmReply::ok()
                }
            },
            ArmRequest::Simple(ActionId::OpenGripper) => {
                arm.gripper_open = true;
                ArmReply::ok()
            },
            ArmRequest::Simple(ActionId::CloseGripper) => {
                arm.gripper_open = false;
                ArmReply::ok()
            },
            // Move / SetSpeed 不会以 Simple 形式解码
            ArmRequest::Simple(ActionId::Move | ActionId::SetSpeed) => {
                ArmReply::failed(RobotErrorCode::INVALID_NUMBER_OF_PARAMETERS)
            },
        }
    }
}

/// 固件模拟器
///
/// 每次 `send` 立即计算应答并放入待读队列；待读队列为空时 `receive`
/// 返回 [`SerialError::Timeout`]，与控制器不应答时的表现一致。
#[derive(Clone, Default)]
pub struct SimulatedArm {
    state: Arc<Mutex<SimState>>,
}

impl SimulatedArm {
    /// 未标定、非标定模式的初始状态
    pub fn new() -> Self {
        Self::default()
    }

    /// 已标定的初始状态
    pub fn calibrated() -> Self {
        let arm = Self::new();
        arm.state.lock().arm.calibrated = true;
        arm
    }

    /// 每次 Move 之后 `CheckIdle` 报告"运动中"的次数
    pub fn with_move_busy_polls(self, polls: u32) -> Self {
        self.state.lock().move_busy_polls = polls;
        self
    }

    /// 下一次执行 `action` 时返回 `code`（仅生效一次）
    pub fn fail_next(&self, action: ActionId, code: RobotErrorCode) {
        self.state.lock().failures.insert(action, code);
    }

    /// 模拟线缆断开：之后所有读写返回 [`SerialError::Disconnected`]
    pub fn disconnect(&self) {
        self.state.lock().disconnected = true;
    }

    pub fn snapshot(&self) -> ArmSnapshot {
        self.state.lock().arm
    }

    /// 收到的全部请求（按顺序）
    pub fn requests(&self) -> Vec<ArmRequest> {
        self.state.lock().requests.clone()
    }

    /// 某个动作收到的次数
    pub fn count(&self, action: ActionId) -> usize {
        self.state
            .lock()
            .requests
            .iter()
            .filter(|request| request.action_id() == action)
            .count()
    }
}

impl SerialAdapter for SimulatedArm {
    fn send(&mut self, frame: &SerialFrame) -> Result<(), SerialError> {
        let mut state = self.state.lock();
        if state.disconnected {
            return Err(SerialError::Disconnected);
        }

        let reply = match ArmRequest::decode(frame) {
            Ok(request) => {
                state.requests.push(request);
                state.execute(request)
            },
            Err(ProtocolError::UnknownAction { .. }) => {
                ArmReply::failed(RobotErrorCode::UNKNOWN_ACTION)
            },
            Err(_) => ArmReply::failed(RobotErrorCode::INVALID_NUMBER_OF_PARAMETERS),
        };
        state.pending.push_back(reply.to_frame());
        Ok(())
    }

    fn receive(&mut self) -> Result<SerialFrame, SerialError> {
        let mut state = self.state.lock();
        if state.disconnected {
            return Err(SerialError::Disconnected);
        }
        state.pending.pop_front().ok_or(SerialError::Timeout)
    }
}
