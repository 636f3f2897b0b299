//! 标定流程的步骤
//!
//! 每个步骤有 `execute` / `revert` 两个动作：
//!
//! | 步骤 | execute | revert |
//! |------|---------|--------|
//! | `PrepareRobot` | 进入标定模式 | 放弃标定 |
//! | `AlignAxes` | 与操作员交互，手动对齐各轴 | 无 |
//! | `FinishCalibration` | 以当前位置为参考点完成标定 | 无 |

use crate::connection::{ConnectionError, MessageConnection};
use crate::workflow::WorkflowState;
use armlink_driver::{DriverError, RobotClient};
use armlink_protocol::{ErrorCode, JointsAngles, Request, Response, RobotError, RobotErrorCode};
use num_enum::TryFromPrimitive;
use thiserror::Error;
use tracing::{debug, info, warn};

/// 交互步骤发给操作员的提示
pub const ALIGN_PROMPT: &str = "You're calibrating XYZ axis. Send '1' to confirm, send '2' to abort, \
     send '3${Z-deg}${Y-deg}${X-deg}${V-deg}${W-deg}' to move.";

/// 操作员主动放弃时的原因
pub const USER_ABORT_REASON: &str = "user input";

/// 连接断开时的原因
pub const CONNECTION_LOST_REASON: &str = "connection lost";

/// 步骤失败原因
#[derive(Error, Debug)]
pub enum StepError {
    #[error("{0}")]
    Robot(#[from] DriverError),

    #[error("{}", USER_ABORT_REASON)]
    UserAbort,

    #[error("{}", CONNECTION_LOST_REASON)]
    ConnectionLost(#[source] ConnectionError),
}

/// 交互步骤中操作员可发送的子命令
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
#[repr(u8)]
enum AlignCommand {
    Confirm = 1,
    Abort = 2,
    Move = 3,
}

/// 步骤执行所需的协作者（由流程借出）
pub struct StepContext<'a, C: MessageConnection> {
    pub robot: &'a RobotClient,
    pub connection: &'a mut C,
}

impl<C: MessageConnection> StepContext<'_, C> {
    fn send(&mut self, response: &Response) -> Result<(), StepError> {
        self.connection
            .write_message(&response.encode())
            .map_err(StepError::ConnectionLost)
    }
}

/// 标定步骤（封闭集合）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalibrationStep {
    PrepareRobot,
    AlignAxes,
    FinishCalibration,
}

impl CalibrationStep {
    /// 标准标定顺序
    pub const SEQUENCE: [CalibrationStep; 3] = [
        CalibrationStep::PrepareRobot,
        CalibrationStep::AlignAxes,
        CalibrationStep::FinishCalibration,
    ];

    /// 执行该步骤时流程所处的状态
    pub fn state(self) -> WorkflowState {
        match self {
            CalibrationStep::PrepareRobot => WorkflowState::Prepare,
            CalibrationStep::AlignAxes => WorkflowState::InteractiveAlign,
            CalibrationStep::FinishCalibration => WorkflowState::Finish,
        }
    }

    pub fn execute<C: MessageConnection>(
        self,
        ctx: &mut StepContext<'_, C>,
    ) -> Result<(), StepError> {
        match self {
            CalibrationStep::PrepareRobot => Ok(ctx.robot.start_calibration()?),
            CalibrationStep::AlignAxes => align_axes(ctx),
            CalibrationStep::FinishCalibration => Ok(ctx.robot.finish_calibration()?),
        }
    }

    pub fn revert<C: MessageConnection>(
        self,
        ctx: &mut StepContext<'_, C>,
    ) -> Result<(), StepError> {
        match self {
            CalibrationStep::PrepareRobot => Ok(ctx.robot.abort_calibration()?),
            CalibrationStep::AlignAxes | CalibrationStep::FinishCalibration => Ok(()),
        }
    }
}

/// 交互对齐：循环处理操作员消息，直到确认或放弃
fn align_axes<C: MessageConnection>(ctx: &mut StepContext<'_, C>) -> Result<(), StepError> {
    ctx.send(&Response::strings([ALIGN_PROMPT]))?;

    loop {
        let message = match ctx.connection.read_message() {
            Ok(message) => message,
            Err(e) => {
                warn!("Read failed during axis alignment: {}", e);
                let fatal = e.is_fatal();
                // 连接可能已断开，写回失败不再处理
                let _ = ctx
                    .connection
                    .write_message(&Response::error(ErrorCode::UnknownError, &e).encode());
                if fatal {
                    return Err(StepError::ConnectionLost(e));
                }
                continue;
            },
        };

        let request = match Request::parse(&message) {
            Ok(request) => request,
            Err(e) => {
                ctx.send(&Response::error(ErrorCode::UnknownCommand, e))?;
                continue;
            },
        };

        match AlignCommand::try_from(request.id) {
            Ok(AlignCommand::Confirm) => {
                if ctx.robot.is_idle() {
                    info!("Axis alignment confirmed");
                    return Ok(());
                }
                let busy = RobotError::from_code(RobotErrorCode::ARM_IN_MOVE);
                ctx.send(&Response::error(ErrorCode::RobotCannotExecuteCommand, busy))?;
            },
            Ok(AlignCommand::Abort) => {
                info!("Axis alignment aborted by operator");
                return Err(StepError::UserAbort);
            },
            Ok(AlignCommand::Move) => {
                let response = match request.float_args::<5>() {
                    Ok(values) => {
                        let target = JointsAngles::from_wire_order(values);
                        debug!("Alignment move to {:?}", target);
                        match ctx.robot.move_to(target) {
                            Ok(observed) => Response::Floats(observed.to_wire_order().to_vec()),
                            Err(e) => Response::error(ErrorCode::RobotCannotExecuteCommand, e),
                        }
                    },
                    Err(e) => Response::from_protocol_error(&e),
                };
                ctx.send(&response)?;
            },
            Err(_) => {
                ctx.send(&Response::error(
                    ErrorCode::UnknownCommand,
                    format!("Command with identifier: {} not found.", request.id),
                ))?;
            },
        }
    }
}
