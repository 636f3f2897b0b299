//! 命令分发
//!
//! 每条请求恰好产生一个响应。分发器本身不保存任何请求间状态，
//! 多个连接可以共享同一个 [`CommandHandler`]。

use crate::video::{VideoError, VideoRegistry};
use armlink_control::{CalibrationWorkflow, MessageConnection};
use armlink_driver::{DriverError, RobotClient};
use armlink_protocol::{CommandId, ErrorCode, JointsAngles, Request, Response};
use std::sync::Arc;
use tracing::{info, warn};

/// 命令处理器
#[derive(Clone)]
pub struct CommandHandler {
    robot: RobotClient,
    video: Arc<VideoRegistry>,
}

impl CommandHandler {
    pub fn new(robot: RobotClient, video: Arc<VideoRegistry>) -> Self {
        Self { robot, video }
    }

    /// 处理一条请求
    ///
    /// `connection` 只在标定命令中使用：交互步骤直接读写该连接。
    pub fn handle<C: MessageConnection>(&self, message: &str, connection: &mut C) -> Response {
        let response = self.dispatch(message, connection);
        if let Response::Error { code, message: text } = &response {
            warn!("Command {:?} failed with {:?}: {}", message, code, text);
        }
        response
    }

    fn dispatch<C: MessageConnection>(&self, message: &str, connection: &mut C) -> Response {
        let request = match Request::parse(message) {
            Ok(request) => request,
            Err(e) => return Response::error(ErrorCode::UnknownCommand, e),
        };
        let Some(command) = request.command() else {
            return unknown_command(request.id);
        };
        info!("Incoming command {:?} with {} argument(s)", command, request.args.len());

        if let Err(e) = request.require_args(command.min_args()) {
            return Response::from_protocol_error(&e);
        }

        match command {
            CommandId::StartVideoStream => match camera_index(&request) {
                Ok(index) => match self.video.start(index) {
                    Ok(address) => Response::strings([address]),
                    Err(e) => stream_error(e),
                },
                Err(response) => response,
            },
            CommandId::StopVideoStream => match camera_index(&request) {
                Ok(index) => match self.video.stop(index) {
                    Ok(()) => Response::Ok,
                    Err(e) => stream_error(e),
                },
                Err(response) => response,
            },
            CommandId::MoveRobot => match request.float_args() {
                Ok(values) => angles_response(self.robot.move_to(JointsAngles::from_wire_order(values))),
                Err(e) => Response::from_protocol_error(&e),
            },
            CommandId::SetSpeed => match request.float_args::<1>() {
                Ok([speed]) => ok_response(self.robot.set_speed(speed)),
                Err(e) => Response::from_protocol_error(&e),
            },
            CommandId::GetPosition => angles_response(self.robot.current_position()),
            CommandId::Calibrate => {
                match CalibrationWorkflow::new(&self.robot, connection).start() {
                    Ok(()) => Response::Ok,
                    Err(e) => Response::error(ErrorCode::RobotCalibrationError, e),
                }
            },
            CommandId::OpenGripper => ok_response(self.robot.open_gripper()),
            CommandId::CloseGripper => ok_response(self.robot.close_gripper()),
        }
    }
}

pub fn unknown_command(id: u8) -> Response {
    Response::error(
        ErrorCode::UnknownCommand,
        format!("Command with identifier: {id} not found."),
    )
}

/// 可选的摄像头编号参数，缺省或为空时取 0
fn camera_index(request: &Request) -> Result<usize, Response> {
    match request.arg(0).map(str::trim) {
        None | Some("") => Ok(0),
        Some(raw) => raw.parse().map_err(|_| {
            Response::error(
                ErrorCode::InvalidParameterCount,
                format!("Invalid camera index: {raw:?}"),
            )
        }),
    }
}

fn stream_error(error: VideoError) -> Response {
    Response::error(ErrorCode::StreamError, error)
}

fn ok_response(result: Result<(), DriverError>) -> Response {
    match result {
        Ok(()) => Response::Ok,
        Err(e) => Response::error(ErrorCode::RobotCannotExecuteCommand, e),
    }
}

fn angles_response(result: Result<JointsAngles, DriverError>) -> Response {
    match result {
        Ok(angles) => Response::Floats(angles.to_wire_order().to_vec()),
        Err(e) => Response::error(ErrorCode::RobotCannotExecuteCommand, e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::video::tests::FakeSource;
    use armlink_control::ConnectionError;
    use armlink_driver::{Robot, RobotBuilder};
    use armlink_protocol::{ActionId, RobotErrorCode};
    use armlink_serial::mock::SimulatedArm;
    use std::collections::VecDeque;

    #[derive(Default)]
    struct ScriptedConnection {
        incoming: VecDeque<String>,
        written: Vec<String>,
    }

    impl MessageConnection for ScriptedConnection {
        fn read_message(&mut self) -> Result<String, ConnectionError> {
            self.incoming.pop_front().ok_or(ConnectionError::Closed)
        }

        fn write_message(&mut self, message: &str) -> Result<(), ConnectionError> {
            self.written.push(message.to_string());
            Ok(())
        }
    }

    fn setup(arm: &SimulatedArm) -> (Robot, CommandHandler) {
        let robot = RobotBuilder::new().build_with(arm.clone()).unwrap();
        let video = VideoRegistry::new(vec![Box::new(FakeSource::default())]);
        let handler = CommandHandler::new(robot.client(), Arc::new(video));
        (robot, handler)
    }

    fn handle(handler: &CommandHandler, message: &str) -> String {
        handler
            .handle(message, &mut ScriptedConnection::default())
            .encode()
    }

    #[test]
    fn test_move_returns_observed_angles() {
        let arm = SimulatedArm::calibrated();
        let (_robot, handler) = setup(&arm);

        let response = handle(&handler, "3$0$0$0$10$20");
        let fields: Vec<&str> = response.split('$').collect();
        assert_eq!(fields.len(), 6);
        assert_eq!(fields[0], "0");
        assert_eq!(fields[4], "10.000000");
        assert_eq!(fields[5], "20.000000");
        assert_eq!(arm.count(ActionId::Move), 1);
    }

    #[test]
    fn test_device_error_maps_to_code_13() {
        // 未标定时固件拒绝移动
        let arm = SimulatedArm::new();
        let (_robot, handler) = setup(&arm);

        assert_eq!(
            handle(&handler, "3$1$2$3$4$5"),
            "13$Robot error 12: Arm is not calibrated."
        );
    }

    #[test]
    fn test_too_few_args_does_not_contact_robot() {
        let arm = SimulatedArm::calibrated();
        let (_robot, handler) = setup(&arm);

        assert!(handle(&handler, "3$1$2").starts_with("11$"));
        assert!(handle(&handler, "4").starts_with("11$"));
        assert!(handle(&handler, "4$fast").starts_with("11$"));
        assert!(arm.requests().is_empty());
    }

    #[test]
    fn test_unknown_command() {
        let arm = SimulatedArm::calibrated();
        let (_robot, handler) = setup(&arm);

        assert_eq!(
            handle(&handler, "99"),
            "10$Command with identifier: 99 not found."
        );
        assert!(handle(&handler, "move").starts_with("10$"));
        assert!(arm.requests().is_empty());
    }

    #[test]
    fn test_speed_and_position() {
        let arm = SimulatedArm::calibrated();
        let (_robot, handler) = setup(&arm);

        assert_eq!(handle(&handler, "4$500"), "0");
        assert_eq!(arm.snapshot().speed, 500.0);
        assert!(handle(&handler, "4$5000").starts_with("13$"));

        let position = handle(&handler, "5");
        assert!(position.starts_with("0$"));
        assert_eq!(position.split('$').count(), 6);
    }

    #[test]
    fn test_gripper() {
        let arm = SimulatedArm::calibrated();
        let (_robot, handler) = setup(&arm);

        assert_eq!(handle(&handler, "7"), "0");
        assert!(arm.snapshot().gripper_open);
        assert_eq!(handle(&handler, "8"), "0");
        assert!(!arm.snapshot().gripper_open);
    }

    #[test]
    fn test_video_stream_commands() {
        let arm = SimulatedArm::calibrated();
        let (_robot, handler) = setup(&arm);

        assert_eq!(handle(&handler, "1"), "0$rtsp://10.0.0.5:8554/video/feed0");
        assert_eq!(handle(&handler, "1$0"), "12$Stream is already on");
        assert_eq!(handle(&handler, "2"), "0");
        assert_eq!(handle(&handler, "2$"), "12$Stream is already off");
        assert!(handle(&handler, "1$4").starts_with("12$Camera 4 is not configured"));
        assert!(handle(&handler, "1$left").starts_with("11$"));
        assert!(arm.requests().is_empty());
    }

    #[test]
    fn test_calibrate_uses_connection() {
        let arm = SimulatedArm::new();
        let (_robot, handler) = setup(&arm);
        let mut connection = ScriptedConnection {
            incoming: VecDeque::from(vec!["1".to_string()]),
            ..Default::default()
        };

        let response = handler.handle("6", &mut connection);
        assert_eq!(response, Response::Ok);
        assert_eq!(connection.written.len(), 1);
        assert!(arm.snapshot().calibrated);
    }

    #[test]
    fn test_calibrate_abort() {
        let arm = SimulatedArm::new();
        let (_robot, handler) = setup(&arm);
        let mut connection = ScriptedConnection {
            incoming: VecDeque::from(vec!["2".to_string()]),
            ..Default::default()
        };

        let response = handler.handle("6", &mut connection).encode();
        assert_eq!(
            response,
            "14$XYZ robot calibration workflow was aborted. Reason: user input"
        );
        assert_eq!(arm.count(ActionId::AbortCalibration), 1);
    }

    #[test]
    fn test_calibrate_rejected_by_device() {
        let arm = SimulatedArm::new();
        arm.fail_next(ActionId::StartCalibration, RobotErrorCode::ARM_IN_MOVE);
        let (_robot, handler) = setup(&arm);

        assert_eq!(
            handle(&handler, "6"),
            "14$XYZ robot calibration workflow was aborted. Reason: Robot error 15: Arm is in move."
        );
    }
}
