//! Robot API 模块
//!
//! [`Robot`] 拥有后台 IO 线程（线程独占串口），[`RobotClient`] 是可克隆的提交句柄。
//! 每个网络连接持有一个 `RobotClient`，所有请求在 IO 线程中串行执行。

use crate::command::{ReplyResult, RobotCommand};
use crate::error::DriverError;
use crate::pipeline::{PipelineConfig, io_loop};
use armlink_protocol::{ActionId, ArmRequest, JointsAngles};
use armlink_serial::SerialAdapter;
use crossbeam_channel::Sender;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, error, info};

/// 机械臂客户端（可克隆，可跨线程共享）
///
/// 每个方法是一次完整的请求/应答往返，阻塞直到应答到达。
/// 不做重试，错误原样返回。
#[derive(Debug, Clone)]
pub struct RobotClient {
    cmd_tx: Sender<RobotCommand>,
}

impl RobotClient {
    fn execute(&self, request: ArmRequest) -> ReplyResult {
        let (command, reply_rx) = RobotCommand::new(request);
        self.cmd_tx
            .send(command)
            .map_err(|_| DriverError::ChannelClosed)?;
        reply_rx.recv().map_err(|_| DriverError::ChannelClosed)?
    }

    fn execute_simple(&self, action: ActionId) -> Result<(), DriverError> {
        self.execute(ArmRequest::Simple(action)).map(|_| ())
    }

    fn execute_with_angles(&self, request: ArmRequest) -> Result<JointsAngles, DriverError> {
        let action = request.action_id();
        let reply = self.execute(request)?;
        reply.angles().ok_or_else(|| {
            // parse 已保证带角度动作的成功应答含角度
            DriverError::Protocol(armlink_protocol::ProtocolError::ParseError(format!(
                "{action:?} reply carries no joint angles"
            )))
        })
    }

    /// 移动到目标关节角，返回控制器实际采用的（量化后）角度
    pub fn move_to(&self, angles: JointsAngles) -> Result<JointsAngles, DriverError> {
        self.execute_with_angles(ArmRequest::Move(angles))
    }

    pub fn set_speed(&self, speed: f32) -> Result<(), DriverError> {
        self.execute(ArmRequest::SetSpeed(speed)).map(|_| ())
    }

    /// 查询当前关节角
    pub fn current_position(&self) -> Result<JointsAngles, DriverError> {
        self.execute_with_angles(ArmRequest::Simple(ActionId::GetCurrentPosition))
    }

    /// 进入标定模式
    pub fn start_calibration(&self) -> Result<(), DriverError> {
        self.execute_simple(ActionId::StartCalibration)
    }

    /// 以当前位置为参考点完成标定
    pub fn finish_calibration(&self) -> Result<(), DriverError> {
        self.execute_simple(ActionId::FinishCalibration)
    }

    pub fn abort_calibration(&self) -> Result<(), DriverError> {
        self.execute_simple(ActionId::AbortCalibration)
    }

    /// 控制器是否已标定
    ///
    /// "未标定"是正常结果（`Ok(false)`），其他设备错误仍返回 `Err`。
    pub fn is_calibrated(&self) -> Result<bool, DriverError> {
        match self.execute_simple(ActionId::CheckCalibration) {
            Ok(()) => Ok(true),
            Err(DriverError::Robot(error))
                if error.code == armlink_protocol::RobotErrorCode::ARM_NOT_CALIBRATED =>
            {
                Ok(false)
            },
            Err(e) => Err(e),
        }
    }

    /// 控制器是否空闲
    ///
    /// 任何错误（包括传输错误）都视为"非空闲"。
    pub fn is_idle(&self) -> bool {
        match self.execute_simple(ActionId::CheckIdle) {
            Ok(()) => true,
            Err(e) => {
                debug!("Idle check negative: {}", e);
                false
            },
        }
    }

    pub fn open_gripper(&self) -> Result<(), DriverError> {
        self.execute_simple(ActionId::OpenGripper)
    }

    pub fn close_gripper(&self) -> Result<(), DriverError> {
        self.execute_simple(ActionId::CloseGripper)
    }
}

/// 带超时的线程 join
trait JoinTimeout {
    fn join_timeout(self, timeout: Duration) -> std::thread::Result<()>;
}

impl<T: Send + 'static> JoinTimeout for JoinHandle<T> {
    fn join_timeout(self, timeout: Duration) -> std::thread::Result<()> {
        let (tx, rx) = crossbeam_channel::bounded(1);

        // 看门狗线程负责 join，超时后继续在后台等待
        std::thread::spawn(move || {
            let _ = tx.send(self.join().map(|_| ()));
        });

        match rx.recv_timeout(timeout) {
            Ok(join_result) => join_result,
            Err(_) => Err(Box::new(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                "Thread join timeout",
            ))),
        }
    }
}

/// 机械臂驱动（拥有 IO 线程）
///
/// 进程内只应存在一个。`shutdown` 按值消费，因此不可能重复关闭；
/// 未显式关闭时 `Drop` 执行相同的清理。
pub struct Robot {
    client: RobotClient,
    /// drop 即通知 IO 线程退出
    shutdown_tx: Option<Sender<()>>,
    io_thread: Option<JoinHandle<()>>,
}

impl Robot {
    /// IO 线程退出等待上限（正在进行的串口往返可能阻塞）
    pub const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(2);

    /// 启动 IO 线程，串口适配器被移动到线程中
    pub fn new(
        serial: impl SerialAdapter + Send + 'static,
        config: Option<PipelineConfig>,
    ) -> Result<Self, DriverError> {
        let config = config.unwrap_or_default();
        let (cmd_tx, cmd_rx) = crossbeam_channel::bounded(config.command_queue_capacity);
        let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded(0);

        let io_thread = std::thread::Builder::new()
            .name("armlink-io".to_string())
            .spawn(move || io_loop(serial, cmd_rx, shutdown_rx))
            .map_err(|e| DriverError::IoThread(e.to_string()))?;

        info!("Robot driver started");
        Ok(Self {
            client: RobotClient { cmd_tx },
            shutdown_tx: Some(shutdown_tx),
            io_thread: Some(io_thread),
        })
    }

    /// 获取客户端句柄
    pub fn client(&self) -> RobotClient {
        self.client.clone()
    }

    /// 停止 IO 线程并释放串口
    ///
    /// 之后已分发的 `RobotClient` 的请求返回 [`DriverError::ChannelClosed`]。
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        self.shutdown_tx.take();

        if let Some(handle) = self.io_thread.take() {
            match handle.join_timeout(Self::SHUTDOWN_TIMEOUT) {
                Ok(()) => info!("Robot driver stopped"),
                Err(_) => error!(
                    "IO thread panicked or failed to shut down within {:?}",
                    Self::SHUTDOWN_TIMEOUT
                ),
            }
        }
    }
}

impl Drop for Robot {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use armlink_protocol::{ArmReply, RobotErrorCode};
    use armlink_serial::mock::MockSerialAdapter;

    #[test]
    fn test_simple_commands_send_one_frame_each() {
        let mock = MockSerialAdapter::new();
        for _ in 0..5 {
            mock.queue_reply(ArmReply::ok());
        }

        let robot = Robot::new(mock.clone(), None).unwrap();
        let client = robot.client();
        client.start_calibration().unwrap();
        client.finish_calibration().unwrap();
        client.abort_calibration().unwrap();
        client.open_gripper().unwrap();
        client.close_gripper().unwrap();
        robot.shutdown();

        let sent: Vec<u8> = mock.sent_frames().iter().map(|f| f.data()[0]).collect();
        assert_eq!(sent, vec![5, 6, 7, 9, 10]);
    }

    #[test]
    fn test_is_idle_false_on_any_error() {
        let mock = MockSerialAdapter::new();
        mock.queue_reply(ArmReply::failed(RobotErrorCode::ARM_IN_MOVE));
        mock.queue_reply(ArmReply::ok());

        let robot = Robot::new(mock.clone(), None).unwrap();
        let client = robot.client();
        assert!(!client.is_idle());
        assert!(client.is_idle());
        // 队列为空 → 传输超时 → 非空闲
        assert!(!client.is_idle());
    }

    #[test]
    fn test_is_calibrated() {
        let mock = MockSerialAdapter::new();
        mock.queue_reply(ArmReply::ok());
        mock.queue_reply(ArmReply::failed(RobotErrorCode::ARM_NOT_CALIBRATED));
        mock.queue_reply(ArmReply::failed(RobotErrorCode::ARM_IN_MOVE));

        let robot = Robot::new(mock, None).unwrap();
        let client = robot.client();
        assert!(client.is_calibrated().unwrap());
        assert!(!client.is_calibrated().unwrap());
        assert!(client.is_calibrated().is_err());
    }

    #[test]
    fn test_client_after_shutdown() {
        let robot = Robot::new(MockSerialAdapter::new(), None).unwrap();
        let client = robot.client();
        robot.shutdown();
        assert!(matches!(
            client.set_speed(100.0),
            Err(DriverError::ChannelClosed)
        ));
        assert!(!client.is_idle());
    }

    #[test]
    fn test_drop_stops_worker() {
        let mock = MockSerialAdapter::new();
        let client = {
            let robot = Robot::new(mock.clone(), None).unwrap();
            robot.client()
        };
        assert!(matches!(client.open_gripper(), Err(DriverError::ChannelClosed)));
        assert!(mock.sent_frames().is_empty());
    }
}
