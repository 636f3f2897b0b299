//! Pipeline IO 循环模块
//!
//! 后台 IO 线程独占串口，按 FIFO 顺序逐个执行命令：
//! 发送请求帧 → 读取恰好一个应答帧 → 解析 → 回送结果。
//! 同一时刻串口上最多只有一个未完成的请求。

use crate::command::{ReplyResult, RobotCommand};
use armlink_protocol::{ArmReply, ArmRequest};
use armlink_serial::SerialAdapter;
use crossbeam_channel::Receiver;
use tracing::{debug, info, trace, warn};

/// Pipeline 配置
///
/// ```
/// use armlink_driver::PipelineConfig;
///
/// let config = PipelineConfig::default();
/// assert_eq!(config.command_queue_capacity, 10);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// 命令队列容量（满时提交方阻塞）
    pub command_queue_capacity: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            command_queue_capacity: 10,
        }
    }
}

/// 执行一次串口往返
///
/// 不重试：传输错误、解析错误、设备错误都原样返回。
pub fn round_trip(serial: &mut impl SerialAdapter, request: &ArmRequest) -> ReplyResult {
    let action = request.action_id();
    let frame = request.to_frame();
    debug!("{:?} TX: {:02X?}", action, frame.data());
    serial.send(&frame)?;

    let reply_frame = serial.receive()?;
    debug!("{:?} RX: {:02X?}", action, reply_frame.data());

    let reply: ArmReply = ArmReply::parse(action, &reply_frame)?;
    Ok(reply.into_result()?)
}

/// IO 线程主循环
///
/// 以下任一情况退出，随后串口适配器随线程一起释放：
/// - `shutdown_rx` 的发送端被 drop（[`Robot`](crate::Robot) 关闭）
/// - 所有命令发送端被 drop
///
/// 退出时仍在队列中的命令被丢弃，提交方收到 `ChannelClosed`。
pub fn io_loop(
    mut serial: impl SerialAdapter,
    cmd_rx: Receiver<RobotCommand>,
    shutdown_rx: Receiver<()>,
) {
    info!("Robot IO loop started");

    loop {
        crossbeam_channel::select! {
            recv(shutdown_rx) -> _ => {
                info!("Robot IO loop stopped (shutdown requested)");
                return;
            },
            recv(cmd_rx) -> command => {
                let Ok(command) = command else {
                    info!("Robot IO loop stopped (command channel closed)");
                    return;
                };
                let result = round_trip(&mut serial, &command.request);
                match &result {
                    Ok(reply) => trace!("{:?} completed: {:?}", command.request.action_id(), reply),
                    Err(e) => warn!("{:?} failed: {}", command.request.action_id(), e),
                }
                command.complete(result);
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DriverError;
    use armlink_protocol::{ActionId, JointsAngles, RobotErrorCode};
    use armlink_serial::mock::MockSerialAdapter;
    use armlink_serial::SerialError;

    #[test]
    fn test_round_trip_ok() {
        let mock = MockSerialAdapter::new();
        mock.queue_reply(ArmReply::ok());

        let reply = round_trip(&mut mock.clone(), &ArmRequest::SetSpeed(100.0)).unwrap();
        assert_eq!(reply, ArmReply::ok());
        assert_eq!(mock.sent_requests(), vec![ArmRequest::SetSpeed(100.0)]);
    }

    #[test]
    fn test_round_trip_device_error() {
        let mock = MockSerialAdapter::new();
        mock.queue_reply(ArmReply::failed(RobotErrorCode::ARM_NOT_CALIBRATED));

        let err = round_trip(
            &mut mock.clone(),
            &ArmRequest::Move(JointsAngles::default()),
        )
        .unwrap_err();
        assert_eq!(
            err.robot_error().map(|error| error.code),
            Some(RobotErrorCode::ARM_NOT_CALIBRATED)
        );
    }

    #[test]
    fn test_round_trip_transport_error() {
        let mock = MockSerialAdapter::new();
        let err = round_trip(
            &mut mock.clone(),
            &ArmRequest::Simple(ActionId::CheckIdle),
        )
        .unwrap_err();
        assert!(matches!(err, DriverError::Serial(SerialError::Timeout)));
    }

    #[test]
    fn test_round_trip_truncated_reply() {
        let mock = MockSerialAdapter::new();
        mock.queue_reply(ArmReply::ok());

        // Move 应答必须带关节角
        let err = round_trip(
            &mut mock.clone(),
            &ArmRequest::Move(JointsAngles::default()),
        )
        .unwrap_err();
        assert!(matches!(err, DriverError::Protocol(_)));
    }

    #[test]
    fn test_io_loop_exits_when_channel_closed() {
        let mock = MockSerialAdapter::new();
        mock.queue_reply(ArmReply::ok());

        let (cmd_tx, cmd_rx) = crossbeam_channel::bounded(1);
        let (_shutdown_tx, shutdown_rx) = crossbeam_channel::bounded::<()>(0);
        let handle = std::thread::spawn({
            let mock = mock.clone();
            move || io_loop(mock, cmd_rx, shutdown_rx)
        });

        let (command, reply_rx) = RobotCommand::new(ArmRequest::Simple(ActionId::OpenGripper));
        cmd_tx.send(command).unwrap();
        assert!(reply_rx.recv().unwrap().is_ok());

        drop(cmd_tx);
        handle.join().unwrap();
    }

    #[test]
    fn test_io_loop_exits_on_shutdown() {
        let (cmd_tx, cmd_rx) = crossbeam_channel::bounded::<RobotCommand>(1);
        let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded::<()>(0);
        let handle = std::thread::spawn(move || {
            io_loop(MockSerialAdapter::new(), cmd_rx, shutdown_rx)
        });

        drop(shutdown_tx);
        handle.join().unwrap();

        // 接收端已随线程释放
        let (command, _reply_rx) = RobotCommand::new(ArmRequest::Simple(ActionId::CheckIdle));
        assert!(cmd_tx.send(command).is_err());
    }
}
