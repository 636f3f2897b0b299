//! 测试用串口适配器
//!
//! - [`MockSerialAdapter`]：按脚本逐帧应答
//! - [`SimulatedArm`]：模拟控制器固件的状态机
//!
//! 两者都可以 `clone`，克隆体共享同一份状态：一份交给驱动，另一份留在测试里检查。

mod sim;

pub use sim::{ArmSnapshot, SimulatedArm};

use crate::{SerialAdapter, SerialError, SerialFrame};
use armlink_protocol::{ArmReply, ArmRequest};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

enum Scripted {
    Frame(SerialFrame),
    Disconnect,
}

#[derive(Default)]
struct MockState {
    receive_queue: VecDeque<Scripted>,
    sent_frames: Vec<SerialFrame>,
}

/// 脚本化适配器
///
/// `receive` 按顺序返回预先排队的帧，队列为空时返回 [`SerialError::Timeout`]。
#[derive(Clone, Default)]
pub struct MockSerialAdapter {
    state: Arc<Mutex<MockState>>,
}

impl MockSerialAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// 排队一个应答
    pub fn queue_reply(&self, reply: ArmReply) {
        self.queue_frame(reply.to_frame());
    }

    /// 排队原始帧
    pub fn queue_frame(&self, frame: SerialFrame) {
        self.state.lock().receive_queue.push_back(Scripted::Frame(frame));
    }

    /// 排队一次断开（之后的帧仍可继续读取）
    pub fn queue_disconnect(&self) {
        self.state.lock().receive_queue.push_back(Scripted::Disconnect);
    }

    /// 已发送的帧
    pub fn sent_frames(&self) -> Vec<SerialFrame> {
        self.state.lock().sent_frames.clone()
    }

    /// 已发送的请求（无法解码的帧被跳过）
    pub fn sent_requests(&self) -> Vec<ArmRequest> {
        self.state
            .lock()
            .sent_frames
            .iter()
            .filter_map(|frame| ArmRequest::decode(frame).ok())
            .collect()
    }
}

impl SerialAdapter for MockSerialAdapter {
    fn send(&mut self, frame: &SerialFrame) -> Result<(), SerialError> {
        self.state.lock().sent_frames.push(frame.clone());
        Ok(())
    }

    fn receive(&mut self) -> Result<SerialFrame, SerialError> {
        match self.state.lock().receive_queue.pop_front() {
            Some(Scripted::Frame(frame)) => Ok(frame),
            Some(Scripted::Disconnect) => Err(SerialError::Disconnected),
            None => Err(SerialError::Timeout),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use armlink_protocol::{ActionId, RobotErrorCode};

    #[test]
    fn test_scripted_replies_in_order() {
        let handle = MockSerialAdapter::new();
        let mut adapter = handle.clone();

        handle.queue_reply(ArmReply::ok());
        handle.queue_reply(ArmReply::failed(RobotErrorCode::ARM_IN_MOVE));
        handle.queue_disconnect();

        assert_eq!(adapter.receive().unwrap().data(), &[1]);
        assert_eq!(adapter.receive().unwrap().data(), &[15]);
        assert!(matches!(adapter.receive(), Err(SerialError::Disconnected)));
        assert!(matches!(adapter.receive(), Err(SerialError::Timeout)));
    }

    #[test]
    fn test_records_sent_frames() {
        let handle = MockSerialAdapter::new();
        let mut adapter = handle.clone();

        adapter
            .send(&ArmRequest::Simple(ActionId::CheckIdle).to_frame())
            .unwrap();
        adapter.send(&SerialFrame::new(&[0xFF]).unwrap()).unwrap();

        assert_eq!(handle.sent_frames().len(), 2);
        assert_eq!(
            handle.sent_requests(),
            vec![ArmRequest::Simple(ActionId::CheckIdle)]
        );
    }
}
