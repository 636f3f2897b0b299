//! 命令类型定义模块
//!
//! 客户端把请求和一次性应答通道一起交给 IO 线程，
//! IO 线程完成一次串口往返后通过该通道回送结果。

use crate::error::DriverError;
use armlink_protocol::{ArmReply, ArmRequest};
use crossbeam_channel::{Receiver, Sender};

/// 一次串口往返的结果
pub type ReplyResult = Result<ArmReply, DriverError>;

/// 提交给 IO 线程的命令
#[derive(Debug)]
pub struct RobotCommand {
    pub request: ArmRequest,
    reply_tx: Sender<ReplyResult>,
}

impl RobotCommand {
    /// 创建命令及其应答接收端
    pub fn new(request: ArmRequest) -> (Self, Receiver<ReplyResult>) {
        // 容量 1：IO 线程回送时永不阻塞
        let (reply_tx, reply_rx) = crossbeam_channel::bounded(1);
        (Self { request, reply_tx }, reply_rx)
    }

    /// 回送结果（调用方已放弃等待时静默丢弃）
    pub fn complete(self, result: ReplyResult) {
        let _ = self.reply_tx.send(result);
    }
}
