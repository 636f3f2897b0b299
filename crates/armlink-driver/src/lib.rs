//! 驱动层模块
//!
//! 本模块提供机械臂控制器的设备驱动功能，包括：
//! - IO 线程管理（线程独占串口，命令串行执行）
//! - 请求/应答关联（每个命令附带一次性应答通道）
//! - 高层操作（移动、调速、标定、夹爪）
//!
//! # 使用场景
//!
//! 进程启动时构建一个 [`Robot`]，然后把 [`RobotClient`] 克隆给每个网络连接。

mod builder;
pub mod command;
mod error;
pub mod pipeline;
mod robot;

pub use builder::RobotBuilder;
pub use command::{ReplyResult, RobotCommand};
pub use error::DriverError;
pub use pipeline::{PipelineConfig, io_loop, round_trip};
pub use robot::{Robot, RobotClient};
