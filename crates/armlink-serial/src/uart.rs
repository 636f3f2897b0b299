//! UART 后端
//!
//! 基于 `serialport` 打开真实串口，默认参数与控制器固件一致：
//! 115200 波特率、8 数据位、偶校验、1 停止位、无流控。

use crate::{ByteStream, FramedPort, Framing, SerialError};
use serialport::{ClearBuffer, FlowControl, SerialPort};
use std::io;
use std::time::Duration;
use tracing::info;

pub use serialport::{DataBits, Parity, StopBits};

/// 默认波特率
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// 默认轮询超时（单次 read 的阻塞上限，不是应答超时）
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_millis(100);

/// 串口配置
#[derive(Debug, Clone, PartialEq)]
pub struct UartConfig {
    /// 设备路径，例如 `/dev/serial0`
    pub port_name: String,
    pub baud_rate: u32,
    pub data_bits: DataBits,
    pub parity: Parity,
    pub stop_bits: StopBits,
    /// 单次 read 的阻塞上限
    pub poll_timeout: Duration,
    /// 等待一个完整应答帧的上限（`None` 表示无限等待）
    pub reply_timeout: Option<Duration>,
    pub framing: Framing,
}

impl UartConfig {
    pub fn new(port_name: impl Into<String>) -> Self {
        Self {
            port_name: port_name.into(),
            baud_rate: DEFAULT_BAUD_RATE,
            data_bits: DataBits::Eight,
            parity: Parity::Even,
            stop_bits: StopBits::One,
            poll_timeout: DEFAULT_POLL_TIMEOUT,
            reply_timeout: None,
            framing: Framing::default(),
        }
    }
}

/// 已打开的串口
pub type UartPort = FramedPort<Box<dyn SerialPort>>;

impl ByteStream for Box<dyn SerialPort> {
    /// 清空驱动的接收缓冲区
    fn discard_input(&mut self) -> io::Result<usize> {
        let pending = self.bytes_to_read()?;
        self.clear(ClearBuffer::Input)?;
        Ok(pending as usize)
    }
}

/// 按配置打开串口
pub fn open_uart(config: &UartConfig) -> Result<UartPort, SerialError> {
    let port = serialport::new(&config.port_name, config.baud_rate)
        .data_bits(config.data_bits)
        .parity(config.parity)
        .stop_bits(config.stop_bits)
        .flow_control(FlowControl::None)
        .timeout(config.poll_timeout)
        .open()?;

    info!(
        "Opened serial port {} at {} baud ({:?}, {:?}, {:?}, framing {:?})",
        config.port_name,
        config.baud_rate,
        config.data_bits,
        config.parity,
        config.stop_bits,
        config.framing
    );

    Ok(FramedPort::new(port, config.framing).with_reply_timeout(config.reply_timeout))
}
