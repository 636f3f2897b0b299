//! Builder 模式实现
//!
//! 提供链式构造 `Robot` 实例的便捷方式。

use crate::error::DriverError;
use crate::pipeline::PipelineConfig;
use crate::robot::Robot;
use armlink_serial::SerialAdapter;
#[cfg(feature = "uart")]
use armlink_serial::{Framing, UartConfig, open_uart};
#[cfg(feature = "uart")]
use std::time::Duration;

/// Robot Builder（链式构造）
///
/// # Example
///
/// ```no_run
/// use armlink_driver::RobotBuilder;
/// use armlink_serial::Framing;
///
/// let robot = RobotBuilder::new()
///     .port_name("/dev/serial0")
///     .framing(Framing::terminated())
///     .build()
///     .unwrap();
/// let client = robot.client();
/// ```
#[derive(Debug, Clone, Default)]
pub struct RobotBuilder {
    /// 串口配置（未设置时使用 [`RobotBuilder::DEFAULT_PORT`] 与固件默认参数）
    #[cfg(feature = "uart")]
    uart: Option<UartConfig>,
    pipeline_config: Option<PipelineConfig>,
}

impl RobotBuilder {
    /// 树莓派 GPIO UART 的默认设备路径
    pub const DEFAULT_PORT: &'static str = "/dev/serial0";

    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(feature = "uart")]
    fn uart_mut(&mut self) -> &mut UartConfig {
        self.uart
            .get_or_insert_with(|| UartConfig::new(Self::DEFAULT_PORT))
    }

    /// 设置完整的串口配置
    #[cfg(feature = "uart")]
    pub fn uart(mut self, config: UartConfig) -> Self {
        self.uart = Some(config);
        self
    }

    /// 设置串口设备路径
    #[cfg(feature = "uart")]
    pub fn port_name(mut self, port_name: impl Into<String>) -> Self {
        self.uart_mut().port_name = port_name.into();
        self
    }

    /// 设置波特率（默认 115200）
    #[cfg(feature = "uart")]
    pub fn baud_rate(mut self, baud_rate: u32) -> Self {
        self.uart_mut().baud_rate = baud_rate;
        self
    }

    /// 设置分帧策略（由固件版本决定）
    #[cfg(feature = "uart")]
    pub fn framing(mut self, framing: Framing) -> Self {
        self.uart_mut().framing = framing;
        self
    }

    /// 设置应答超时（默认无限等待）
    #[cfg(feature = "uart")]
    pub fn reply_timeout(mut self, timeout: Duration) -> Self {
        self.uart_mut().reply_timeout = Some(timeout);
        self
    }

    /// 设置 Pipeline 配置
    pub fn pipeline_config(mut self, config: PipelineConfig) -> Self {
        self.pipeline_config = Some(config);
        self
    }

    /// 打开串口并启动驱动
    #[cfg(feature = "uart")]
    pub fn build(self) -> Result<Robot, DriverError> {
        let config = self
            .uart
            .unwrap_or_else(|| UartConfig::new(Self::DEFAULT_PORT));
        let port = open_uart(&config)?;
        Robot::new(port, self.pipeline_config)
    }

    /// 使用给定的适配器启动驱动（模拟器、测试）
    pub fn build_with(
        self,
        serial: impl SerialAdapter + Send + 'static,
    ) -> Result<Robot, DriverError> {
        Robot::new(serial, self.pipeline_config)
    }
}
