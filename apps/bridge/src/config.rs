//! 桥接配置
//!
//! 可选的 TOML 配置文件，命令行参数覆盖文件中的值：
//!
//! ```toml
//! listen_addr = "0.0.0.0:8080"
//! public_address = "192.168.1.20"
//! stream_log_dir = "/var/log/armlink"
//!
//! [uart]
//! port_name = "/dev/serial0"
//! baud_rate = 115200
//! framing = "terminated"
//! terminator = 4
//! reply_timeout_ms = 2000
//!
//! [[cameras]]
//! device = "/dev/video0"
//! rtsp_url = "rtsp://localhost:8554/video/feed0"
//! ```

use anyhow::{Context, Result, bail};
use armlink_protocol::DEFAULT_FRAME_TERMINATOR;
use armlink_serial::uart::{DataBits, Parity, StopBits};
use armlink_serial::{Framing, UartConfig};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// 默认监听地址
pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8080";

/// 桥接配置
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BridgeConfig {
    /// TCP 监听地址
    pub listen_addr: String,
    /// 对外公布的主机名，替换视频地址中的 `localhost`
    pub public_address: Option<String>,
    /// ffmpeg 输出日志目录，不设置时丢弃输出
    pub stream_log_dir: Option<PathBuf>,
    pub uart: UartSection,
    pub cameras: Vec<CameraConfig>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            listen_addr: DEFAULT_LISTEN_ADDR.to_string(),
            public_address: None,
            stream_log_dir: None,
            uart: UartSection::default(),
            cameras: vec![CameraConfig::feed(0), CameraConfig::feed(1)],
        }
    }
}

impl BridgeConfig {
    /// 从 TOML 文件加载，未出现的字段取默认值
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::parse(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.uart.to_uart_config()?;
        Ok(config)
    }
}

// ============================================================================
// 串口
// ============================================================================

/// 分帧方式（配置文件写法）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum FramingKind {
    #[default]
    LengthPrefixed,
    Terminated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ParityKind {
    None,
    Odd,
    #[default]
    Even,
}

/// `[uart]` 段
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UartSection {
    pub port_name: String,
    pub baud_rate: u32,
    pub data_bits: u8,
    pub parity: ParityKind,
    pub stop_bits: u8,
    pub framing: FramingKind,
    /// 结束符分帧使用的结束字节
    pub terminator: u8,
    /// 应答超时（毫秒），不设置表示无限等待
    pub reply_timeout_ms: Option<u64>,
}

impl Default for UartSection {
    fn default() -> Self {
        let defaults = UartConfig::new(armlink_driver::RobotBuilder::DEFAULT_PORT);
        Self {
            port_name: defaults.port_name,
            baud_rate: defaults.baud_rate,
            data_bits: 8,
            parity: ParityKind::Even,
            stop_bits: 1,
            framing: FramingKind::LengthPrefixed,
            terminator: DEFAULT_FRAME_TERMINATOR,
            reply_timeout_ms: None,
        }
    }
}

impl UartSection {
    pub fn framing(&self) -> Framing {
        match self.framing {
            FramingKind::LengthPrefixed => Framing::LengthPrefixed,
            FramingKind::Terminated => Framing::Terminated {
                sentinel: self.terminator,
            },
        }
    }

    /// 转换为串口层配置，非法的数据位/停止位在这里报错
    pub fn to_uart_config(&self) -> Result<UartConfig> {
        let data_bits = match self.data_bits {
            5 => DataBits::Five,
            6 => DataBits::Six,
            7 => DataBits::Seven,
            8 => DataBits::Eight,
            other => bail!("Unsupported data bits: {other} (expected 5..=8)"),
        };
        let stop_bits = match self.stop_bits {
            1 => StopBits::One,
            2 => StopBits::Two,
            other => bail!("Unsupported stop bits: {other} (expected 1 or 2)"),
        };
        let parity = match self.parity {
            ParityKind::None => Parity::None,
            ParityKind::Odd => Parity::Odd,
            ParityKind::Even => Parity::Even,
        };

        let mut config = UartConfig::new(self.port_name.clone());
        config.baud_rate = self.baud_rate;
        config.data_bits = data_bits;
        config.parity = parity;
        config.stop_bits = stop_bits;
        config.framing = self.framing();
        config.reply_timeout = self.reply_timeout_ms.map(Duration::from_millis);
        Ok(config)
    }
}

// ============================================================================
// 摄像头
// ============================================================================

/// `[[cameras]]` 段：一个 V4L2 设备推流到一个 RTSP 地址
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CameraConfig {
    pub device: String,
    pub rtsp_url: String,
    #[serde(default = "CameraConfig::default_width")]
    pub width: u32,
    #[serde(default = "CameraConfig::default_height")]
    pub height: u32,
    #[serde(default = "CameraConfig::default_framerate")]
    pub framerate: u32,
    #[serde(default = "CameraConfig::default_input_format")]
    pub input_format: String,
}

impl CameraConfig {
    /// 第 `index` 路默认摄像头
    pub fn feed(index: usize) -> Self {
        Self {
            device: format!("/dev/video{index}"),
            rtsp_url: format!("rtsp://localhost:8554/video/feed{index}"),
            width: Self::default_width(),
            height: Self::default_height(),
            framerate: Self::default_framerate(),
            input_format: Self::default_input_format(),
        }
    }

    fn default_width() -> u32 {
        1280
    }

    fn default_height() -> u32 {
        720
    }

    fn default_framerate() -> u32 {
        30
    }

    fn default_input_format() -> String {
        "mjpeg".to_string()
    }

    pub fn video_size(&self) -> String {
        format!("{}x{}", self.width, self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = BridgeConfig::parse("").unwrap();
        assert_eq!(config, BridgeConfig::default());
        assert_eq!(config.listen_addr, DEFAULT_LISTEN_ADDR);
        assert_eq!(config.cameras.len(), 2);
        assert_eq!(config.cameras[1].rtsp_url, "rtsp://localhost:8554/video/feed1");
        assert_eq!(config.cameras[0].video_size(), "1280x720");

        let uart = config.uart.to_uart_config().unwrap();
        assert_eq!(uart.port_name, "/dev/serial0");
        assert_eq!(uart.baud_rate, 115_200);
        assert_eq!(uart.parity, Parity::Even);
        assert_eq!(uart.framing, Framing::LengthPrefixed);
        assert_eq!(uart.reply_timeout, None);
    }

    #[test]
    fn test_parse_full_file() {
        let config = BridgeConfig::parse(
            r#"
            listen_addr = "127.0.0.1:9000"
            public_address = "10.0.0.5"
            stream_log_dir = "/tmp/streams"

            [uart]
            port_name = "/dev/ttyUSB0"
            baud_rate = 57600
            parity = "none"
            framing = "terminated"
            terminator = 10
            reply_timeout_ms = 1500

            [[cameras]]
            device = "/dev/video4"
            rtsp_url = "rtsp://localhost:8554/arm"
            framerate = 15
            "#,
        )
        .unwrap();

        assert_eq!(config.listen_addr, "127.0.0.1:9000");
        assert_eq!(config.public_address.as_deref(), Some("10.0.0.5"));
        assert_eq!(config.stream_log_dir, Some(PathBuf::from("/tmp/streams")));
        assert_eq!(config.cameras.len(), 1);
        assert_eq!(config.cameras[0].framerate, 15);
        assert_eq!(config.cameras[0].width, 1280);
        assert_eq!(config.cameras[0].input_format, "mjpeg");

        let uart = config.uart.to_uart_config().unwrap();
        assert_eq!(uart.port_name, "/dev/ttyUSB0");
        assert_eq!(uart.baud_rate, 57600);
        assert_eq!(uart.parity, Parity::None);
        assert_eq!(uart.framing, Framing::Terminated { sentinel: 10 });
        assert_eq!(uart.reply_timeout, Some(Duration::from_millis(1500)));
    }

    #[test]
    fn test_rejects_invalid_values() {
        assert!(BridgeConfig::parse("[uart]\ndata_bits = 9\n").is_err());
        assert!(BridgeConfig::parse("[uart]\nstop_bits = 3\n").is_err());
        assert!(BridgeConfig::parse("[uart]\nframing = \"cobs\"\n").is_err());
        assert!(BridgeConfig::parse("unknown_key = 1\n").is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "listen_addr = \"127.0.0.1:7000\"").unwrap();
        file.flush().unwrap();

        let config = BridgeConfig::load(file.path()).unwrap();
        assert_eq!(config.listen_addr, "127.0.0.1:7000");
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = BridgeConfig::load(&dir.path().join("missing.toml")).unwrap_err();
        assert!(err.to_string().starts_with("Failed to read config file"));
    }
}
