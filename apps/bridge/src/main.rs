//! ArmLink 桥接进程
//!
//! 在网络侧接受 `$` 分隔的文本命令，转发给串口上的机械臂控制器，
//! 并管理摄像头推流。

mod config;
mod connection;
mod dispatch;
mod server;
mod video;

use anyhow::{Context, Result};
use armlink_driver::{Robot, RobotBuilder};
use clap::Parser;
use config::{BridgeConfig, FramingKind};
use dispatch::CommandHandler;
use server::BridgeServer;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use tracing::{error, info};
use video::VideoRegistry;

/// ArmLink 桥接进程
#[derive(Parser, Debug)]
#[command(name = "armlink-bridge")]
#[command(about = "Bridge between network clients and the robot arm controller", long_about = None)]
struct Args {
    /// TOML 配置文件
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// TCP 监听地址（覆盖配置文件）
    ///
    /// 格式: IP:PORT (例如: 0.0.0.0:8080)
    #[arg(long)]
    listen: Option<String>,

    /// 串口设备路径（覆盖配置文件）
    #[arg(long)]
    serial_port: Option<String>,

    /// 串口分帧方式（覆盖配置文件）
    #[arg(long, value_enum)]
    framing: Option<FramingKind>,

    /// 对外公布的主机名，替换视频地址中的 `localhost`
    #[arg(long)]
    public_address: Option<String>,

    /// 使用固件模拟器代替真实串口
    #[arg(long)]
    simulate: bool,
}

impl Args {
    /// 合并配置文件与命令行参数
    fn resolve_config(&self) -> Result<BridgeConfig> {
        let mut config = match &self.config {
            Some(path) => BridgeConfig::load(path)?,
            None => BridgeConfig::default(),
        };
        if let Some(listen) = &self.listen {
            config.listen_addr = listen.clone();
        }
        if let Some(port) = &self.serial_port {
            config.uart.port_name = port.clone();
        }
        if let Some(framing) = self.framing {
            config.uart.framing = framing;
        }
        if let Some(address) = &self.public_address {
            config.public_address = Some(address.clone());
        }
        Ok(config)
    }
}

fn start_robot(config: &BridgeConfig, simulate: bool) -> Result<Robot> {
    if simulate {
        return start_simulated_robot();
    }

    let uart = config.uart.to_uart_config()?;
    let port_name = uart.port_name.clone();
    RobotBuilder::new()
        .uart(uart)
        .build()
        .with_context(|| format!("Failed to open robot controller on {port_name}"))
}

#[cfg(feature = "simulator")]
fn start_simulated_robot() -> Result<Robot> {
    info!("Using simulated arm controller");
    RobotBuilder::new()
        .build_with(armlink_serial::mock::SimulatedArm::new())
        .context("Failed to start simulated robot")
}

#[cfg(not(feature = "simulator"))]
fn start_simulated_robot() -> Result<Robot> {
    anyhow::bail!("armlink-bridge was built without the `simulator` feature")
}

fn main() -> Result<()> {
    // 初始化日志
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let config = args.resolve_config()?;

    let robot = start_robot(&config, args.simulate)?;
    let video = Arc::new(VideoRegistry::from_cameras(
        &config.cameras,
        config.public_address.as_deref(),
        config.stream_log_dir.as_deref(),
    ));
    let handler = CommandHandler::new(robot.client(), video.clone());
    let server = BridgeServer::bind(&config.listen_addr, handler)
        .with_context(|| format!("Failed to listen on {}", config.listen_addr))?;

    // Ctrl+C 优雅退出
    let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded::<()>(1);
    ctrlc::set_handler(move || {
        let _ = shutdown_tx.try_send(());
    })
    .context("Failed to set signal handler")?;

    // 监听线程在进程退出时随之结束
    let (server_done_tx, server_done_rx) = crossbeam_channel::bounded::<()>(1);
    thread::Builder::new()
        .name("armlink-accept".into())
        .spawn(move || {
            if let Err(e) = server.run() {
                error!("Server stopped: {}", e);
            }
            let _ = server_done_tx.send(());
        })
        .context("Failed to spawn accept thread")?;

    info!(
        "ArmLink bridge started with {} camera(s). Press Ctrl+C to stop.",
        video.len()
    );

    crossbeam_channel::select! {
        recv(shutdown_rx) -> _ => info!("Received interrupt signal. Shutting down..."),
        recv(server_done_rx) -> _ => error!("Accept loop exited. Shutting down..."),
    }

    video.stop_all();
    robot.shutdown();
    info!("ArmLink bridge stopped");
    Ok(())
}
