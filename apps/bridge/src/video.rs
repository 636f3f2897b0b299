//! 摄像头推流
//!
//! 每路摄像头一个 `ffmpeg` 子进程，把 V4L2 设备的 MJPEG 流原样推到 RTSP 服务器。
//! 子进程的生命周期只做最基本的管理：启动、kill、回收。

use crate::config::CameraConfig;
use parking_lot::Mutex;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use thiserror::Error;
use tracing::{info, warn};

/// 推流错误
#[derive(Error, Debug)]
pub enum VideoError {
    #[error("Stream is already on")]
    AlreadyOn,

    #[error("Stream is already off")]
    AlreadyOff,

    #[error("Camera {index} is not configured ({available} available)")]
    UnknownCamera { index: usize, available: usize },

    #[error("Failed to launch ffmpeg: {0}")]
    Spawn(#[source] io::Error),

    #[error("IO Error: {0}")]
    Io(#[from] io::Error),
}

/// 视频源
pub trait VideoSource: Send {
    /// 开始推流，返回客户端可访问的地址
    fn start(&mut self) -> Result<String, VideoError>;

    fn stop(&mut self) -> Result<(), VideoError>;

    fn is_running(&self) -> bool;
}

// ============================================================================
// ffmpeg
// ============================================================================

/// 基于 `ffmpeg` 子进程的视频源
pub struct FfmpegStream {
    camera: CameraConfig,
    public_address: Option<String>,
    /// ffmpeg 输出日志目录（`None` 时丢弃输出）
    log_dir: Option<PathBuf>,
    child: Option<Child>,
}

impl FfmpegStream {
    pub fn new(camera: CameraConfig, public_address: Option<String>) -> Self {
        Self {
            camera,
            public_address,
            log_dir: None,
            child: None,
        }
    }

    pub fn with_log_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.log_dir = Some(dir.into());
        self
    }

    /// 返回给客户端的地址（`localhost` 替换为公布地址）
    pub fn address(&self) -> String {
        public_url(&self.camera.rtsp_url, self.public_address.as_deref())
    }

    /// ffmpeg 命令行参数
    pub fn ffmpeg_args(&self) -> Vec<String> {
        let camera = &self.camera;
        let framerate = camera.framerate.to_string();
        let video_size = camera.video_size();
        [
            "-f",
            "v4l2",
            "-framerate",
            framerate.as_str(),
            "-re",
            "-stream_loop",
            "-1",
            "-video_size",
            video_size.as_str(),
            "-input_format",
            camera.input_format.as_str(),
            "-i",
            camera.device.as_str(),
            "-c",
            "copy",
            "-f",
            "rtsp",
            camera.rtsp_url.as_str(),
        ]
        .iter()
        .map(|arg| arg.to_string())
        .collect()
    }

    fn output(&self) -> Result<(Stdio, Stdio), VideoError> {
        let Some(dir) = &self.log_dir else {
            return Ok((Stdio::null(), Stdio::null()));
        };
        fs::create_dir_all(dir)?;
        let device = self.camera.device.trim_start_matches('/').replace('/', "_");
        let file = File::create(dir.join(format!("ffmpeg-{device}.log")))?;
        let stderr = file.try_clone()?;
        Ok((Stdio::from(file), Stdio::from(stderr)))
    }
}

impl VideoSource for FfmpegStream {
    fn start(&mut self) -> Result<String, VideoError> {
        if self.is_running() {
            return Err(VideoError::AlreadyOn);
        }

        let (stdout, stderr) = self.output()?;
        let child = Command::new("ffmpeg")
            .args(self.ffmpeg_args())
            .stdin(Stdio::null())
            .stdout(stdout)
            .stderr(stderr)
            .spawn()
            .map_err(VideoError::Spawn)?;

        info!(
            "Started ffmpeg (pid {}) streaming {} to {}",
            child.id(),
            self.camera.device,
            self.camera.rtsp_url
        );
        self.child = Some(child);
        Ok(self.address())
    }

    fn stop(&mut self) -> Result<(), VideoError> {
        let Some(mut child) = self.child.take() else {
            return Err(VideoError::AlreadyOff);
        };
        // 进程可能已经自行退出，kill 失败不影响回收
        if let Err(e) = child.kill() {
            warn!("Failed to kill ffmpeg (pid {}): {}", child.id(), e);
        }
        let status = child.wait()?;
        info!("Stopped stream of {} ({})", self.camera.device, status);
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.child.is_some()
    }
}

impl Drop for FfmpegStream {
    fn drop(&mut self) {
        if self.is_running() {
            let _ = self.stop();
        }
    }
}

/// 把地址中的 `localhost` 替换为公布地址
pub fn public_url(url: &str, public_address: Option<&str>) -> String {
    match public_address {
        Some(address) => url.replacen("localhost", address, 1),
        None => url.to_string(),
    }
}

// ============================================================================
// 注册表
// ============================================================================

/// 进程内所有视频源（按摄像头编号索引，各连接共享）
pub struct VideoRegistry {
    sources: Vec<Mutex<Box<dyn VideoSource>>>,
}

impl VideoRegistry {
    pub fn new(sources: Vec<Box<dyn VideoSource>>) -> Self {
        Self {
            sources: sources.into_iter().map(Mutex::new).collect(),
        }
    }

    /// 按配置为每路摄像头创建 ffmpeg 视频源
    pub fn from_cameras(
        cameras: &[CameraConfig],
        public_address: Option<&str>,
        log_dir: Option<&Path>,
    ) -> Self {
        Self::new(
            cameras
                .iter()
                .map(|camera| {
                    let mut stream =
                        FfmpegStream::new(camera.clone(), public_address.map(str::to_owned));
                    if let Some(dir) = log_dir {
                        stream = stream.with_log_dir(dir);
                    }
                    Box::new(stream) as Box<dyn VideoSource>
                })
                .collect(),
        )
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    fn source(&self, index: usize) -> Result<&Mutex<Box<dyn VideoSource>>, VideoError> {
        self.sources.get(index).ok_or(VideoError::UnknownCamera {
            index,
            available: self.sources.len(),
        })
    }

    pub fn start(&self, index: usize) -> Result<String, VideoError> {
        self.source(index)?.lock().start()
    }

    pub fn stop(&self, index: usize) -> Result<(), VideoError> {
        self.source(index)?.lock().stop()
    }

    /// 停止所有正在运行的视频源（退出时调用）
    pub fn stop_all(&self) {
        for (index, source) in self.sources.iter().enumerate() {
            let mut source = source.lock();
            if source.is_running()
                && let Err(e) = source.stop()
            {
                warn!("Failed to stop camera {}: {}", index, e);
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// 只记录状态的视频源
    #[derive(Default)]
    pub(crate) struct FakeSource {
        running: bool,
        pub(crate) stops: Arc<AtomicUsize>,
    }

    impl VideoSource for FakeSource {
        fn start(&mut self) -> Result<String, VideoError> {
            if self.running {
                return Err(VideoError::AlreadyOn);
            }
            self.running = true;
            Ok("rtsp://10.0.0.5:8554/video/feed0".to_string())
        }

        fn stop(&mut self) -> Result<(), VideoError> {
            if !self.running {
                return Err(VideoError::AlreadyOff);
            }
            self.running = false;
            self.stops.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn is_running(&self) -> bool {
            self.running
        }
    }

    #[test]
    fn test_ffmpeg_args() {
        let stream = FfmpegStream::new(CameraConfig::feed(1), None);
        assert_eq!(
            stream.ffmpeg_args().join(" "),
            "-f v4l2 -framerate 30 -re -stream_loop -1 -video_size 1280x720 \
             -input_format mjpeg -i /dev/video1 -c copy -f rtsp rtsp://localhost:8554/video/feed1"
        );
    }

    #[test]
    fn test_public_url() {
        assert_eq!(
            public_url("rtsp://localhost:8554/video/feed0", Some("192.168.1.20")),
            "rtsp://192.168.1.20:8554/video/feed0"
        );
        assert_eq!(public_url("rtsp://localhost:8554/a", None), "rtsp://localhost:8554/a");

        let stream = FfmpegStream::new(CameraConfig::feed(0), Some("arm.local".to_string()));
        assert_eq!(stream.address(), "rtsp://arm.local:8554/video/feed0");
    }

    #[test]
    fn test_stop_without_start() {
        let mut stream = FfmpegStream::new(CameraConfig::feed(0), None);
        assert!(matches!(stream.stop(), Err(VideoError::AlreadyOff)));
    }

    #[test]
    fn test_registry_state_machine() {
        let registry = VideoRegistry::new(vec![Box::new(FakeSource::default())]);
        assert_eq!(registry.len(), 1);

        assert_eq!(registry.start(0).unwrap(), "rtsp://10.0.0.5:8554/video/feed0");
        assert_eq!(registry.start(0).unwrap_err().to_string(), "Stream is already on");
        registry.stop(0).unwrap();
        assert_eq!(registry.stop(0).unwrap_err().to_string(), "Stream is already off");
    }

    #[test]
    fn test_registry_unknown_camera() {
        let registry = VideoRegistry::new(vec![Box::new(FakeSource::default())]);
        assert!(matches!(
            registry.start(3),
            Err(VideoError::UnknownCamera {
                index: 3,
                available: 1
            })
        ));
    }

    #[test]
    fn test_stop_all_only_stops_running() {
        let first = FakeSource::default();
        let second = FakeSource::default();
        let stops = first.stops.clone();
        let other_stops = second.stops.clone();
        let registry = VideoRegistry::new(vec![Box::new(first), Box::new(second)]);

        registry.start(0).unwrap();
        registry.stop_all();
        assert_eq!(stops.load(Ordering::SeqCst), 1);
        assert_eq!(other_stops.load(Ordering::SeqCst), 0);
        assert!(registry.start(0).is_ok());
    }
}
