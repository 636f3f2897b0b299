//! 分帧
//!
//! 串口本身只有字节流，控制器固件按以下两种方式之一划分消息边界
//! （由固件版本决定，一个端口只使用一种）：
//!
//! - 长度前缀：先发 1 字节负载长度，再发负载
//! - 结束符：先发负载，再发固定结束字节（默认 `0x04`）
//!
//! 接收缓冲区固定为 [`RECEIVE_BUFFER_LEN`] 字节，超出即为分帧错误。
//!
//! 一次接收失败（超时、溢出）后，字节流里可能残留上一个应答的剩余部分，
//! 下一次发送前会先丢弃这些输入，否则后续每个请求都会读到前一个请求的应答。

use crate::{SerialAdapter, SerialError, SerialFrame};
use armlink_protocol::{DEFAULT_FRAME_TERMINATOR, MAX_PAYLOAD_LEN, RECEIVE_BUFFER_LEN};
use std::io::{self, ErrorKind, Read, Write};
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// 可分帧的字节流
pub trait ByteStream: Read + Write {
    /// 丢弃当前已到达的输入，返回丢弃的字节数
    ///
    /// 默认实现一直读到流暂时没有数据（`TimedOut` / `WouldBlock`）或结束。
    fn discard_input(&mut self) -> io::Result<usize> {
        let mut scratch = [0u8; 64];
        let mut discarded = 0;
        loop {
            match self.read(&mut scratch) {
                Ok(0) => return Ok(discarded),
                Ok(n) => discarded += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => {},
                Err(e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock) => {
                    return Ok(discarded);
                },
                Err(e) => return Err(e),
            }
        }
    }
}

/// 分帧策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Framing {
    /// 1 字节长度前缀（当前固件）
    #[default]
    LengthPrefixed,
    /// 结束符分隔（旧固件）
    ///
    /// 负载中不能出现结束字节，含有它的帧在发送时被拒绝
    /// （[`SerialError::SentinelInPayload`]）。`Move` 的角度按原始 f32 字节编码，
    /// 很多角度都会碰上默认结束字节 `0x04`（例如 33.0° = `00 00 04 42`），
    /// 所以这种分帧下任意角度的移动并不可靠，只在固件不支持长度前缀时使用。
    Terminated { sentinel: u8 },
}

impl Framing {
    /// 使用默认结束字节的结束符分帧
    pub fn terminated() -> Self {
        Framing::Terminated {
            sentinel: DEFAULT_FRAME_TERMINATOR,
        }
    }
}

/// 在任意字节流上实现分帧的串口适配器
///
/// 读操作遇到 `TimedOut` / `WouldBlock` / `Interrupted` 视为"暂无数据"：
/// 未设置应答超时时一直等待，设置后超时返回 [`SerialError::Timeout`]。
/// 其他 IO 错误原样向上传递，不做重试。
pub struct FramedPort<P> {
    port: P,
    framing: Framing,
    buffer: [u8; RECEIVE_BUFFER_LEN],
    reply_timeout: Option<Duration>,
    /// 上一次接收失败，流中可能残留旧应答
    desync: bool,
}

impl<P: ByteStream> FramedPort<P> {
    pub fn new(port: P, framing: Framing) -> Self {
        Self {
            port,
            framing,
            buffer: [0u8; RECEIVE_BUFFER_LEN],
            reply_timeout: None,
            desync: false,
        }
    }

    /// 设置应答超时（`None` 表示无限等待）
    pub fn with_reply_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.reply_timeout = timeout;
        self
    }

    pub fn get_ref(&self) -> &P {
        &self.port
    }

    /// 接收失败后丢弃残留输入
    fn resync(&mut self) -> Result<(), SerialError> {
        if self.desync {
            let discarded = self.port.discard_input()?;
            debug!("Discarded {} stale bytes before next request", discarded);
            self.desync = false;
        }
        Ok(())
    }

    /// 加上分帧字节
    fn encode(&self, frame: &SerialFrame) -> Result<Vec<u8>, SerialError> {
        let payload = frame.data();
        if payload.len() > MAX_PAYLOAD_LEN {
            return Err(SerialError::FrameTooLarge { len: payload.len() });
        }

        let mut bytes = Vec::with_capacity(payload.len() + 1);
        match self.framing {
            Framing::LengthPrefixed => {
                bytes.push(payload.len() as u8);
                bytes.extend_from_slice(payload);
            },
            Framing::Terminated { sentinel } => {
                if payload.contains(&sentinel) {
                    return Err(SerialError::SentinelInPayload { sentinel });
                }
                bytes.extend_from_slice(payload);
                bytes.push(sentinel);
            },
        }
        Ok(bytes)
    }

    /// 读入 `buffer[start..end]`，返回本次读到的字节数（> 0）
    fn read_some(
        &mut self,
        start: usize,
        end: usize,
        deadline: Option<Instant>,
    ) -> Result<usize, SerialError> {
        loop {
            match self.port.read(&mut self.buffer[start..end]) {
                Ok(0) => return Err(SerialError::Disconnected),
                Ok(n) => return Ok(n),
                Err(e)
                    if matches!(
                        e.kind(),
                        ErrorKind::TimedOut | ErrorKind::WouldBlock | ErrorKind::Interrupted
                    ) =>
                {
                    if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                        return Err(SerialError::Timeout);
                    }
                },
                Err(e) => return Err(SerialError::Io(e)),
            }
        }
    }

    fn receive_length_prefixed(
        &mut self,
        deadline: Option<Instant>,
    ) -> Result<SerialFrame, SerialError> {
        self.read_some(0, 1, deadline)?;
        let expected = self.buffer[0] as usize;

        let mut total = 0;
        while total < expected {
            total += self.read_some(total, expected, deadline)?;
        }
        Ok(SerialFrame::new(&self.buffer[..expected])?)
    }

    fn receive_terminated(
        &mut self,
        sentinel: u8,
        deadline: Option<Instant>,
    ) -> Result<SerialFrame, SerialError> {
        let mut total = 0;
        loop {
            self.read_some(total, total + 1, deadline)?;
            if self.buffer[total] == sentinel {
                return Ok(SerialFrame::new(&self.buffer[..total])?);
            }
            total += 1;
            if total > MAX_PAYLOAD_LEN {
                return Err(SerialError::BufferOverflow {
                    limit: RECEIVE_BUFFER_LEN,
                });
            }
        }
    }
}

impl<P: ByteStream> SerialAdapter for FramedPort<P> {
    fn send(&mut self, frame: &SerialFrame) -> Result<(), SerialError> {
        let bytes = self.encode(frame)?;
        self.resync()?;
        self.port.write_all(&bytes)?;
        self.port.flush()?;
        trace!("Serial TX {} bytes: {:02X?}", bytes.len(), bytes);
        Ok(())
    }

    fn receive(&mut self) -> Result<SerialFrame, SerialError> {
        let deadline = self.reply_timeout.map(|timeout| Instant::now() + timeout);
        let result = match self.framing {
            Framing::LengthPrefixed => self.receive_length_prefixed(deadline),
            Framing::Terminated { sentinel } => self.receive_terminated(sentinel, deadline),
        };
        let frame = result.inspect_err(|_| self.desync = true)?;
        trace!("Serial RX {} bytes: {:02X?}", frame.len(), frame.data());
        Ok(frame)
    }
}
