//! 行分隔的文本消息连接
//!
//! 每条消息以 `\n` 结束，末尾的 `\r` 会被去掉。

use armlink_control::{ConnectionError, MessageConnection};
use std::io::{self, BufRead, BufReader, ErrorKind, Read, Write};
use std::net::TcpStream;

/// 单条消息的最大字节数（不含换行）
pub const MAX_MESSAGE_LEN: usize = 1024;

/// 行分隔的消息连接
pub struct LineConnection<R, W> {
    reader: BufReader<R>,
    writer: W,
}

impl LineConnection<TcpStream, TcpStream> {
    /// 基于 TCP 连接创建（读写各持有一个句柄）
    pub fn from_tcp(stream: TcpStream) -> io::Result<Self> {
        let writer = stream.try_clone()?;
        Ok(Self::new(stream, writer))
    }
}

impl<R: Read, W: Write> LineConnection<R, W> {
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            reader: BufReader::new(reader),
            writer,
        }
    }

    /// 丢弃当前行的剩余部分
    fn skip_line(&mut self) -> Result<(), ConnectionError> {
        let mut discarded = Vec::new();
        loop {
            discarded.clear();
            let read = (&mut self.reader)
                .take(MAX_MESSAGE_LEN as u64)
                .read_until(b'\n', &mut discarded)
                .map_err(map_io)?;
            if read == 0 || discarded.last() == Some(&b'\n') {
                return Ok(());
            }
        }
    }
}

/// 对端断开类的 IO 错误统一视为连接关闭
fn map_io(error: io::Error) -> ConnectionError {
    match error.kind() {
        ErrorKind::UnexpectedEof
        | ErrorKind::ConnectionReset
        | ErrorKind::ConnectionAborted
        | ErrorKind::BrokenPipe => ConnectionError::Closed,
        _ => ConnectionError::Io(error),
    }
}

impl<R: Read, W: Write> MessageConnection for LineConnection<R, W> {
    fn read_message(&mut self) -> Result<String, ConnectionError> {
        let mut line = Vec::new();
        // 上限按正文计算，`\r\n` 两个字节不占额度
        let limit = MAX_MESSAGE_LEN as u64 + 2;
        let read = (&mut self.reader)
            .take(limit)
            .read_until(b'\n', &mut line)
            .map_err(map_io)?;
        if read == 0 {
            return Err(ConnectionError::Closed);
        }

        if line.last() == Some(&b'\n') {
            line.pop();
        } else if read as u64 == limit {
            self.skip_line()?;
            return Err(ConnectionError::MessageTooLong { max: MAX_MESSAGE_LEN });
        }
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        if line.len() > MAX_MESSAGE_LEN {
            return Err(ConnectionError::MessageTooLong { max: MAX_MESSAGE_LEN });
        }

        String::from_utf8(line).map_err(|_| ConnectionError::InvalidUtf8)
    }

    fn write_message(&mut self, message: &str) -> Result<(), ConnectionError> {
        let mut buf = Vec::with_capacity(message.len() + 1);
        buf.extend_from_slice(message.as_bytes());
        buf.push(b'\n');
        self.writer.write_all(&buf).map_err(map_io)?;
        self.writer.flush().map_err(map_io)
    }
}
