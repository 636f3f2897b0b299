//! TCP 服务
//!
//! 每个连接一个线程，顺序执行 读取 → 分发 → 写回。
//! 一个连接出错只结束该连接，机械臂和其他连接不受影响。

use crate::connection::LineConnection;
use crate::dispatch::CommandHandler;
use armlink_control::{ConnectionError, MessageConnection};
use armlink_protocol::{ErrorCode, Response};
use std::io;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::thread;
use tracing::{debug, error, info, warn};

/// 命令服务
pub struct BridgeServer {
    listener: TcpListener,
    handler: CommandHandler,
}

impl BridgeServer {
    pub fn bind(addr: &str, handler: CommandHandler) -> io::Result<Self> {
        let listener = TcpListener::bind(addr)?;
        Ok(Self { listener, handler })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// 接受连接（阻塞，直到监听 socket 出错）
    pub fn run(&self) -> io::Result<()> {
        info!("Listening on {}", self.local_addr()?);
        for stream in self.listener.incoming() {
            match stream {
                Ok(stream) => self.spawn_session(stream),
                Err(e) => warn!("Failed to accept connection: {}", e),
            }
        }
        Ok(())
    }

    fn spawn_session(&self, stream: TcpStream) {
        let peer = stream
            .peer_addr()
            .map(|addr| addr.to_string())
            .unwrap_or_else(|_| "unknown".to_string());
        let handler = self.handler.clone();
        let spawned = thread::Builder::new()
            .name(format!("session-{peer}"))
            .spawn(move || match LineConnection::from_tcp(stream) {
                Ok(mut connection) => {
                    info!("Client {} connected", peer);
                    serve_session(&handler, &mut connection);
                    info!("Client {} disconnected", peer);
                },
                Err(e) => error!("Failed to set up connection to {}: {}", peer, e),
            });
        if let Err(e) = spawned {
            error!("Failed to spawn session thread: {}", e);
        }
    }
}

/// 处理一个连接上的全部请求，直到对端关闭或写失败
pub fn serve_session<C: MessageConnection>(handler: &CommandHandler, connection: &mut C) {
    loop {
        let response = match connection.read_message() {
            Ok(message) => {
                debug!("RX {:?}", message);
                handler.handle(&message, connection)
            },
            Err(e) if e.is_fatal() => {
                if !matches!(e, ConnectionError::Closed) {
                    warn!("Connection read failed: {}", e);
                }
                return;
            },
            Err(e) => {
                warn!("Rejected message: {}", e);
                Response::error(ErrorCode::UnknownError, e)
            },
        };

        let encoded = response.encode();
        debug!("TX {:?}", encoded);
        if let Err(e) = connection.write_message(&encoded) {
            warn!("Connection write failed: {}", e);
            return;
        }
    }
}
