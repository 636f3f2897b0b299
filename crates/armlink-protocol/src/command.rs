//! 网络侧文本命令协议
//!
//! 所有字段以 `$` 分隔，不做任何转义：
//!
//! ```text
//! 请求:      <u8 commandId>[$arg]*
//! 成功:      0
//! 成功+浮点: 0$<f32>[$<f32>]*
//! 成功+文本: 0$<string>[$<string>]*
//! 错误:      <u8 errorCode>$<message>
//! ```
//!
//! 文本参数中如果包含 `$`，接收端会把它拆成多个字段，这是格式本身的限制。

use crate::{CommandId, FIELD_DELIMITER, FLOAT_PRECISION, ProtocolError};
use num_enum::{IntoPrimitive, TryFromPrimitive};
use std::fmt;

/// 成功响应码
pub const RESPONSE_OK: u8 = 0;

/// 错误响应码（封闭集合，>= 10 与成功码区分）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive, IntoPrimitive)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum ErrorCode {
    UnknownCommand = 10,
    InvalidParameterCount = 11,
    StreamError = 12,
    RobotCannotExecuteCommand = 13,
    RobotCalibrationError = 14,
    /// 连接读取失败等无法归类的错误
    UnknownError = 15,
}

// ============================================================================
// 请求
// ============================================================================

/// 解析后的请求（命令 ID 尚未校验）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub id: u8,
    pub args: Vec<String>,
}

impl Request {
    /// 按 `$` 拆分请求文本
    ///
    /// 首字段去除首尾空白后按 `u8` 解析，其余字段原样保留。
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        let mut fields = text.split(FIELD_DELIMITER);
        // split 至少产生一个字段
        let head = fields.next().unwrap_or_default().trim();
        let id = head
            .parse::<u8>()
            .map_err(|_| ProtocolError::ParseError(format!("invalid command identifier {head:?}")))?;
        Ok(Self {
            id,
            args: fields.map(str::to_owned).collect(),
        })
    }

    /// 查找命令表，未知 ID 返回 `None`
    pub fn command(&self) -> Option<CommandId> {
        CommandId::try_from(self.id).ok()
    }

    pub fn arg(&self, index: usize) -> Option<&str> {
        self.args.get(index).map(String::as_str)
    }

    /// 检查参数个数不少于 `expected`
    pub fn require_args(&self, expected: usize) -> Result<(), ProtocolError> {
        if self.args.len() < expected {
            return Err(ProtocolError::InvalidParameterCount {
                expected,
                actual: self.args.len(),
            });
        }
        Ok(())
    }

    /// 将前 `N` 个参数解析为 f32
    pub fn float_args<const N: usize>(&self) -> Result<[f32; N], ProtocolError> {
        parse_float_args(&self.args)
    }
}

/// 将前 `N` 个参数解析为 f32
///
/// 参数不足返回 [`ProtocolError::InvalidParameterCount`]，
/// 无法解析返回 [`ProtocolError::InvalidArgument`]，不会默认为 0。
pub fn parse_float_args<const N: usize>(args: &[String]) -> Result<[f32; N], ProtocolError> {
    if args.len() < N {
        return Err(ProtocolError::InvalidParameterCount {
            expected: N,
            actual: args.len(),
        });
    }
    let mut values = [0.0f32; N];
    for (index, (value, raw)) in values.iter_mut().zip(args).enumerate() {
        *value = raw.trim().parse::<f32>().map_err(|_| ProtocolError::InvalidArgument {
            index,
            value: raw.clone(),
        })?;
    }
    Ok(values)
}

// ============================================================================
// 响应
// ============================================================================

/// 响应（每个请求恰好产生一个）
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    /// 成功，无负载
    Ok,
    /// 成功，浮点负载
    Floats(Vec<f32>),
    /// 成功，文本负载
    Strings(Vec<String>),
    /// 错误
    Error { code: ErrorCode, message: String },
}

impl Response {
    pub fn strings<S: Into<String>>(args: impl IntoIterator<Item = S>) -> Self {
        Response::Strings(args.into_iter().map(Into::into).collect())
    }

    pub fn error(code: ErrorCode, message: impl fmt::Display) -> Self {
        Response::Error {
            code,
            message: message.to_string(),
        }
    }

    /// 协议错误映射为错误响应
    pub fn from_protocol_error(error: &ProtocolError) -> Self {
        let code = match error {
            ProtocolError::InvalidParameterCount { .. } | ProtocolError::InvalidArgument { .. } => {
                ErrorCode::InvalidParameterCount
            },
            _ => ErrorCode::UnknownCommand,
        };
        Response::error(code, error)
    }

    /// 响应码字段
    pub fn code(&self) -> u8 {
        match self {
            Response::Ok | Response::Floats(_) | Response::Strings(_) => RESPONSE_OK,
            Response::Error { code, .. } => (*code).into(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Response::Error { .. })
    }

    /// 序列化为线上文本
    pub fn encode(&self) -> String {
        let mut fields = vec![self.code().to_string()];
        match self {
            Response::Ok => {},
            Response::Floats(values) => fields.extend(
                values
                    .iter()
                    .map(|value| format!("{value:.prec$}", prec = FLOAT_PRECISION)),
            ),
            Response::Strings(values) => fields.extend(values.iter().cloned()),
            Response::Error { message, .. } => fields.push(message.clone()),
        }
        fields.join(&FIELD_DELIMITER.to_string())
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}
