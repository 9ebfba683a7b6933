//! 标准化错误处理
//!
//! 远端返回非 2xx 时各客户端记录告警并返回哨兵值（`false` / `None` / 空列表），
//! 这里的错误类型只覆盖传输层、本地 I/O 与鉴权失败。

use thiserror::Error;

/// 客户端错误类型
#[derive(Error, Debug)]
pub enum ClientError {
    /// HTTP 传输错误（连接、超时、请求构建）
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// 本地文件读写错误
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON 编解码错误
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// 远端返回非成功状态码
    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    /// 获取访问令牌失败
    #[error("Authentication error: {0}")]
    Auth(String),

    /// 配置错误
    #[error("Configuration error: {0}")]
    Config(String),

    /// 流式响应读取错误
    #[error("Stream error: {0}")]
    Stream(String),
}

impl From<url::ParseError> for ClientError {
    fn from(err: url::ParseError) -> Self {
        ClientError::Config(err.to_string())
    }
}

/// 项目结果类型别名
pub type Result<T> = std::result::Result<T, ClientError>;
