//! 轻量级 HTTP API 客户端
//!
//! - 对象存储：签名上传、下载、列举、删除，以及基于它们的目录操作
//! - 飞书应用机器人：租户令牌、用户与群组查询、各类消息发送、图片文件上传下载
//! - 飞书群自定义机器人：Webhook 推送，可选签名
//! - LLM：OpenAI 兼容的对话补全，支持 SSE 流式输出
//!
//! # 架构分层
//!
//! - `core`: 签名、列举解析、SSE 读取、富文本构建等纯逻辑
//! - `infrastructure`: 各 HTTP 客户端

pub mod config;
pub mod core;
pub mod errors;
pub mod infrastructure;
pub mod logger;

pub use crate::core::listing::DirectoryItem;
pub use crate::core::post::PostContent;
pub use crate::core::signing::OssSigner;
pub use errors::{ClientError, Result};
pub use infrastructure::lark::{LarkBot, LarkWebhookBot, MessageContent, ReceiveId};
pub use infrastructure::llm::{ChatCompletionResponse, ChatMessage, Conversation, OpenAIClient};
pub use infrastructure::oss::ObjectStorageClient;

/// 版本号
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
