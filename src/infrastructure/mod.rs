//! 基础设施层：与外部 HTTP 服务交互的客户端

pub mod lark;
pub mod llm;
pub mod oss;
