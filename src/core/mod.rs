//! 核心层：与具体 HTTP 调用无关的纯逻辑

pub mod listing;
pub mod post;
pub mod signing;
pub mod sse;
