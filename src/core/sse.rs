//! 对话补全的 SSE 流读取
//!
//! 逐个读取 `data:` 事件，遇到字面量 `[DONE]` 即停止，
//! 每个事件取 `choices[0].delta.content` 交给回调。

use eventsource_stream::Eventsource;
use futures::{Stream, StreamExt};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::errors::{ClientError, Result};

/// 流结束标记
pub const DONE_SENTINEL: &str = "[DONE]";

#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: Option<Delta>,
}

#[derive(Debug, Deserialize)]
struct Delta {
    #[serde(default)]
    content: Option<String>,
}

/// 从单个事件的 data 中取出增量文本
///
/// 无法解析或没有 content 时返回 `Ok(None)` / `Err`，由调用方决定是否跳过。
pub fn delta_content(data: &str) -> std::result::Result<Option<String>, serde_json::Error> {
    let chunk: StreamChunk = serde_json::from_str(data)?;
    Ok(chunk
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.delta)
        .and_then(|d| d.content))
}

/// 读取字节流形式的 SSE 响应，返回拼接后的完整文本
pub async fn pump_completion_stream<S, B, E, F>(stream: S, mut on_token: F) -> Result<String>
where
    S: Stream<Item = std::result::Result<B, E>>,
    B: AsRef<[u8]>,
    E: std::fmt::Display,
    F: FnMut(&str),
{
    let events = stream.eventsource();
    tokio::pin!(events);

    let mut full = String::new();

    while let Some(event) = events.next().await {
        let event = event.map_err(|e| ClientError::Stream(e.to_string()))?;

        if event.data == DONE_SENTINEL {
            debug!("completion stream finished");
            break;
        }

        match delta_content(&event.data) {
            Ok(Some(content)) => {
                on_token(&content);
                full.push_str(&content);
            }
            Ok(None) => {}
            Err(e) => {
                warn!(error = %e, "failed to parse stream event, skipping");
            }
        }
    }

    Ok(full)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delta_content() {
        let data = r#"{"choices":[{"delta":{"content":"Hi"}}]}"#;
        assert_eq!(delta_content(data).unwrap(), Some("Hi".to_string()));
    }

    #[test]
    fn test_delta_content_role_only() {
        let data = r#"{"choices":[{"delta":{"role":"assistant"}}]}"#;
        assert_eq!(delta_content(data).unwrap(), None);
    }

    #[test]
    fn test_delta_content_no_choices() {
        assert_eq!(delta_content(r#"{"choices":[]}"#).unwrap(), None);
    }

    #[test]
    fn test_delta_content_malformed() {
        assert!(delta_content("not json").is_err());
    }
}
