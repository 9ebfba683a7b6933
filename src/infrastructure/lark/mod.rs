//! 飞书开放平台客户端
//!
//! - `bot`：应用机器人，使用租户访问令牌调用开放接口
//! - `webhook`：群自定义机器人，向 Webhook 地址推送消息

pub mod bot;
pub mod webhook;

use std::path::Path;

use reqwest::multipart::Part;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::errors::{ClientError, Result};

pub use bot::{LarkBot, MessageContent, ReceiveId};
pub use webhook::LarkWebhookBot;

/// 开放接口默认地址
pub const DEFAULT_BASE_URL: &str = "https://open.feishu.cn/open-apis";

const OCTET_STREAM: &str = "application/octet-stream";

#[derive(Serialize)]
struct TenantTokenRequest<'a> {
    app_id: &'a str,
    app_secret: &'a str,
}

#[derive(Deserialize)]
struct TenantTokenResponse {
    tenant_access_token: Option<String>,
}

/// 开放接口统一响应结构
#[derive(Debug, Default, Deserialize)]
pub struct ApiEnvelope {
    #[serde(default)]
    pub code: Option<i64>,
    #[serde(default)]
    pub msg: Option<String>,
    #[serde(default)]
    pub data: Option<Value>,
}

/// 使用应用凭证换取租户访问令牌
pub async fn fetch_tenant_access_token(
    http: &reqwest::Client,
    base_url: &str,
    app_id: &str,
    app_secret: &str,
) -> Result<String> {
    let url = format!("{}/auth/v3/tenant_access_token/internal", base_url);
    let body = http
        .post(url)
        .json(&TenantTokenRequest { app_id, app_secret })
        .send()
        .await?
        .text()
        .await?;

    serde_json::from_str::<TenantTokenResponse>(&body)
        .ok()
        .and_then(|r| r.tenant_access_token)
        .ok_or_else(|| ClientError::Auth(format!("failed to get tenant access token: {}", body)))
}

/// 读取响应体并解析为统一结构
///
/// HTTP 状态非 2xx 或响应体不是合法 JSON 时记录告警并返回 `None`。
pub(crate) async fn read_envelope(response: reqwest::Response, action: &str) -> Result<Option<ApiEnvelope>> {
    let status = response.status();
    let body = response.text().await?;

    let envelope = match serde_json::from_str::<ApiEnvelope>(&body) {
        Ok(envelope) => envelope,
        Err(e) => {
            warn!(action, %status, error = %e, "malformed response body");
            return Ok(None);
        }
    };

    if !status.is_success() {
        warn!(
            action,
            %status,
            code = ?envelope.code,
            msg = envelope.msg.as_deref().unwrap_or_default(),
            "request failed"
        );
        return Ok(None);
    }

    Ok(Some(envelope))
}

/// 以文件名和字节构造 multipart 文件字段
pub(crate) async fn file_part(path: &Path) -> Result<(String, Part)> {
    let data = tokio::fs::read(path).await?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let part = Part::bytes(data)
        .file_name(file_name.clone())
        .mime_str(OCTET_STREAM)?;
    Ok((file_name, part))
}
