//! 群自定义机器人
//!
//! 消息以 JSON POST 到 Webhook 地址。配置了 secret 时附加 `timestamp` 与 `sign`。

use std::path::Path;

use reqwest::multipart::Form;
use serde_json::{json, Value};
use tracing::{info, warn};

use super::{fetch_tenant_access_token, file_part, DEFAULT_BASE_URL};
use crate::core::signing::sign_webhook_payload;
use crate::errors::Result;
use crate::logger::Sanitizer;

const MENTION_ALL: &str = " <at user_id=\"all\">所有人</at>";

/// 群自定义机器人客户端
#[derive(Clone)]
pub struct LarkWebhookBot {
    webhook: String,
    secret: String,
    app_id: String,
    app_secret: String,
    base_url: String,
    http: reqwest::Client,
}

impl LarkWebhookBot {
    /// `app_id` / `app_secret` 只在上传图片时需要，可以为空
    pub fn new(
        webhook: impl Into<String>,
        secret: impl Into<String>,
        app_id: impl Into<String>,
        app_secret: impl Into<String>,
    ) -> Self {
        Self {
            webhook: webhook.into(),
            secret: secret.into(),
            app_id: app_id.into(),
            app_secret: app_secret.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            http: reqwest::Client::new(),
        }
    }

    /// 替换开放接口地址（仅影响图片上传）
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn is_signed(&self) -> bool {
        !self.secret.is_empty()
    }

    pub async fn send_text(&self, text: &str, mention_all: bool) -> Result<bool> {
        let text = if mention_all {
            format!("{}{}", text, MENTION_ALL)
        } else {
            text.to_string()
        };
        self.send_request(json!({
            "msg_type": "text",
            "content": { "text": text }
        }))
        .await
    }

    /// `paragraphs` 为段落列表，每段由若干元素组成
    pub async fn send_post(&self, paragraphs: Vec<Vec<Value>>, title: &str) -> Result<bool> {
        self.send_request(json!({
            "msg_type": "post",
            "content": {
                "post": {
                    "zh_cn": { "title": title, "content": paragraphs }
                }
            }
        }))
        .await
    }

    pub async fn send_share_chat(&self, share_chat_id: &str) -> Result<bool> {
        self.send_request(json!({
            "msg_type": "share_chat",
            "content": { "share_chat_id": share_chat_id }
        }))
        .await
    }

    pub async fn send_image(&self, image_key: &str) -> Result<bool> {
        self.send_request(json!({
            "msg_type": "image",
            "content": { "image_key": image_key }
        }))
        .await
    }

    /// 卡片放在顶层 `card` 字段
    pub async fn send_interactive(&self, card: Value) -> Result<bool> {
        self.send_request(json!({
            "msg_type": "interactive",
            "card": card
        }))
        .await
    }

    /// 上传图片，需要应用凭证
    pub async fn upload_image(&self, image_path: impl AsRef<Path>) -> Result<Option<String>> {
        let image_path = image_path.as_ref();
        if !tokio::fs::try_exists(image_path).await? {
            warn!(path = %image_path.display(), "image file does not exist");
            return Ok(None);
        }
        if self.app_id.is_empty() || self.app_secret.is_empty() {
            warn!("bot app id or secret is missing");
            return Ok(None);
        }

        let token =
            fetch_tenant_access_token(&self.http, &self.base_url, &self.app_id, &self.app_secret)
                .await?;
        let (_, part) = file_part(image_path).await?;
        let form = Form::new().text("image_type", "message").part("image", part);

        let body: Value = self
            .http
            .post(format!("{}/im/v1/images", self.base_url))
            .bearer_auth(token)
            .multipart(form)
            .send()
            .await?
            .json()
            .await?;

        match body["data"]["image_key"].as_str() {
            Some(key) => Ok(Some(key.to_string())),
            None => {
                warn!(response = %body, "failed to upload image");
                Ok(None)
            }
        }
    }

    async fn send_request(&self, mut payload: Value) -> Result<bool> {
        sign_webhook_payload(&mut payload, &self.secret, chrono::Utc::now().timestamp())?;

        let response = self.http.post(&self.webhook).json(&payload).send().await?;
        let status = response.status();
        let text = response.text().await?;

        let body: Value = match serde_json::from_str(&text) {
            Ok(body) => body,
            Err(e) => {
                warn!(%status, error = %e, body = %text, "malformed webhook response");
                return Ok(false);
            }
        };

        if webhook_succeeded(status, &body) {
            info!(msg_type = %payload["msg_type"], "message sent");
            Ok(true)
        } else {
            warn!(%status, body = %text, "message sending failed");
            Ok(false)
        }
    }
}

impl std::fmt::Debug for LarkWebhookBot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LarkWebhookBot")
            .field("webhook", &self.webhook)
            .field("secret", &Sanitizer::secret(&self.secret))
            .field("app_id", &self.app_id)
            .field("app_secret", &Sanitizer::secret(&self.app_secret))
            .finish()
    }
}

/// 新版接口返回 `code`，旧版返回 `StatusCode`，两者为 0 都表示成功
fn webhook_succeeded(status: reqwest::StatusCode, body: &Value) -> bool {
    if !status.is_success() {
        return false;
    }
    // 字段存在时必须是整数 0
    match body.get("code").or_else(|| body.get("StatusCode")) {
        None | Some(Value::Null) => true,
        Some(code) => code.as_i64() == Some(0),
    }
}

pub fn text_element(text: &str, unescape: bool) -> Value {
    json!({"tag": "text", "text": text, "un_escape": unescape})
}

pub fn link_element(href: &str, text: &str) -> Value {
    json!({"tag": "a", "href": href, "text": text})
}

pub fn at_element(user_id: &str, user_name: &str) -> Value {
    json!({"tag": "at", "user_id": user_id, "user_name": user_name})
}

/// 宽高未指定时不写入对应字段
pub fn image_element(image_key: &str, width: Option<u32>, height: Option<u32>) -> Value {
    let mut element = json!({"tag": "img", "image_key": image_key});
    if let Some(width) = width {
        element["width"] = json!(width);
    }
    if let Some(height) = height {
        element["height"] = json!(height);
    }
    element
}
