//! 应用机器人
//!
//! 每次调用前重新获取租户访问令牌，不做缓存。

use std::path::Path;

use reqwest::multipart::Form;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{fetch_tenant_access_token, file_part, read_envelope, DEFAULT_BASE_URL};
use crate::core::post::PostContent;
use crate::errors::Result;
use crate::logger::{Sanitizer, Timer};

/// 消息接收者
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReceiveId {
    /// 用户，`receive_id_type=open_id`
    OpenId(String),
    /// 群组，`receive_id_type=chat_id`
    ChatId(String),
}

impl ReceiveId {
    pub fn user(open_id: impl Into<String>) -> Self {
        ReceiveId::OpenId(open_id.into())
    }

    pub fn chat(chat_id: impl Into<String>) -> Self {
        ReceiveId::ChatId(chat_id.into())
    }

    pub fn id_type(&self) -> &'static str {
        match self {
            ReceiveId::OpenId(_) => "open_id",
            ReceiveId::ChatId(_) => "chat_id",
        }
    }

    pub fn id(&self) -> &str {
        match self {
            ReceiveId::OpenId(id) | ReceiveId::ChatId(id) => id,
        }
    }
}

/// 消息内容
#[derive(Debug, Clone)]
pub enum MessageContent {
    Text(String),
    Image { image_key: String },
    Interactive(Value),
    ShareChat { chat_id: String },
    ShareUser { user_id: String },
    Audio { file_key: String },
    Media { file_key: String },
    File { file_key: String },
    Post(Value),
    /// 分割线样式的系统消息，仅支持发给用户
    System(String),
}

impl MessageContent {
    pub fn msg_type(&self) -> &'static str {
        match self {
            MessageContent::Text(_) => "text",
            MessageContent::Image { .. } => "image",
            MessageContent::Interactive(_) => "interactive",
            MessageContent::ShareChat { .. } => "share_chat",
            MessageContent::ShareUser { .. } => "share_user",
            MessageContent::Audio { .. } => "audio",
            MessageContent::Media { .. } => "media",
            MessageContent::File { .. } => "file",
            MessageContent::Post(_) => "post",
            MessageContent::System(_) => "system",
        }
    }

    /// 接口要求 `content` 字段是 JSON 字符串
    pub fn to_content_json(&self) -> String {
        let value = match self {
            MessageContent::Text(text) => json!({ "text": text }),
            MessageContent::Image { image_key } => json!({ "image_key": image_key }),
            MessageContent::Interactive(card) => card.clone(),
            MessageContent::ShareChat { chat_id } => json!({ "chat_id": chat_id }),
            MessageContent::ShareUser { user_id } => json!({ "user_id": user_id }),
            MessageContent::Audio { file_key }
            | MessageContent::Media { file_key }
            | MessageContent::File { file_key } => json!({ "file_key": file_key }),
            MessageContent::Post(post) => post.clone(),
            MessageContent::System(text) => json!({
                "type": "divider",
                "params": {
                    "divider_text": {
                        "text": text,
                        "i18n_text": { "zh_CN": text }
                    }
                },
                "options": { "need_rollup": true }
            }),
        };
        value.to_string()
    }
}

#[derive(Serialize)]
struct SendMessageRequest<'a> {
    receive_id: &'a str,
    msg_type: &'a str,
    content: String,
    uuid: String,
}

#[derive(Serialize)]
struct BatchGetIdRequest<'a> {
    emails: &'a [String],
    mobiles: &'a [String],
    include_resigned: bool,
}

/// 应用机器人客户端
#[derive(Clone)]
pub struct LarkBot {
    app_id: String,
    app_secret: String,
    base_url: String,
    http: reqwest::Client,
}

impl LarkBot {
    pub fn new(app_id: impl Into<String>, app_secret: impl Into<String>) -> Self {
        Self {
            app_id: app_id.into(),
            app_secret: app_secret.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            http: reqwest::Client::new(),
        }
    }

    /// 替换开放接口地址
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// 获取租户访问令牌
    pub async fn tenant_access_token(&self) -> Result<String> {
        debug!(
            app_id = %self.app_id,
            app_secret = Sanitizer::secret(&self.app_secret),
            "requesting tenant access token"
        );
        fetch_tenant_access_token(&self.http, &self.base_url, &self.app_id, &self.app_secret).await
    }

    /// 通过邮箱、手机号批量查询用户 open_id
    pub async fn get_user_info(
        &self,
        emails: &[String],
        mobiles: &[String],
    ) -> Result<Option<Vec<Value>>> {
        let token = self.tenant_access_token().await?;
        let response = self
            .http
            .post(format!(
                "{}/contact/v3/users/batch_get_id?user_id_type=open_id",
                self.base_url
            ))
            .bearer_auth(token)
            .json(&BatchGetIdRequest {
                emails,
                mobiles,
                include_resigned: true,
            })
            .send()
            .await?;

        Ok(read_envelope(response, "get_user_info")
            .await?
            .and_then(|e| e.data)
            .and_then(|data| array_field(&data, "user_list")))
    }

    /// 机器人所在的群组列表
    pub async fn get_group_list(&self) -> Result<Vec<Value>> {
        let token = self.tenant_access_token().await?;
        let response = self
            .http
            .get(format!(
                "{}/im/v1/chats?page_size=20&sort_type=ByCreateTimeAsc",
                self.base_url
            ))
            .bearer_auth(token)
            .send()
            .await?;

        Ok(read_envelope(response, "get_group_list")
            .await?
            .and_then(|e| e.data)
            .and_then(|data| array_field(&data, "items"))
            .unwrap_or_default())
    }

    /// 按群名查找 chat_id
    pub async fn get_group_chat_id_by_name(&self, group_name: &str) -> Result<Vec<String>> {
        let groups = self.get_group_list().await?;
        Ok(pick_by_name(&groups, group_name, "chat_id"))
    }

    /// 群成员列表
    pub async fn get_members_in_group(&self, chat_id: &str) -> Result<Vec<Value>> {
        let token = self.tenant_access_token().await?;
        let response = self
            .http
            .get(format!(
                "{}/im/v1/chats/{}/members",
                self.base_url,
                urlencoding::encode(chat_id)
            ))
            .bearer_auth(token)
            .send()
            .await?;

        Ok(read_envelope(response, "get_members_in_group")
            .await?
            .and_then(|e| e.data)
            .and_then(|data| array_field(&data, "items"))
            .unwrap_or_default())
    }

    /// 按成员名查找 open_id
    pub async fn get_member_open_id_by_name(
        &self,
        chat_id: &str,
        member_name: &str,
    ) -> Result<Vec<String>> {
        let members = self.get_members_in_group(chat_id).await?;
        Ok(pick_by_name(&members, member_name, "member_id"))
    }

    /// 发送消息，`content` 为 JSON 字符串；失败时返回 `None`
    pub async fn send_message(
        &self,
        receiver: &ReceiveId,
        msg_type: &str,
        content: String,
    ) -> Result<Option<Value>> {
        let _timer = Timer::new("lark.send_message").with_subject(msg_type);
        let token = self.tenant_access_token().await?;
        let response = self
            .http
            .post(format!(
                "{}/im/v1/messages?receive_id_type={}",
                self.base_url,
                receiver.id_type()
            ))
            .bearer_auth(token)
            .json(&SendMessageRequest {
                receive_id: receiver.id(),
                msg_type,
                content,
                uuid: Uuid::new_v4().to_string(),
            })
            .send()
            .await?;

        let data = read_envelope(response, "send_message")
            .await?
            .map(|e| e.data.unwrap_or(Value::Null));
        if data.is_some() {
            info!(receive_id = receiver.id(), msg_type, "message sent");
        }
        Ok(data)
    }

    pub async fn send(&self, receiver: &ReceiveId, content: &MessageContent) -> Result<Option<Value>> {
        self.send_message(receiver, content.msg_type(), content.to_content_json())
            .await
    }

    pub async fn send_text(&self, receiver: &ReceiveId, text: &str) -> Result<Option<Value>> {
        self.send(receiver, &MessageContent::Text(text.to_string())).await
    }

    pub async fn send_image(&self, receiver: &ReceiveId, image_key: &str) -> Result<Option<Value>> {
        let content = MessageContent::Image {
            image_key: image_key.to_string(),
        };
        self.send(receiver, &content).await
    }

    pub async fn send_interactive(&self, receiver: &ReceiveId, card: Value) -> Result<Option<Value>> {
        self.send(receiver, &MessageContent::Interactive(card)).await
    }

    pub async fn send_shared_chat(&self, receiver: &ReceiveId, shared_chat_id: &str) -> Result<Option<Value>> {
        let content = MessageContent::ShareChat {
            chat_id: shared_chat_id.to_string(),
        };
        self.send(receiver, &content).await
    }

    pub async fn send_shared_user(&self, receiver: &ReceiveId, shared_user_id: &str) -> Result<Option<Value>> {
        let content = MessageContent::ShareUser {
            user_id: shared_user_id.to_string(),
        };
        self.send(receiver, &content).await
    }

    pub async fn send_audio(&self, receiver: &ReceiveId, file_key: &str) -> Result<Option<Value>> {
        let content = MessageContent::Audio {
            file_key: file_key.to_string(),
        };
        self.send(receiver, &content).await
    }

    pub async fn send_media(&self, receiver: &ReceiveId, file_key: &str) -> Result<Option<Value>> {
        let content = MessageContent::Media {
            file_key: file_key.to_string(),
        };
        self.send(receiver, &content).await
    }

    pub async fn send_file(&self, receiver: &ReceiveId, file_key: &str) -> Result<Option<Value>> {
        let content = MessageContent::File {
            file_key: file_key.to_string(),
        };
        self.send(receiver, &content).await
    }

    pub async fn send_post(&self, receiver: &ReceiveId, post: &PostContent) -> Result<Option<Value>> {
        self.send(receiver, &MessageContent::Post(post.to_value())).await
    }

    /// 系统消息只能发给用户
    pub async fn send_system_msg_to_user(&self, open_id: &str, text: &str) -> Result<Option<Value>> {
        self.send(
            &ReceiveId::user(open_id),
            &MessageContent::System(text.to_string()),
        )
        .await
    }

    /// 上传图片，返回 image_key
    pub async fn upload_image(&self, image_path: impl AsRef<Path>) -> Result<Option<String>> {
        let image_path = image_path.as_ref();
        let _timer = Timer::new("lark.upload_image").with_subject(image_path.display().to_string());
        let token = self.tenant_access_token().await?;
        let (_, part) = file_part(image_path).await?;
        let form = Form::new().text("image_type", "message").part("image", part);

        let response = self
            .http
            .post(format!("{}/im/v1/images", self.base_url))
            .bearer_auth(token)
            .multipart(form)
            .send()
            .await?;

        Ok(read_envelope(response, "upload_image")
            .await?
            .and_then(|e| e.data)
            .and_then(|data| string_field(&data, "image_key")))
    }

    /// 上传文件，返回 file_key
    ///
    /// `file_type` 取值见开放平台文档，例如 `opus`、`mp4`、`pdf`、`stream`。
    pub async fn upload_file(&self, file_path: impl AsRef<Path>, file_type: &str) -> Result<Option<String>> {
        let file_path = file_path.as_ref();
        let _timer = Timer::new("lark.upload_file").with_subject(file_path.display().to_string());
        let token = self.tenant_access_token().await?;
        let (file_name, part) = file_part(file_path).await?;
        let form = Form::new()
            .text("file_type", file_type.to_string())
            .text("file_name", file_name)
            .part("file", part);

        let response = self
            .http
            .post(format!("{}/im/v1/files", self.base_url))
            .bearer_auth(token)
            .multipart(form)
            .send()
            .await?;

        Ok(read_envelope(response, "upload_file")
            .await?
            .and_then(|e| e.data)
            .and_then(|data| string_field(&data, "file_key")))
    }

    /// 下载图片到本地
    pub async fn download_image(&self, image_key: &str, save_path: impl AsRef<Path>) -> Result<bool> {
        let url = format!("{}/im/v1/images/{}", self.base_url, urlencoding::encode(image_key));
        self.download(&url, save_path.as_ref(), "download_image").await
    }

    /// 下载文件到本地
    pub async fn download_file(&self, file_key: &str, save_path: impl AsRef<Path>) -> Result<bool> {
        let url = format!("{}/im/v1/files/{}", self.base_url, urlencoding::encode(file_key));
        self.download(&url, save_path.as_ref(), "download_file").await
    }

    async fn download(&self, url: &str, save_path: &Path, action: &str) -> Result<bool> {
        let token = self.tenant_access_token().await?;
        let response = self.http.get(url).bearer_auth(token).send().await?;

        if !response.status().is_success() {
            warn!(action, status = %response.status(), "download failed");
            return Ok(false);
        }

        let bytes = response.bytes().await?;
        tokio::fs::write(save_path, &bytes).await?;
        info!(action, path = %save_path.display(), size = bytes.len(), "saved");
        Ok(true)
    }
}

impl std::fmt::Debug for LarkBot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LarkBot")
            .field("app_id", &self.app_id)
            .field("app_secret", &Sanitizer::secret(&self.app_secret))
            .field("base_url", &self.base_url)
            .finish()
    }
}

fn array_field(data: &Value, field: &str) -> Option<Vec<Value>> {
    data.get(field).and_then(Value::as_array).cloned()
}

fn string_field(data: &Value, field: &str) -> Option<String> {
    data.get(field).and_then(Value::as_str).map(str::to_string)
}

/// 在对象列表中按 `name` 过滤并取出 `id_field`
fn pick_by_name(items: &[Value], name: &str, id_field: &str) -> Vec<String> {
    items
        .iter()
        .filter(|item| item.get("name").and_then(Value::as_str) == Some(name))
        .filter_map(|item| string_field(item, id_field))
        .collect()
}
