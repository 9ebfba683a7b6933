//! LLM 客户端
//!
//! 直接调用 OpenAI 兼容的 `/chat/completions` 接口，支持普通与流式两种模式。

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::core::sse::pump_completion_stream;
use crate::errors::{ClientError, Result};
use crate::logger::{Sanitizer, Timer};

/// 对话消息
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new("system", content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new("user", content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new("assistant", content)
    }
}

/// 非流式补全结果
#[derive(Debug, Clone, PartialEq)]
pub struct ChatCompletionResponse {
    pub id: String,
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub total_tokens: f64,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    stream: bool,
    messages: &'a [ChatMessage],
}

#[derive(Deserialize)]
struct ChatResponse {
    id: String,
    model: String,
    #[serde(default)]
    choices: Vec<Choice>,
    usage: Usage,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    role: String,
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct Usage {
    total_tokens: f64,
}

impl From<ChatResponse> for ChatCompletionResponse {
    fn from(res: ChatResponse) -> Self {
        let messages = res
            .choices
            .into_iter()
            .next()
            .map(|c| ChatMessage {
                role: c.message.role,
                content: c.message.content.unwrap_or_default(),
            })
            .into_iter()
            .collect();

        Self {
            id: res.id,
            model: res.model,
            messages,
            total_tokens: res.usage.total_tokens,
        }
    }
}

/// OpenAI 兼容客户端
#[derive(Clone)]
pub struct OpenAIClient {
    base_url: String,
    api_key: String,
    http: reqwest::Client,
}

impl OpenAIClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            base_url,
            api_key: api_key.into(),
            http: reqwest::Client::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    async fn post(&self, messages: &[ChatMessage], model: &str, stream: bool) -> Result<reqwest::Response> {
        debug!(
            model,
            stream,
            messages = messages.len(),
            api_key = %Sanitizer::access_key(&self.api_key),
            "calling chat completions"
        );

        let response = self
            .http
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&ChatRequest {
                model,
                stream,
                messages,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    /// 普通补全
    pub async fn create_chat_completion(
        &self,
        messages: &[ChatMessage],
        model: &str,
    ) -> Result<ChatCompletionResponse> {
        let _timer = Timer::new("llm.chat_completion").with_subject(model);
        let response: ChatResponse = self.post(messages, model, false).await?.json().await?;
        let response = ChatCompletionResponse::from(response);
        info!(id = %response.id, total_tokens = response.total_tokens, "chat completion finished");
        Ok(response)
    }

    /// 流式补全，每收到一段增量文本调用一次 `on_token`，返回完整回复
    pub async fn create_streaming_chat_completion<F>(
        &self,
        messages: &[ChatMessage],
        model: &str,
        on_token: F,
    ) -> Result<String>
    where
        F: FnMut(&str),
    {
        let _timer = Timer::new("llm.streaming_chat_completion").with_subject(model);
        let response = self.post(messages, model, true).await?;
        pump_completion_stream(response.bytes_stream(), on_token).await
    }
}

impl std::fmt::Debug for OpenAIClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAIClient")
            .field("base_url", &self.base_url)
            .field("api_key", &Sanitizer::access_key(&self.api_key))
            .finish()
    }
}

/// 多轮对话，保留历史消息
#[derive(Debug, Clone)]
pub struct Conversation {
    client: OpenAIClient,
    model: String,
    history: Vec<ChatMessage>,
}

impl Conversation {
    pub fn new(client: OpenAIClient, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
            history: Vec::new(),
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.history.insert(0, ChatMessage::system(prompt));
        self
    }

    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    /// 发送用户消息并流式接收回复
    ///
    /// 请求失败时撤回本轮用户消息，历史保持不变。
    pub async fn send<F>(&mut self, text: &str, on_token: F) -> Result<String>
    where
        F: FnMut(&str),
    {
        self.history.push(ChatMessage::user(text));
        match self
            .client
            .create_streaming_chat_completion(&self.history, &self.model, on_token)
            .await
        {
            Ok(reply) => {
                self.history.push(ChatMessage::assistant(reply.clone()));
                Ok(reply)
            }
            Err(e) => {
                self.history.pop();
                Err(e)
            }
        }
    }
}
