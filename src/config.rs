//! 命令行与环境变量配置

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::logger::LogFormat;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "larkoss",
    author,
    version,
    about = "对象存储、飞书机器人与 LLM 对话的命令行演示"
)]
pub struct AppConfig {
    /// 日志格式: pretty, compact, json
    #[arg(long, env = "LOG_FORMAT", default_value = "pretty", global = true)]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// 对象存储操作
    Oss(OssArgs),
    /// 飞书应用机器人
    Bot(BotArgs),
    /// 飞书群自定义机器人
    Webhook(WebhookArgs),
    /// LLM 对话；不提供 prompt 时进入交互模式
    Chat(ChatArgs),
}

#[derive(Args, Debug, Clone)]
pub struct OssArgs {
    /// 地域 endpoint，例如 oss-cn-hangzhou.aliyuncs.com
    #[arg(long, env = "OSS_ENDPOINT")]
    pub endpoint: String,

    #[arg(long, env = "OSS_BUCKET")]
    pub bucket: String,

    #[arg(long, env = "OSS_ACCESS_KEY_ID")]
    pub access_key_id: String,

    #[arg(long, env = "OSS_ACCESS_KEY_SECRET", hide_env_values = true)]
    pub access_key_secret: String,

    #[command(subcommand)]
    pub action: OssAction,
}

#[derive(Subcommand, Debug, Clone)]
pub enum OssAction {
    /// 上传本地文件
    Upload { key: String, path: PathBuf },
    /// 上传文本
    UploadText { key: String, text: String },
    /// 下载对象
    Download {
        key: String,
        /// 保存目录，默认当前目录
        #[arg(long)]
        dir: Option<PathBuf>,
    },
    /// 列举对象
    Ls {
        #[arg(default_value = "")]
        prefix: String,
    },
    /// 列举一层目录内容
    Tree {
        #[arg(default_value = "")]
        prefix: String,
    },
    /// 输出文本对象内容
    Cat { key: String },
    /// 删除对象
    Rm { key: String },
    /// 删除前缀下的全部对象
    RmPrefix { prefix: String },
    /// 上传目录
    UploadDir {
        path: PathBuf,
        #[arg(long, default_value = "")]
        prefix: String,
    },
    /// 下载前缀下的全部对象
    DownloadDir { prefix: String, path: PathBuf },
}

#[derive(Args, Debug, Clone)]
pub struct BotArgs {
    #[arg(long, env = "LARK_APP_ID")]
    pub app_id: String,

    #[arg(long, env = "LARK_APP_SECRET", hide_env_values = true)]
    pub app_secret: String,

    #[command(subcommand)]
    pub action: BotAction,
}

#[derive(Subcommand, Debug, Clone)]
pub enum BotAction {
    /// 发送文本消息
    SendText {
        /// 用户 open_id，加 --chat 时为群 chat_id
        receive_id: String,
        text: String,
        #[arg(long)]
        chat: bool,
    },
    /// 列出机器人所在群组
    Groups,
    /// 列出群成员
    Members { chat_id: String },
    /// 上传图片并输出 image_key
    UploadImage { path: PathBuf },
}

#[derive(Args, Debug, Clone)]
pub struct WebhookArgs {
    #[arg(long, env = "LARK_WEBHOOK")]
    pub webhook: String,

    /// 签名密钥，留空则不签名
    #[arg(long, env = "LARK_WEBHOOK_SECRET", default_value = "", hide_env_values = true)]
    pub secret: String,

    #[command(subcommand)]
    pub action: WebhookAction,
}

#[derive(Subcommand, Debug, Clone)]
pub enum WebhookAction {
    /// 发送文本消息
    SendText {
        text: String,
        /// 追加 @所有人
        #[arg(long)]
        mention_all: bool,
    },
}

#[derive(Args, Debug, Clone)]
pub struct ChatArgs {
    #[arg(long, env = "OPENAI_BASE_URL", default_value = "https://api.openai.com/v1")]
    pub base_url: String,

    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub api_key: String,

    #[arg(long, env = "OPENAI_MODEL", default_value = "gpt-4o-mini")]
    pub model: String,

    #[arg(long, env = "SYSTEM_PROMPT")]
    pub system_prompt: Option<String>,

    /// 流式输出
    #[arg(long)]
    pub stream: bool,

    pub prompt: Option<String>,
}
