use std::io::Write;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;

use larkoss::config::{
    AppConfig, BotAction, BotArgs, ChatArgs, Command, OssAction, OssArgs, WebhookAction,
    WebhookArgs,
};
use larkoss::logger::{self, LogConfig};
use larkoss::{
    ChatMessage, Conversation, LarkBot, LarkWebhookBot, ObjectStorageClient, OpenAIClient,
    ReceiveId,
};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cfg = AppConfig::parse();

    logger::init(LogConfig {
        format: cfg.log_format,
        ..Default::default()
    });

    match cfg.command {
        Command::Oss(args) => run_oss(args).await,
        Command::Bot(args) => run_bot(args).await,
        Command::Webhook(args) => run_webhook(args).await,
        Command::Chat(args) => run_chat(args).await,
    }
}

fn report(ok: bool, what: &str) -> Result<()> {
    if ok {
        info!("{} succeeded", what);
        Ok(())
    } else {
        bail!("{} failed", what)
    }
}

async fn run_oss(args: OssArgs) -> Result<()> {
    let oss = ObjectStorageClient::new(
        &args.endpoint,
        &args.bucket,
        &args.access_key_id,
        &args.access_key_secret,
    )?;

    match args.action {
        OssAction::Upload { key, path } => report(oss.upload_file(&key, &path).await?, "upload"),
        OssAction::UploadText { key, text } => {
            report(oss.upload_text(&key, &text).await?, "upload text")
        }
        OssAction::Download { key, dir } => {
            report(oss.download_file(&key, dir.as_deref()).await?, "download")
        }
        OssAction::Ls { prefix } => {
            for key in oss.list_keys_with_prefix(&prefix).await? {
                println!("{}", key);
            }
            Ok(())
        }
        OssAction::Tree { prefix } => {
            for item in oss.list_directory_contents(&prefix).await? {
                if item.is_directory {
                    println!("📁 {}/", item.name);
                } else {
                    println!("📄 {}", item.name);
                }
            }
            Ok(())
        }
        OssAction::Cat { key } => match oss.read_file_content(&key).await? {
            Some(content) => {
                println!("{}", content);
                Ok(())
            }
            None => bail!("cannot read {}", key),
        },
        OssAction::Rm { key } => report(oss.delete_file(&key).await?, "delete"),
        OssAction::RmPrefix { prefix } => {
            report(oss.delete_files_with_prefix(&prefix).await?, "delete prefix")
        }
        OssAction::UploadDir { path, prefix } => {
            report(oss.upload_directory(&path, &prefix).await?, "upload directory")
        }
        OssAction::DownloadDir { prefix, path } => {
            report(oss.download_directory(&prefix, &path).await?, "download directory")
        }
    }
}

async fn run_bot(args: BotArgs) -> Result<()> {
    let bot = LarkBot::new(args.app_id, args.app_secret);

    match args.action {
        BotAction::SendText {
            receive_id,
            text,
            chat,
        } => {
            let receiver = if chat {
                ReceiveId::chat(receive_id)
            } else {
                ReceiveId::user(receive_id)
            };
            let data = bot
                .send_text(&receiver, &text)
                .await?
                .context("message was rejected")?;
            println!("{}", data);
            Ok(())
        }
        BotAction::Groups => {
            for group in bot.get_group_list().await? {
                println!(
                    "{}\t{}",
                    group["chat_id"].as_str().unwrap_or_default(),
                    group["name"].as_str().unwrap_or_default()
                );
            }
            Ok(())
        }
        BotAction::Members { chat_id } => {
            for member in bot.get_members_in_group(&chat_id).await? {
                println!(
                    "{}\t{}",
                    member["member_id"].as_str().unwrap_or_default(),
                    member["name"].as_str().unwrap_or_default()
                );
            }
            Ok(())
        }
        BotAction::UploadImage { path } => {
            let key = bot
                .upload_image(&path)
                .await?
                .context("image upload was rejected")?;
            println!("{}", key);
            Ok(())
        }
    }
}

async fn run_webhook(args: WebhookArgs) -> Result<()> {
    let bot = LarkWebhookBot::new(args.webhook, args.secret, "", "");

    match args.action {
        WebhookAction::SendText { text, mention_all } => {
            report(bot.send_text(&text, mention_all).await?, "webhook send")
        }
    }
}

async fn run_chat(args: ChatArgs) -> Result<()> {
    let client = OpenAIClient::new(args.base_url, args.api_key);

    if let Some(prompt) = args.prompt {
        let mut messages = Vec::new();
        if let Some(system) = args.system_prompt {
            messages.push(ChatMessage::system(system));
        }
        messages.push(ChatMessage::user(prompt));

        if args.stream {
            client
                .create_streaming_chat_completion(&messages, &args.model, print_token)
                .await?;
            println!();
        } else {
            let response = client.create_chat_completion(&messages, &args.model).await?;
            for message in &response.messages {
                println!("{}", message.content);
            }
            info!(id = %response.id, model = %response.model, total_tokens = response.total_tokens, "done");
        }
        return Ok(());
    }

    let mut conversation = Conversation::new(client, args.model);
    if let Some(system) = args.system_prompt {
        conversation = conversation.with_system_prompt(system);
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    print!("> ");
    std::io::stdout().flush()?;
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if !line.is_empty() {
            if let Err(e) = conversation.send(line, print_token).await {
                eprintln!("Error: {}", e);
            }
            println!();
        }
        print!("> ");
        std::io::stdout().flush()?;
    }
    Ok(())
}

fn print_token(token: &str) {
    print!("{}", token);
    let _ = std::io::stdout().flush();
}
