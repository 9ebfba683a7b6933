//! 日志模块
//!
//! - 支持人类可读、紧凑单行、JSON 三种格式
//! - `Timer` 在作用域结束时记录一次调用的耗时
//! - `Sanitizer` 在密钥、令牌写入日志前脱敏

use std::time::Instant;

use tracing::{Event, Level, Subscriber};
use tracing_subscriber::{
    fmt::{format::Writer, FmtContext, FormatEvent, FormatFields},
    layer::SubscriberExt,
    registry::LookupSpan,
    util::SubscriberInitExt,
    EnvFilter,
};

/// 日志格式类型
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LogFormat {
    /// 人类可读格式（带颜色）
    Pretty,
    /// 紧凑单行格式
    Compact,
    /// JSON 结构化格式
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "compact" => Ok(LogFormat::Compact),
            "json" => Ok(LogFormat::Json),
            _ => Err(format!("unknown log format: {}", s)),
        }
    }
}

impl std::fmt::Display for LogFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogFormat::Pretty => write!(f, "pretty"),
            LogFormat::Compact => write!(f, "compact"),
            LogFormat::Json => write!(f, "json"),
        }
    }
}

/// 日志配置
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub format: LogFormat,
    /// 仅 Pretty / Compact 格式有效
    pub enable_color: bool,
    pub show_target: bool,
    pub show_file: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Pretty,
            enable_color: true,
            show_target: true,
            show_file: false,
        }
    }
}

/// 初始化日志系统
///
/// `RUST_LOG` 控制过滤级别，未设置时为 `info`。重复初始化会被忽略。
pub fn init(config: LogConfig) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::registry().with(env_filter);

    let result = match config.format {
        LogFormat::Pretty => {
            let fmt_layer = tracing_subscriber::fmt::layer()
                .event_format(PrettyFormatter::new(config.clone()));
            subscriber.with(fmt_layer).try_init()
        }
        LogFormat::Compact => {
            let fmt_layer = tracing_subscriber::fmt::layer()
                .compact()
                .with_target(config.show_target)
                .with_file(config.show_file)
                .with_line_number(config.show_file)
                .with_ansi(config.enable_color);
            subscriber.with(fmt_layer).try_init()
        }
        LogFormat::Json => {
            let fmt_layer = tracing_subscriber::fmt::layer()
                .json()
                .with_target(config.show_target)
                .with_file(config.show_file)
                .with_line_number(config.show_file)
                .with_current_span(true);
            subscriber.with(fmt_layer).try_init()
        }
    };

    if let Err(e) = result {
        tracing::debug!(error = %e, "logger already initialized");
    }
}

/// 耗时计时器，drop 时在 `metrics` target 下记录一条日志
pub struct Timer {
    operation: String,
    subject: Option<String>,
    start: Instant,
}

impl Timer {
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            subject: None,
            start: Instant::now(),
        }
    }

    /// 关联操作对象（对象 key、文件路径、模型名等）
    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        let elapsed_ms = self.start.elapsed().as_secs_f64() * 1000.0;

        match &self.subject {
            Some(subject) => tracing::debug!(
                target: "metrics",
                operation = %self.operation,
                subject = %subject,
                elapsed_ms = %format!("{:.2}", elapsed_ms),
                "operation completed"
            ),
            None => tracing::debug!(
                target: "metrics",
                operation = %self.operation,
                elapsed_ms = %format!("{:.2}", elapsed_ms),
                "operation completed"
            ),
        }
    }
}

/// 敏感信息脱敏工具
pub struct Sanitizer;

impl Sanitizer {
    /// AccessKey ID / API Key：保留前 4 位和后 4 位
    pub fn access_key(key: &str) -> String {
        let chars: Vec<char> = key.chars().collect();
        if chars.len() <= 12 {
            return "***".to_string();
        }
        let head: String = chars[..4].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{}...{}", head, tail)
    }

    /// 密钥、令牌：完全隐藏，只标记是否为空
    pub fn secret(secret: &str) -> &'static str {
        if secret.is_empty() {
            "<empty>"
        } else {
            "***"
        }
    }
}

/// 自定义美观格式器
pub struct PrettyFormatter {
    config: LogConfig,
}

impl PrettyFormatter {
    pub fn new(config: LogConfig) -> Self {
        Self { config }
    }
}

impl<S, N> FormatEvent<S, N> for PrettyFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> std::fmt::Result {
        write!(writer, "{} ", chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f"))?;

        let level = event.metadata().level();
        if self.config.enable_color {
            match *level {
                Level::ERROR => write!(writer, "\x1b[31m[ERROR]\x1b[0m ")?,
                Level::WARN => write!(writer, "\x1b[33m[WARN]\x1b[0m ")?,
                Level::INFO => write!(writer, "\x1b[32m[INFO]\x1b[0m ")?,
                Level::DEBUG => write!(writer, "\x1b[34m[DEBUG]\x1b[0m ")?,
                Level::TRACE => write!(writer, "\x1b[35m[TRACE]\x1b[0m ")?,
            }
        } else {
            write!(writer, "[{}] ", level)?;
        }

        if self.config.show_target {
            write!(writer, "{} ", event.metadata().target())?;
        }

        if self.config.show_file {
            if let (Some(file), Some(line)) = (event.metadata().file(), event.metadata().line()) {
                write!(writer, "({}:{}) ", file, line)?;
            }
        }

        ctx.format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}
