//! Structured logging foundation for tw-core.
//!
//! Dual-mode logging:
//! - Human-readable console output for interactive use
//! - Machine-parseable JSONL for daemon/agent workflows
//!
//! stdout is reserved for engine output (threshold events as JSONL);
//! stderr receives all log output. Respects the TW_LOG and TW_LOG_FORMAT
//! environment variables, plus RUST_LOG for fine-grained filtering.

use std::io::IsTerminal;
use std::str::FromStr;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Output format for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Human,
    Jsonl,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "human" | "text" => Ok(LogFormat::Human),
            "jsonl" | "json" => Ok(LogFormat::Jsonl),
            other => Err(format!("unknown log format: {other}")),
        }
    }
}

/// Logging configuration resolved from environment and CLI flags.
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub format: LogFormat,
    /// Default level applied when RUST_LOG is not set (error/warn/info/...).
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Human,
            level: "info".to_string(),
        }
    }
}

impl LogConfig {
    /// Resolve from environment, with an optional format override from the
    /// CLI. TW_LOG sets the level, TW_LOG_FORMAT the format.
    pub fn from_env(format_override: Option<LogFormat>) -> Self {
        let mut config = Self::default();
        if let Ok(level) = std::env::var("TW_LOG") {
            if !level.is_empty() {
                config.level = level;
            }
        }
        if let Ok(format) = std::env::var("TW_LOG_FORMAT") {
            if let Ok(parsed) = format.parse() {
                config.format = parsed;
            }
        }
        if let Some(format) = format_override {
            config.format = format;
        }
        config
    }
}

/// Initialize the logging subsystem. Call once at startup.
pub fn init_logging(config: &LogConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("tw_core={}", config.level)));

    match config.format {
        LogFormat::Human => {
            let use_ansi = std::io::stderr().is_terminal();
            let fmt_layer = fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_ansi(use_ansi);
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt_layer)
                .init();
        }
        LogFormat::Jsonl => {
            let jsonl_layer = fmt::layer().json().with_writer(std::io::stderr);
            tracing_subscriber::registry()
                .with(filter)
                .with(jsonl_layer)
                .init();
        }
    }
}

/// Generate a unique run ID for this invocation.
pub fn generate_run_id() -> String {
    let uuid = uuid::Uuid::new_v4();
    format!("run-{}", &uuid.to_string()[..12])
}
