//! Structured logging setup and the human-readable run log.

use std::env;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, TimeZone};
use thiserror::Error;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

pub const RUN_LOG_TAG: &str = "data_activity_report";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
    pub include_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
            include_target: true,
        }
    }
}

#[derive(Debug, Error)]
pub enum LoggingInitError {
    #[error("logging already initialized: {0}")]
    AlreadyInitialized(#[from] tracing::subscriber::SetGlobalDefaultError),
}

pub fn logging_config_from_env() -> LoggingConfig {
    let mut config = LoggingConfig::default();

    if let Ok(level) = env::var("ACTIVITY_REPORT_LOG_LEVEL") {
        let trimmed = level.trim();
        if !trimmed.is_empty() {
            config.level = trimmed.to_string();
        }
    }

    if let Ok(format) = env::var("ACTIVITY_REPORT_LOG_FORMAT") {
        if let Some(parsed) = parse_log_format(&format) {
            config.format = parsed;
        }
    }

    if let Ok(include_target) = env::var("ACTIVITY_REPORT_LOG_TARGET") {
        if let Some(parsed) = parse_bool(&include_target) {
            config.include_target = parsed;
        }
    }

    config
}

/// Installs the global subscriber. Structured events go to stderr so they do
/// not interleave with run-log lines on stdout.
pub fn init_logging(config: &LoggingConfig) -> Result<(), LoggingInitError> {
    let env_filter =
        EnvFilter::try_new(config.level.clone()).unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(config.include_target)
        .with_ansi(matches!(config.format, LogFormat::Pretty))
        .with_writer(std::io::stderr);

    match config.format {
        LogFormat::Json => tracing::subscriber::set_global_default(builder.json().finish())?,
        LogFormat::Pretty => tracing::subscriber::set_global_default(builder.pretty().finish())?,
    }

    Ok(())
}

pub fn log_run_start(config: &LoggingConfig, base_dir: &Path) {
    info!(
        component = "data_activity_report",
        event = "run.start",
        base_dir = %base_dir.display(),
        log_level = %config.level,
        log_format = ?config.format,
        include_target = config.include_target
    );
}

pub fn log_run_finish(status: &str, error: Option<&str>) {
    match error {
        Some(error) => warn!(
            component = "data_activity_report",
            event = "run.finish",
            status,
            error
        ),
        None => info!(
            component = "data_activity_report",
            event = "run.finish",
            status
        ),
    }
}

/// Timestamped audit log of one run. Every line is echoed to stdout and
/// appended to the log file; a log file that cannot be written only costs the
/// file copy, never the run.
#[derive(Debug)]
pub struct RunLog {
    path: Option<PathBuf>,
    echo: bool,
    lines: Vec<String>,
}

impl RunLog {
    pub fn new(path: Option<PathBuf>) -> Self {
        if let Some(parent) = path.as_deref().and_then(Path::parent) {
            if let Err(err) = fs::create_dir_all(parent) {
                warn!(
                    component = "run_log",
                    event = "run_log.dir.create_failed",
                    dir = %parent.display(),
                    error = %err
                );
            }
        }
        Self {
            path,
            echo: true,
            lines: Vec::new(),
        }
    }

    pub fn with_echo(mut self, echo: bool) -> Self {
        self.echo = echo;
        self
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn line(&mut self, msg: impl AsRef<str>) {
        let line = format_run_log_line(&Local::now(), msg.as_ref());
        if self.echo {
            println!("{line}");
        }
        if let Some(path) = &self.path {
            if let Err(err) = append_line(path, &line) {
                warn!(
                    component = "run_log",
                    event = "run_log.append_failed",
                    path = %path.display(),
                    error = %err
                );
            }
        }
        self.lines.push(line);
    }
}

pub fn format_run_log_line<Tz: TimeZone>(ts: &DateTime<Tz>, msg: &str) -> String
where
    Tz::Offset: std::fmt::Display,
{
    format!("[{RUN_LOG_TAG}] {} {msg}", run_log_timestamp(ts))
}

pub fn run_log_timestamp<Tz: TimeZone>(ts: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    ts.format("%Y-%m-%dT%H:%M:%S").to_string()
}

fn append_line(path: &Path, line: &str) -> std::io::Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "{line}")
}

fn parse_log_format(raw: &str) -> Option<LogFormat> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "json" => Some(LogFormat::Json),
        "pretty" => Some(LogFormat::Pretty),
        _ => None,
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
