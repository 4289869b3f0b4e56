//! Logging setup for memplan
//!
//! The library only emits `tracing` events; nothing is printed unless the
//! embedding application installs a subscriber. These helpers install one.
//!
//! - allocator `info()` snapshots log at `info`
//! - materialize/release and graph summaries log at `debug`
//! - per-operation events log at `trace` (only when
//!   `PlannerConfig::trace_operations` is set)
//!
//! # Environment Variables
//!
//! - `RUST_LOG`: Standard tracing filter, wins over everything else
//! - `MEMPLAN_LOG_LEVEL`: error, warn, info, debug or trace
//! - `MEMPLAN_LOG_FORMAT`: "human" or "json"
//! - `MEMPLAN_LOG_FILE`: Optional file that also receives JSON lines

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Mutex;

use once_cell::sync::OnceCell;
use thiserror::Error;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

/// Set once a subscriber has been installed by this module
static TRACING_INITIALIZED: OnceCell<()> = OnceCell::new();

pub const LOG_LEVEL_ENV: &str = "MEMPLAN_LOG_LEVEL";
pub const LOG_FORMAT_ENV: &str = "MEMPLAN_LOG_FORMAT";
pub const LOG_FILE_ENV: &str = "MEMPLAN_LOG_FILE";

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("invalid log level: {0}")]
    InvalidLogLevel(String),

    #[error("invalid log format: {0}")]
    InvalidLogFormat(String),

    #[error("failed to create log directory: {0}")]
    DirectoryCreationFailed(String),

    #[error("failed to open log file: {0}")]
    FileOpenFailed(String),

    /// Another global subscriber was installed first
    #[error("failed to install subscriber: {0}")]
    InitFailed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    Error,
    #[default]
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_tracing_level(&self) -> tracing::Level {
        match self {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }

    pub fn as_filter_str(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

impl FromStr for LogLevel {
    type Err = LoggingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "error" => Ok(LogLevel::Error),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" => Ok(LogLevel::Debug),
            "trace" => Ok(LogLevel::Trace),
            _ => Err(LoggingError::InvalidLogLevel(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Colored, human-readable lines
    #[default]
    Human,
    /// One JSON object per event
    Json,
}

impl FromStr for LogFormat {
    type Err = LoggingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "human" | "pretty" | "console" => Ok(LogFormat::Human),
            "json" | "structured" => Ok(LogFormat::Json),
            _ => Err(LoggingError::InvalidLogFormat(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct LoggingConfig {
    pub level: LogLevel,
    pub format: LogFormat,
    /// Include file/line in console output
    pub with_file_info: bool,
    /// Log span close events with timings
    pub with_span_events: bool,
    /// Also append JSON lines to this file
    pub log_file: Option<PathBuf>,
}

impl LoggingConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_file_info(mut self, with_file_info: bool) -> Self {
        self.with_file_info = with_file_info;
        self
    }

    pub fn with_span_events(mut self, with_span_events: bool) -> Self {
        self.with_span_events = with_span_events;
        self
    }

    pub fn with_log_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_file = Some(path.into());
        self
    }

    /// Defaults overridden by the `MEMPLAN_LOG_*` variables.
    ///
    /// Unlike [`init_logging_default`], malformed values are reported.
    pub fn from_env() -> Result<Self, LoggingError> {
        let mut config = Self::new();
        if let Ok(level) = std::env::var(LOG_LEVEL_ENV) {
            config.level = level.parse()?;
        }
        if let Ok(format) = std::env::var(LOG_FORMAT_ENV) {
            config.format = format.parse()?;
        }
        if let Ok(file) = std::env::var(LOG_FILE_ENV) {
            config.log_file = Some(PathBuf::from(file));
        }
        Ok(config)
    }
}

/// Install a subscriber configured from the environment, ignoring errors.
///
/// Safe to call any number of times.
///
/// # Example
///
/// ```ignore
/// memplan::init_logging_default();
/// tracing::info!("planning started");
/// ```
pub fn init_logging_default() {
    let config = LoggingConfig::from_env().unwrap_or_default();
    let _ = init_with_config(&config);
}

/// Install a subscriber for `config`.
///
/// Only the first successful call installs anything; later calls return
/// `Ok(())` without touching the global subscriber.
pub fn init_with_config(config: &LoggingConfig) -> Result<(), LoggingError> {
    TRACING_INITIALIZED
        .get_or_try_init(|| install(config))
        .map(|_| ())
}

fn install(config: &LoggingConfig) -> Result<(), LoggingError> {
    let filter = build_env_filter(config.level)?;
    let spans = span_events(config.with_span_events);

    let human = (config.format == LogFormat::Human).then(|| {
        fmt::layer()
            .with_target(true)
            .with_file(config.with_file_info)
            .with_line_number(config.with_file_info)
            .with_span_events(spans.clone())
    });

    let json = (config.format == LogFormat::Json).then(|| {
        fmt::layer()
            .json()
            .with_target(false)
            .with_file(config.with_file_info)
            .with_line_number(config.with_file_info)
            .with_span_events(spans.clone())
    });

    let file = match &config.log_file {
        Some(path) => Some(
            fmt::layer()
                .json()
                .with_writer(Mutex::new(open_log_file(path)?))
                .with_ansi(false)
                .with_file(true)
                .with_line_number(true)
                .with_span_events(spans.clone()),
        ),
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(human)
        .with(json)
        .with(file)
        .try_init()
        .map_err(|e| LoggingError::InitFailed(e.to_string()))
}

fn open_log_file(path: &Path) -> Result<std::fs::File, LoggingError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .map_err(|e| LoggingError::DirectoryCreationFailed(e.to_string()))?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| LoggingError::FileOpenFailed(format!("{}: {}", path.display(), e)))
}

fn span_events(enabled: bool) -> FmtSpan {
    if enabled {
        FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    }
}

/// `RUST_LOG` if set, otherwise `default_level`
fn build_env_filter(default_level: LogLevel) -> Result<EnvFilter, LoggingError> {
    match std::env::var("RUST_LOG") {
        Ok(directives) => EnvFilter::try_new(directives)
            .map_err(|e| LoggingError::InvalidLogLevel(e.to_string())),
        Err(_) => Ok(EnvFilter::new(default_level.as_filter_str())),
    }
}

pub fn is_initialized() -> bool {
    TRACING_INITIALIZED.get().is_some()
}
