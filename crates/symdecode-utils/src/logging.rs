//! # Logging Utilities
//!
//! Logging infrastructure for symdecode using `tracing`.
//!
//! This module provides structured logging with support for:
//! - Pretty (development) and JSON (production) output
//! - Environment variable configuration
//! - Console output on stderr, so stdout stays free for results
//! - Optional file output through a non-blocking appender
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use symdecode_utils::init_logging;
//!
//! // Keep the guard alive for as long as file logs should be flushed
//! let _guard = init_logging().expect("Failed to initialize logging");
//!
//! tracing::info!("Application started");
//! ```
//!
//! ## Environment Variables
//!
//! - `RUST_LOG`: Set log level filter (e.g., `RUST_LOG=debug`, `RUST_LOG=symdecode_core=debug`)
//! - `SYMDECODE_LOG_FORMAT`: Set output format (`json` or `pretty`, default: `pretty`)
//! - `SYMDECODE_LOG_FILE`: Optional path to log file (if not set, logs only to stderr)
//!
//! The decoder's emergency path never logs, so nothing here runs inside a
//! crash handler.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::{env, io};

use chrono::Utc;
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::time::ChronoUtc;
use tracing_subscriber::fmt::{self};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

/// Environment variable selecting the output format.
pub const LOG_FORMAT_ENV: &str = "SYMDECODE_LOG_FORMAT";

/// Environment variable naming an additional log file.
pub const LOG_FILE_ENV: &str = "SYMDECODE_LOG_FILE";

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync + 'static>;

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat
{
    /// Pretty-printed, human-readable format (default for development)
    #[default]
    Pretty,
    /// JSON format (default for production)
    Json,
}

impl FromStr for LogFormat
{
    type Err = LoggingError;

    fn from_str(s: &str) -> Result<Self, Self::Err>
    {
        match s.to_lowercase().as_str() {
            "pretty" | "dev" | "development" => Ok(LogFormat::Pretty),
            "json" | "prod" | "production" => Ok(LogFormat::Json),
            _ => Err(LoggingError::InvalidFormat(s.to_string())),
        }
    }
}

impl LogFormat
{
    /// Format named by `SYMDECODE_LOG_FORMAT`, or the default if it is unset.
    ///
    /// ## Errors
    ///
    /// `InvalidFormat` if the variable holds an unknown format.
    pub fn from_env() -> Result<Self, LoggingError>
    {
        match env::var(LOG_FORMAT_ENV) {
            Ok(value) => value.parse(),
            Err(_) => Ok(LogFormat::default()),
        }
    }
}

/// Log level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel
{
    /// Error level
    Error,
    /// Warning level
    Warn,
    /// Info level (default)
    Info,
    /// Debug level
    Debug,
    /// Trace level (most verbose)
    Trace,
}

impl From<LogLevel> for Level
{
    fn from(level: LogLevel) -> Self
    {
        match level {
            LogLevel::Error => Level::ERROR,
            LogLevel::Warn => Level::WARN,
            LogLevel::Info => Level::INFO,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Trace => Level::TRACE,
        }
    }
}

impl FromStr for LogLevel
{
    type Err = LoggingError;

    fn from_str(s: &str) -> Result<Self, Self::Err>
    {
        match s.to_lowercase().as_str() {
            "error" | "err" => Ok(LogLevel::Error),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" | "dbg" => Ok(LogLevel::Debug),
            "trace" => Ok(LogLevel::Trace),
            _ => Err(LoggingError::InvalidLevel(s.to_string())),
        }
    }
}

/// Keeps the file writer thread alive; buffered lines are flushed on drop.
///
/// Console-only setups return a guard holding nothing.
#[must_use = "dropping the guard stops file logging"]
#[derive(Debug, Default)]
pub struct LoggingGuard
{
    file: Option<WorkerGuard>,
}

impl LoggingGuard
{
    /// `true` if a log file is being written.
    pub fn has_file(&self) -> bool
    {
        self.file.is_some()
    }
}

/// Initialize logging with default settings
///
/// Reads configuration from environment variables:
/// - `RUST_LOG`: Log level filter (e.g., `debug`, `symdecode_core=debug`)
/// - `SYMDECODE_LOG_FORMAT`: Output format (`json` or `pretty`, default: `pretty`)
/// - `SYMDECODE_LOG_FILE`: Optional path to log file
///
/// ## Errors
///
/// Returns an error if:
/// - Logging is already initialized
/// - `SYMDECODE_LOG_FORMAT` holds an unknown format
pub fn init_logging() -> Result<LoggingGuard, LoggingError>
{
    init_logging_internal(LogFormat::from_env()?, None)
}

/// Initialize logging with an explicit format
///
/// The level still comes from `RUST_LOG` (INFO if unset), and
/// `SYMDECODE_LOG_FILE` is honoured.
///
/// ## Errors
///
/// Returns an error if logging is already initialized.
pub fn init_logging_with_format(format: LogFormat) -> Result<LoggingGuard, LoggingError>
{
    init_logging_internal(format, None)
}

/// Initialize logging with explicit level and format
///
/// `RUST_LOG` is ignored; `SYMDECODE_LOG_FILE` is still honoured.
///
/// ## Example
///
/// ```rust,no_run
/// use symdecode_utils::{LogFormat, LogLevel, init_logging_with_level};
///
/// let _guard = init_logging_with_level(LogLevel::Debug, LogFormat::Pretty)
///     .expect("Failed to initialize logging");
/// ```
///
/// ## Errors
///
/// Returns an error if logging is already initialized.
pub fn init_logging_with_level(level: LogLevel, format: LogFormat) -> Result<LoggingGuard, LoggingError>
{
    init_logging_internal(format, Some(level.into()))
}

/// Initialize file-only logging (nothing on stderr)
///
/// With `path == None` the file goes to `~/.symdecode/YYYY-MM-DD-symdecode.log`,
/// or `/tmp/YYYY-MM-DD-symdecode.log` if there is no home directory. Returns
/// the path actually used.
///
/// ## Errors
///
/// Returns an error if logging is already initialized or the log directory
/// cannot be created.
pub fn init_logging_to_file(
    path: Option<PathBuf>,
    level: Option<LogLevel>,
    format: LogFormat,
) -> Result<(PathBuf, LoggingGuard), LoggingError>
{
    let log_file = match path {
        Some(path) => path,
        None => default_log_file()?,
    };

    let filter = build_filter(level.map(Into::into));
    let (layer, guard) = file_layer(&log_file, format, filter, false);
    Registry::default()
        .with(layer)
        .try_init()
        .map_err(|err| LoggingError::InitializationFailed(err.to_string()))?;

    Ok((log_file, LoggingGuard { file: Some(guard) }))
}

fn default_log_file() -> Result<PathBuf, LoggingError>
{
    let today = Utc::now().format("%Y-%m-%d");
    let name = format!("{today}-symdecode.log");
    match env::var("HOME") {
        Ok(home) => {
            let dir = PathBuf::from(home).join(".symdecode");
            std::fs::create_dir_all(&dir)?;
            Ok(dir.join(name))
        }
        Err(_) => Ok(env::temp_dir().join(name)),
    }
}

/// Filter priority: explicit level, then `RUST_LOG`, then INFO.
fn build_filter(explicit_level: Option<Level>) -> EnvFilter
{
    match explicit_level {
        Some(level) => EnvFilter::new(level.to_string()),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(Level::INFO.to_string())),
    }
}

fn console_layer(format: LogFormat, filter: EnvFilter) -> BoxedLayer
{
    let layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_file(true)
        .with_line_number(true)
        .with_timer(ChronoUtc::rfc_3339())
        .with_writer(io::stderr);

    match format {
        LogFormat::Pretty => layer.with_ansi(true).with_filter(filter).boxed(),
        LogFormat::Json => layer
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_filter(filter)
            .boxed(),
    }
}

/// File layer over a non-blocking appender.
///
/// `rolling` rotates daily; otherwise the file name is used as is.
fn file_layer(path: &Path, format: LogFormat, filter: EnvFilter, rolling: bool) -> (BoxedLayer, WorkerGuard)
{
    let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
    let file_name = path.file_name().unwrap_or_default();
    let appender = if rolling {
        tracing_appender::rolling::daily(dir, file_name)
    } else {
        tracing_appender::rolling::never(dir, file_name)
    };
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let layer = fmt::layer()
        .with_writer(writer)
        .with_target(true)
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_file(true)
        .with_line_number(true)
        .with_timer(ChronoUtc::rfc_3339())
        .with_ansi(false);

    let layer = match format {
        LogFormat::Pretty => layer.with_filter(filter).boxed(),
        LogFormat::Json => layer
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_filter(filter)
            .boxed(),
    };
    (layer, guard)
}

fn init_logging_internal(format: LogFormat, explicit_level: Option<Level>) -> Result<LoggingGuard, LoggingError>
{
    let mut layers = vec![console_layer(format, build_filter(explicit_level))];
    let mut guard = LoggingGuard::default();

    if let Some(file_path) = env::var_os(LOG_FILE_ENV).map(PathBuf::from) {
        let (layer, file_guard) = file_layer(&file_path, format, build_filter(explicit_level), true);
        layers.push(layer);
        guard.file = Some(file_guard);
    }

    Registry::default()
        .with(layers)
        .try_init()
        .map_err(|err| LoggingError::InitializationFailed(err.to_string()))?;
    Ok(guard)
}

/// Logging initialization error
#[derive(Debug, thiserror::Error)]
pub enum LoggingError
{
    /// Invalid log format
    #[error("Unknown log format: {0}. Use 'pretty' or 'json'")]
    InvalidFormat(String),

    /// Invalid log level
    #[error("Unknown log level: {0}. Use 'error', 'warn', 'info', 'debug', or 'trace'")]
    InvalidLevel(String),

    /// Failed to initialize logging
    #[error("Failed to initialize logging: {0}")]
    InitializationFailed(String),

    /// File logging error
    #[error("File logging error: {0}")]
    FileError(#[from] io::Error),
}
