//! Logging configuration and initialization
//!
//! Structured logging with tracing: compact console output, optional JSON
//! lines and an optional log file written through a non-blocking worker.

use std::path::PathBuf;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*, Layer, Registry};

/// Filter variable checked before `RUST_LOG`
pub const LOG_ENV: &str = "SKETCH_MAPPER_LOG";

/// Set to "json" for JSON console output
pub const LOG_FORMAT_ENV: &str = "SKETCH_MAPPER_LOG_FORMAT";

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync + 'static>;

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Write to stderr (default: true)
    pub console_enabled: bool,
    /// Also write to a file (default: false)
    pub file_enabled: bool,
    /// Log file path (default: sketch_mapper.log in the working directory)
    pub file_path: Option<PathBuf>,
    /// JSON console output (default: false, overridden by `SKETCH_MAPPER_LOG_FORMAT`)
    pub json_format: bool,
    /// Filter used when neither env variable is set (default: "info")
    pub default_level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            console_enabled: true,
            file_enabled: false,
            file_path: None,
            json_format: false,
            default_level: "info".to_string(),
        }
    }
}

impl LogConfig {
    /// Log to `path` as well as the console
    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.file_enabled = true;
        self.file_path = Some(path.into());
        self
    }

    fn log_file(&self) -> PathBuf {
        self.file_path
            .clone()
            .unwrap_or_else(|| PathBuf::from("sketch_mapper.log"))
    }

    /// JSON requested by env, falling back to the config flag
    fn use_json(&self) -> bool {
        std::env::var(LOG_FORMAT_ENV)
            .map(|v| v.eq_ignore_ascii_case("json"))
            .unwrap_or(self.json_format)
    }

    /// `SKETCH_MAPPER_LOG`, then `RUST_LOG`, then `default_level`
    fn env_filter(&self) -> EnvFilter {
        EnvFilter::try_from_env(LOG_ENV)
            .or_else(|_| EnvFilter::try_from_env("RUST_LOG"))
            .unwrap_or_else(|_| EnvFilter::new(&self.default_level))
    }
}

fn console_layer(json: bool) -> BoxedLayer {
    if json {
        fmt::layer()
            .json()
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .with_writer(std::io::stderr)
            .boxed()
    } else {
        fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .with_writer(std::io::stderr)
            .compact()
            .boxed()
    }
}

/// Initialize the global subscriber.
///
/// The returned guard flushes the log file when dropped; keep it alive for
/// the whole program when file logging is enabled.
///
/// # Environment Variables
///
/// - `SKETCH_MAPPER_LOG`: filter directives (e.g. "debug", "info,sketch_mapper=debug")
/// - `SKETCH_MAPPER_LOG_FORMAT`: "json" for JSON output
pub fn init_logging(
    config: &LogConfig,
) -> Result<Option<WorkerGuard>, Box<dyn std::error::Error + Send + Sync>> {
    let use_json = config.use_json();
    let mut layers: Vec<BoxedLayer> = Vec::new();
    let mut file_guard = None;

    if config.file_enabled {
        let log_path = config.log_file();
        let file = std::fs::File::create(&log_path)?;
        let (writer, guard) = tracing_appender::non_blocking(file);
        file_guard = Some(guard);

        layers.push(
            fmt::layer()
                .with_writer(writer)
                .with_target(true)
                .with_file(true)
                .with_line_number(true)
                .with_ansi(false)
                .boxed(),
        );
        eprintln!("Logging to file: {}", log_path.display());
    }

    if config.console_enabled {
        layers.push(console_layer(use_json));
    }

    tracing_subscriber::registry()
        .with(layers)
        .with(config.env_filter())
        .try_init()?;

    tracing::info!(
        target: "sketch_mapper",
        version = env!("CARGO_PKG_VERSION"),
        json_format = use_json,
        file_enabled = config.file_enabled,
        "Logging initialized"
    );

    Ok(file_guard)
}

/// Console logging with default settings
pub fn init_logging_default(
) -> Result<Option<WorkerGuard>, Box<dyn std::error::Error + Send + Sync>> {
    init_logging(&LogConfig::default())
}

pub use tracing_appender::non_blocking::WorkerGuard as LogGuard;
