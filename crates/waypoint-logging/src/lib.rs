//! Structured logging for Waypoint simulations
//!
//! Routers emit their decisions through `tracing`. This crate installs a
//! subscriber that writes them as JSONL (the default) or pretty console
//! output, optionally to rotated files, with the active node attached to
//! every span.
//!
//! # Quick Start
//!
//! ```ignore
//! use waypoint_logging::{LogConfig, WaypointSubscriberBuilder};
//!
//! // JSONL to console
//! WaypointSubscriberBuilder::new().init();
//!
//! // Pretty human-readable output
//! WaypointSubscriberBuilder::new()
//!     .with_config(LogConfig::development())
//!     .init();
//! ```
//!
//! `RUST_LOG` overrides the configured default level, e.g.
//! `RUST_LOG=waypoint_dtn=trace` to see every predictability update.
//!
//! # Node Context
//!
//! ```ignore
//! use waypoint_logging::NodeContextGuard;
//!
//! let _guard = NodeContextGuard::new(&node);
//! let _span = tracing::debug_span!("tick", now).entered();
//! router.update(&mut engine, &mut peers, now)?;
//! ```

pub mod config;
pub mod context;
pub mod layers;

pub use config::{ConsoleConfig, FileConfig, JsonlConfig, LogConfig, RotationStrategy};
pub use context::{NodeContextData, NodeContextGuard};
pub use layers::{NodeContextExtension, NodeContextLayer, jsonl_layer};

use std::fs::{self, File};

use thiserror::Error;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{InitError, RollingFileAppender, Rotation};
use tracing_subscriber::{
    EnvFilter, Layer, Registry,
    layer::{Layered, SubscriberExt},
    util::{SubscriberInitExt, TryInitError},
};

/// Subscriber stack every output layer is attached to
type BaseSubscriber = Layered<NodeContextLayer, Layered<EnvFilter, Registry>>;

type BoxedLayer = Box<dyn Layer<BaseSubscriber> + Send + Sync>;

/// Errors raised while installing the subscriber
#[derive(Debug, Error)]
pub enum LoggingError {
    /// The log directory or file could not be created
    #[error("Failed to open log file: {0}")]
    File(#[from] std::io::Error),

    /// The rolling appender could not be built
    #[error("Failed to create rolling log appender: {0}")]
    Appender(#[from] InitError),

    /// A global subscriber is already installed
    #[error("Global subscriber already set: {0}")]
    AlreadyInitialized(#[from] TryInitError),
}

/// Builder for configuring and installing the Waypoint subscriber
///
/// By default console output is JSONL. Use [`LogConfig::development`] for
/// human-readable output.
#[derive(Debug, Clone, Default)]
pub struct WaypointSubscriberBuilder {
    config: LogConfig,
}

impl WaypointSubscriberBuilder {
    pub fn new() -> Self {
        Self {
            config: LogConfig::default(),
        }
    }

    /// Use a specific configuration
    pub fn with_config(mut self, config: LogConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the default log level
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.config.default_level = level.into();
        self
    }

    /// Enable or disable console output
    pub fn with_console(mut self, enabled: bool) -> Self {
        self.config.console.enabled = enabled;
        self
    }

    /// Configure file output
    pub fn with_file_output(mut self, config: FileConfig) -> Self {
        self.config.file = Some(config);
        self
    }

    pub fn config(&self) -> &LogConfig {
        &self.config
    }

    /// Install the subscriber globally
    ///
    /// The returned guard flushes file output on drop and must be kept alive
    /// for the duration of the run.
    pub fn try_init(self) -> Result<Option<WorkerGuard>, LoggingError> {
        let env_filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(&self.config.default_level));

        let mut layers: Vec<BoxedLayer> = Vec::new();
        let mut guard = None;

        if self.config.console.enabled {
            layers.push(self.console_layer());
        }

        if let Some(file_config) = &self.config.file {
            let (writer, file_guard) = file_writer(file_config)?;
            layers.push(jsonl_layer(writer, &self.config.jsonl));
            guard = Some(file_guard);
        }

        Registry::default()
            .with(env_filter)
            .with(NodeContextLayer::new())
            .with(layers)
            .try_init()?;

        Ok(guard)
    }

    /// Install the subscriber globally, reporting failures on stderr
    pub fn init(self) -> Option<WorkerGuard> {
        match self.try_init() {
            Ok(guard) => guard,
            Err(e) => {
                eprintln!("Warning: logging not initialized: {}", e);
                None
            }
        }
    }

    fn console_layer(&self) -> BoxedLayer {
        let console = &self.config.console;
        match (console.pretty, console.test_writer) {
            (true, true) => tracing_subscriber::fmt::layer()
                .with_ansi(console.ansi)
                .with_target(true)
                .with_test_writer()
                .boxed(),
            (true, false) => tracing_subscriber::fmt::layer()
                .with_ansi(console.ansi)
                .with_target(true)
                .boxed(),
            (false, true) => {
                jsonl_layer(tracing_subscriber::fmt::TestWriter::new(), &self.config.jsonl)
            }
            (false, false) => jsonl_layer(std::io::stdout, &self.config.jsonl),
        }
    }
}

/// Non-blocking writer for file output
fn file_writer(config: &FileConfig) -> Result<(NonBlocking, WorkerGuard), LoggingError> {
    let rotation = match config.rotation {
        RotationStrategy::Never => {
            fs::create_dir_all(&config.directory)?;
            let path = config.directory.join(format!("{}.jsonl", config.prefix));
            return Ok(tracing_appender::non_blocking(File::create(path)?));
        }
        RotationStrategy::Daily => Rotation::DAILY,
        RotationStrategy::Hourly => Rotation::HOURLY,
    };

    let mut builder = RollingFileAppender::builder()
        .rotation(rotation)
        .filename_prefix(&config.prefix)
        .filename_suffix("jsonl");
    if let Some(max_files) = config.max_files {
        builder = builder.max_log_files(max_files);
    }

    Ok(tracing_appender::non_blocking(builder.build(&config.directory)?))
}

/// Initialize logging with default settings (JSONL to console)
pub fn init_default() {
    WaypointSubscriberBuilder::new().init();
}

/// Initialize logging for development (verbose, pretty console output)
pub fn init_development() {
    WaypointSubscriberBuilder::new()
        .with_config(LogConfig::development())
        .init();
}

/// Initialize logging for tests
///
/// Safe to call from every test: only the first call installs a subscriber.
pub fn init_testing() {
    let _ = WaypointSubscriberBuilder::new()
        .with_config(LogConfig::testing())
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults_to_jsonl() {
        let builder = WaypointSubscriberBuilder::new();
        assert_eq!(builder.config().default_level, "info");
        assert!(!builder.config().console.pretty);
    }

    #[test]
    fn test_builder_with_config() {
        let builder = WaypointSubscriberBuilder::new().with_config(LogConfig::development());
        assert_eq!(builder.config().default_level, "debug");
        assert!(builder.config().console.pretty);
    }

    #[test]
    fn test_builder_setters() {
        let builder = WaypointSubscriberBuilder::new()
            .with_level("trace")
            .with_console(false)
            .with_file_output(FileConfig::default());
        assert_eq!(builder.config().default_level, "trace");
        assert!(!builder.config().console.enabled);
        assert!(builder.config().file.is_some());
    }

    #[test]
    fn test_single_file_writer_truncates() {
        let dir = tempfile::tempdir().unwrap();
        let config = FileConfig {
            directory: dir.path().join("nested"),
            prefix: "run".to_string(),
            rotation: RotationStrategy::Never,
            max_files: None,
        };

        let path = config.directory.join("run.jsonl");
        fs::create_dir_all(&config.directory).unwrap();
        fs::write(&path, "stale").unwrap();

        let (_writer, _guard) = file_writer(&config).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "");
    }

    #[test]
    fn test_rolling_file_writer() {
        let dir = tempfile::tempdir().unwrap();
        let config = FileConfig {
            directory: dir.path().to_path_buf(),
            rotation: RotationStrategy::Hourly,
            ..FileConfig::default()
        };
        assert!(file_writer(&config).is_ok());
    }

    #[test]
    fn test_init_testing_is_idempotent() {
        init_testing();
        init_testing();
        tracing::warn!("still logging");
    }
}
