//! Structured logging for memolink devices
//!
//! Console output is JSONL by default, or pretty lines for development.
//! Optional file output writes JSONL through `tracing-appender` with daily,
//! hourly or no rotation. `RUST_LOG` overrides the configured level.
//!
//! # Quick Start
//!
//! ```ignore
//! use memolink_logging::{LogConfig, MemolinkSubscriberBuilder};
//!
//! let _guard = MemolinkSubscriberBuilder::new()
//!     .with_config(LogConfig::development())
//!     .init();
//! ```
//!
//! # Device Context
//!
//! With a phone and a watch in one process, use [`DeviceContextGuard`] so
//! spans say which device they belong to:
//!
//! ```ignore
//! let _ctx = DeviceContextGuard::new(DeviceRole::Watch);
//! tracing::info_span!("watch_node").in_scope(|| { /* ... */ });
//! ```

pub mod config;
pub mod context;
pub mod layers;

pub use config::{ConsoleConfig, FileConfig, JsonlConfig, LogConfig, RotationStrategy};
pub use context::{DeviceContextData, DeviceContextGuard};
pub use layers::{DeviceContextExtension, DeviceContextLayer};

use std::fs::{self, File};

use thiserror::Error;
use tracing::Subscriber;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::layer::{Layer, SubscriberExt};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Registry};

/// Errors from setting up logging
#[derive(Debug, Error)]
pub enum LogError {
    #[error("Failed to open log output: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to create rolling log file: {0}")]
    Appender(#[from] tracing_appender::rolling::InitError),

    #[error("A global subscriber is already set")]
    AlreadyInitialized,
}

type BoxedLayer<S> = Box<dyn Layer<S> + Send + Sync>;

/// Builder for the process-wide tracing subscriber
pub struct MemolinkSubscriberBuilder {
    config: LogConfig,
}

impl MemolinkSubscriberBuilder {
    /// Default configuration: JSONL to the console at `info`
    pub fn new() -> Self {
        Self {
            config: LogConfig::default(),
        }
    }

    pub fn with_config(mut self, config: LogConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.config.default_level = level.into();
        self
    }

    pub fn with_console(mut self, enabled: bool) -> Self {
        self.config.console.enabled = enabled;
        self
    }

    pub fn with_file_output(mut self, config: FileConfig) -> Self {
        self.config.file = Some(config);
        self
    }

    pub fn config(&self) -> &LogConfig {
        &self.config
    }

    /// Install the subscriber globally
    ///
    /// The returned guard flushes file output when dropped; keep it alive
    /// for the life of the program.
    ///
    /// # Panics
    ///
    /// Panics if the log file cannot be opened or a global subscriber is
    /// already set. Use [`try_init`](Self::try_init) to handle those.
    pub fn init(self) -> Option<WorkerGuard> {
        match self.try_init() {
            Ok(guard) => guard,
            Err(e) => panic!("failed to initialize logging: {e}"),
        }
    }

    /// Install the subscriber globally, reporting failures
    pub fn try_init(self) -> Result<Option<WorkerGuard>, LogError> {
        let env_filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(&self.config.default_level));

        let (layers, guard) = self.build_layers::<Registry>()?;

        Registry::default()
            .with(layers)
            .with(env_filter)
            .try_init()
            .map_err(|_| LogError::AlreadyInitialized)?;

        Ok(guard)
    }

    fn build_layers<S>(&self) -> Result<(Vec<BoxedLayer<S>>, Option<WorkerGuard>), LogError>
    where
        S: Subscriber + for<'lookup> LookupSpan<'lookup>,
    {
        let mut stack: Vec<BoxedLayer<S>> = vec![Box::new(DeviceContextLayer::new())];

        if self.config.console.enabled {
            if self.config.console.pretty {
                stack.push(Box::new(
                    tracing_subscriber::fmt::layer()
                        .with_ansi(self.config.console.ansi)
                        .with_target(true),
                ));
            } else {
                stack.push(Box::new(layers::jsonl_layer(
                    std::io::stdout,
                    &self.config.jsonl,
                )));
            }
        }

        let mut guard = None;
        if let Some(file_config) = &self.config.file {
            let (writer, file_guard) = file_writer(file_config)?;
            stack.push(Box::new(layers::jsonl_layer(writer, &self.config.jsonl)));
            guard = Some(file_guard);
        }

        Ok((stack, guard))
    }
}

impl Default for MemolinkSubscriberBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Open the non-blocking writer for file output
///
/// `Never` truncates a single `<prefix>.jsonl`; the rotating strategies
/// append to dated files.
fn file_writer(config: &FileConfig) -> Result<(NonBlocking, WorkerGuard), LogError> {
    fs::create_dir_all(&config.directory)?;

    let rotation = match config.rotation {
        RotationStrategy::Never => {
            let file = File::create(config.directory.join(format!("{}.jsonl", config.prefix)))?;
            return Ok(tracing_appender::non_blocking(file));
        }
        RotationStrategy::Daily => Rotation::DAILY,
        RotationStrategy::Hourly => Rotation::HOURLY,
    };

    let mut builder = RollingFileAppender::builder()
        .rotation(rotation)
        .filename_prefix(config.prefix.as_str())
        .filename_suffix("jsonl");
    if let Some(max_files) = config.max_files {
        builder = builder.max_log_files(max_files);
    }
    let appender = builder.build(&config.directory)?;

    Ok(tracing_appender::non_blocking(appender))
}

/// Pretty console logging at `debug`
pub fn init_development() -> Option<WorkerGuard> {
    MemolinkSubscriberBuilder::new()
        .with_config(LogConfig::development())
        .init()
}

/// Warnings only; safe to call from many tests
pub fn init_testing() {
    let _ = MemolinkSubscriberBuilder::new()
        .with_config(LogConfig::testing())
        .try_init();
}
