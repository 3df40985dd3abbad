//! Configuration types for device logging

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Logging configuration for one process
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Default level directive; `RUST_LOG` takes precedence when set
    pub default_level: String,

    pub console: ConsoleConfig,

    /// JSONL file output, disabled when `None`
    pub file: Option<FileConfig>,

    pub jsonl: JsonlConfig,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            default_level: "info".to_string(),
            console: ConsoleConfig::default(),
            file: None,
            jsonl: JsonlConfig::default(),
        }
    }
}

impl LogConfig {
    /// Verbose, human-readable console output
    pub fn development() -> Self {
        Self {
            default_level: "debug".to_string(),
            console: ConsoleConfig {
                enabled: true,
                pretty: true,
                ansi: true,
            },
            ..Default::default()
        }
    }

    /// JSONL files under `log_dir`, no console
    pub fn production(log_dir: impl Into<PathBuf>) -> Self {
        Self {
            default_level: "info".to_string(),
            console: ConsoleConfig {
                enabled: false,
                pretty: false,
                ansi: false,
            },
            file: Some(FileConfig {
                directory: log_dir.into(),
                ..FileConfig::default()
            }),
            jsonl: JsonlConfig::default(),
        }
    }

    /// Warnings only, plain console
    pub fn testing() -> Self {
        Self {
            default_level: "warn".to_string(),
            console: ConsoleConfig {
                enabled: true,
                pretty: true,
                ansi: false,
            },
            ..Default::default()
        }
    }
}

/// Console output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsoleConfig {
    pub enabled: bool,
    /// Human-readable lines instead of JSONL
    pub pretty: bool,
    pub ansi: bool,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            pretty: false,
            ansi: false,
        }
    }
}

/// File output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileConfig {
    pub directory: PathBuf,
    /// File name prefix; files are named `<prefix>.<date>.jsonl` when rotating
    pub prefix: String,
    pub rotation: RotationStrategy,
    /// Oldest rotated files beyond this count are removed
    pub max_files: Option<usize>,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("./logs"),
            prefix: "memolink".to_string(),
            rotation: RotationStrategy::Daily,
            max_files: Some(14),
        }
    }
}

/// File rotation strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum RotationStrategy {
    #[default]
    Daily,
    Hourly,
    /// A single file, truncated at startup
    Never,
}

/// JSONL formatting options, shared by console and file output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonlConfig {
    /// Put event fields at the top level of each line
    pub flatten_events: bool,
    pub include_spans: bool,
    pub include_location: bool,
    pub include_thread_info: bool,
}

impl Default for JsonlConfig {
    fn default() -> Self {
        Self {
            flatten_events: true,
            include_spans: true,
            include_location: true,
            include_thread_info: false,
        }
    }
}
