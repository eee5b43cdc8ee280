//! Task configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, TaskError};

/// Environment variable selecting the default sink
pub const LOG_ENV: &str = "TASKTRACE_LOG";

/// Default display limit for purposes
pub const PURPOSE_LIMIT: usize = 160;

/// Default display limit for return values
pub const RETURN_LIMIT: usize = 80;

/// Configuration shared by a task and its children
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskConfig {
    /// Maximum rendered purpose length
    pub purpose_limit: usize,

    /// Maximum rendered return value length
    pub return_limit: usize,

    /// Where rendered lines go
    pub sink: SinkConfig,

    /// Operand dumps on failure
    pub dump: DumpConfig,
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self {
            purpose_limit: PURPOSE_LIMIT,
            return_limit: RETURN_LIMIT,
            sink: SinkConfig::Disabled,
            dump: DumpConfig::default(),
        }
    }
}

impl TaskConfig {
    /// Load configuration from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        serde_json::from_str(&json).map_err(|e| TaskError::Config(e.to_string()))
    }

    /// Defaults, with the sink taken from `TASKTRACE_LOG` when set
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        if let Ok(value) = std::env::var(LOG_ENV) {
            config.sink = value.parse()?;
        }
        Ok(config)
    }
}

/// Configured sink shape
///
/// Writer and callback sinks are built in code with
/// [`LogSink::writer`](crate::LogSink::writer) and
/// [`LogSink::callback`](crate::LogSink::callback).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SinkConfig {
    /// No output
    #[default]
    Disabled,
    /// Standard output
    Stdout,
    /// Standard error
    Stderr,
    /// Forward to `tracing`
    Tracing,
    /// Write to a file
    File {
        /// File path
        path: PathBuf,
        /// Append instead of truncating
        #[serde(default)]
        append: bool,
    },
}

impl std::str::FromStr for SinkConfig {
    type Err = TaskError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "" | "disabled" | "off" | "false" => Ok(SinkConfig::Disabled),
            "stdout" | "true" => Ok(SinkConfig::Stdout),
            "stderr" => Ok(SinkConfig::Stderr),
            "tracing" => Ok(SinkConfig::Tracing),
            other => match other.strip_prefix("file:") {
                Some(path) if !path.is_empty() => Ok(SinkConfig::File {
                    path: PathBuf::from(path),
                    append: true,
                }),
                _ => Err(TaskError::Config(format!(
                    "log sink should be disabled, stdout, stderr, tracing or file:<path>, got {other:?}"
                ))),
            },
        }
    }
}

/// Where operand dumps are written when a task fails
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DumpConfig {
    /// Write dumps at all
    pub enabled: bool,

    /// Target directory
    pub dir: PathBuf,
}

impl Default for DumpConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: PathBuf::from("."),
        }
    }
}
