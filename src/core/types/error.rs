use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("corpus does not exist: {}", .0.display())]
    CorpusNotFound(PathBuf),

    #[error("unknown duration format: {0:?} (expected a number followed by s, m, h or d)")]
    UnknownDurationUnit(String),

    #[error("unrecognized crash classification tag: {0}")]
    UnknownCrashTag(String),

    #[error("malformed record: {0}")]
    MalformedRecord(String),

    #[error("{tool} exited with status {code}")]
    ToolFailed { tool: String, code: i32 },

    #[error("process {command} did not terminate")]
    Unterminated { command: String },

    /// Output of a previous (possibly partial) run is already present.
    #[error("output already exists: {}", .0.display())]
    OutputExists(PathBuf),

    #[error("failed to build {binary}: {reason}")]
    Build { binary: String, reason: String },

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}

pub type AppResult<T> = Result<T, AppError>;
