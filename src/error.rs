use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StagehandError {
    #[error("run {0} is not covered by any configured dataset range")]
    UnmappedRun(u32),

    #[error("dataset {0} is not in the configured dataset table")]
    UnknownDataset(u32),

    #[error("missing input file: {}", .0.display())]
    MissingInput(PathBuf),

    #[error("pattern {pattern} matched {found} file(s), need at least 2")]
    EmptyResultSet { pattern: String, found: usize },

    #[error("command contains a newline and cannot be queued: {0:?}")]
    CommandNotQueueable(String),

    #[error("queue file {}: {source}", .path.display())]
    QueueIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read config {}: {source}", .path.display())]
    ConfigIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {}: {source}", .path.display())]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid target selection: {0}")]
    InvalidSelection(String),

    #[error("submit command failed ({status}): {command}")]
    SubmitFailed { command: String, status: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, StagehandError>;
