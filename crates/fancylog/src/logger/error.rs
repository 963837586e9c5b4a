use std::{io, path::PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoggerError {
    #[error("Invalid log format: {0} (expected: text|json)")]
    InvalidFormat(String),

    #[error("Invalid log level: {0} (expected: trace|debug|info|warning|error|critical)")]
    InvalidLevel(String),

    #[error("Invalid timezone: {0}")]
    InvalidTimeZone(String),

    #[error("Invalid filter directive: {0}")]
    InvalidFilter(String),

    #[error("Malformed logging configuration: {0}")]
    MalformedConfiguration(String),

    #[error("Filesystem error at {}: {source}", path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Attributes of {0} cannot be captured: value is not a struct or map")]
    NotAnObject(String),

    #[error("Failed to serialize attributes: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Logger already initialized by another subscriber")]
    AlreadyInitialized,

    #[error("Failed to swap logging sinks: {0}")]
    Reload(String),

    #[error("Failed to spawn process: {0}")]
    Spawn(#[source] io::Error),
}

impl LoggerError {
    pub(crate) fn filesystem(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Filesystem {
            path: path.into(),
            source,
        }
    }
}

pub type LoggerResult<T> = Result<T, LoggerError>;
