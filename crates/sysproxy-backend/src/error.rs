use std::path::PathBuf;

use thiserror::Error;

use crate::types::StateError;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("Unsupported environment: {reason}")]
    UnsupportedEnvironment { reason: String },

    #[error("Command failed for {target}: {details}")]
    CommandFailed { target: String, details: String },

    #[error("Malformed value stored in {target}: {value:?}")]
    MalformedStoredValue { target: String, value: String },

    #[error(transparent)]
    InvalidState(#[from] StateError),

    #[error("IO error ({kind}): {message}")]
    IoError {
        kind: std::io::ErrorKind,
        message: String,
    },
}

impl BackendError {
    pub fn unsupported(reason: impl Into<String>) -> Self {
        Self::UnsupportedEnvironment {
            reason: reason.into(),
        }
    }

    pub fn command(target: impl Into<String>, details: impl Into<String>) -> Self {
        Self::CommandFailed {
            target: target.into(),
            details: details.into(),
        }
    }

    pub fn malformed(target: impl Into<String>, value: impl Into<String>) -> Self {
        Self::MalformedStoredValue {
            target: target.into(),
            value: value.into(),
        }
    }
}

impl From<std::io::Error> for BackendError {
    fn from(err: std::io::Error) -> Self {
        BackendError::IoError {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

/// A failure confined to one sink; other sinks still get projected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SinkError {
    #[error("Cannot write {}: {details}", path.display())]
    FileSinkUnavailable { path: PathBuf, details: String },

    #[error("{sink} update failed: {details}")]
    CommandFailed { sink: &'static str, details: String },
}

impl SinkError {
    pub fn file(path: impl Into<PathBuf>, error: &std::io::Error) -> Self {
        Self::FileSinkUnavailable {
            path: path.into(),
            details: error.to_string(),
        }
    }
}
