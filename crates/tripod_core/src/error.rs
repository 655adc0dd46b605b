use std::io;

use thiserror::Error;

pub type TripodResult<T> = Result<T, TripodError>;

/// Every failure tripod can surface to the command line.
#[derive(Debug, Error)]
pub enum TripodError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("validation error: {0}")]
    Validation(String),
    #[error("{kind} '{name}' not found")]
    NotFound { kind: &'static str, name: String },
    #[error("{operation} failed: {message}")]
    Platform { operation: String, message: String },
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },
    #[error("`{command}` failed: {message}")]
    Process { command: String, message: String },
}

impl TripodError {
    pub fn not_found(kind: &'static str, name: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            name: name.into(),
        }
    }

    pub fn platform(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Platform {
            operation: operation.into(),
            message: message.into(),
        }
    }

    pub fn io(context: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Process exit status for this error. Input problems share clap's usage
    /// code so scripts can tell a bad manifest from a failed deployment.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Configuration(_) | Self::Validation(_) => 2,
            Self::NotFound { .. }
            | Self::Platform { .. }
            | Self::Io { .. }
            | Self::Process { .. } => 1,
        }
    }
}
