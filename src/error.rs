/*!
 * Error types for Ferry
 */

use std::fmt;
use std::io;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, FerryError>;

/// Exit code constants for structured process exit
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FATAL: i32 = 2;
pub const EXIT_TRANSPORT: i32 = 3;
pub const EXIT_CONFIG: i32 = 4;

#[derive(Error, Debug)]
pub enum FerryError {
    /// Fetch from the event source failed
    #[error("Source error: {message}")]
    Source { message: String, transient: bool },

    /// Delivery to the collector failed
    #[error("Sink error: {message}{}", .status.map(|s| format!(" (HTTP {s})")).unwrap_or_default())]
    Sink {
        message: String,
        status: Option<u16>,
        transient: bool,
    },

    /// Checkpoint could not be read or written
    #[error("Checkpoint error: {0}")]
    Checkpoint(#[from] ferry_core_checkpoint::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Event returned by the source is unusable
    #[error("Invalid event: {0}")]
    InvalidEvent(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON encode/decode error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl FerryError {
    /// Source failure that may succeed on retry
    pub fn source_transient(message: impl Into<String>) -> Self {
        FerryError::Source {
            message: message.into(),
            transient: true,
        }
    }

    /// Source failure that will not go away on retry
    pub fn source_permanent(message: impl Into<String>) -> Self {
        FerryError::Source {
            message: message.into(),
            transient: false,
        }
    }

    /// Sink failure, classified by HTTP status when one was received
    pub fn sink(message: impl Into<String>, status: Option<u16>) -> Self {
        let transient = match status {
            None => true,
            Some(code) => code == 408 || code == 429 || code >= 500,
        };
        FerryError::Sink {
            message: message.into(),
            status,
            transient,
        }
    }

    /// Get the process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            FerryError::Config(_) => EXIT_CONFIG,
            FerryError::Source { .. } | FerryError::Sink { .. } => EXIT_TRANSPORT,
            _ => EXIT_FATAL,
        }
    }

    /// Check if this error is transient (temporary, worth retrying)
    pub fn is_transient(&self) -> bool {
        match self {
            FerryError::Source { transient, .. } | FerryError::Sink { transient, .. } => {
                *transient
            }
            FerryError::Io(io_err) => Self::is_io_transient(io_err),
            // Never retried: a checkpoint we cannot write must stop delivery
            FerryError::Checkpoint(_) => false,
            _ => false,
        }
    }

    fn is_io_transient(io_err: &io::Error) -> bool {
        use io::ErrorKind::*;
        matches!(
            io_err.kind(),
            ConnectionRefused
                | ConnectionReset
                | ConnectionAborted
                | NotConnected
                | BrokenPipe
                | TimedOut
                | Interrupted
        )
    }

    /// Get error category for logging
    pub fn category(&self) -> ErrorCategory {
        match self {
            FerryError::Source { .. } | FerryError::Sink { .. } => ErrorCategory::Network,
            FerryError::Checkpoint(_) => ErrorCategory::Checkpoint,
            FerryError::Config(_) => ErrorCategory::Configuration,
            FerryError::InvalidEvent(_) | FerryError::Json(_) => ErrorCategory::Codec,
            FerryError::Io(_) => ErrorCategory::IoError,
        }
    }
}

/// Error category for classification and reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Source or collector unreachable, rejected the request, or timed out
    Network,
    /// Progress could not be persisted or loaded
    Checkpoint,
    /// Configuration errors
    Configuration,
    /// Malformed payloads
    Codec,
    /// Local I/O errors
    IoError,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCategory::Network => write!(f, "network"),
            ErrorCategory::Checkpoint => write!(f, "checkpoint"),
            ErrorCategory::Configuration => write!(f, "configuration"),
            ErrorCategory::Codec => write!(f, "codec"),
            ErrorCategory::IoError => write!(f, "io"),
        }
    }
}
