//! Error types for checkpoint storage

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for checkpoint operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while reading or writing checkpoints
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error occurred
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Key cannot be used as a file name
    #[error("Invalid checkpoint key {key:?}: {reason}")]
    InvalidKey { key: String, reason: &'static str },

    /// Storage directory missing or not a directory
    #[error("Invalid storage directory: {path}")]
    InvalidDirectory { path: PathBuf },

    /// Stored value is not valid UTF-8
    #[error("Corrupt checkpoint value under {key:?}")]
    CorruptValue { key: String },

    /// Write refused (scripted failure in tests, or a persist failure)
    #[error("Failed to write checkpoint {key:?}: {reason}")]
    WriteFailed { key: String, reason: String },
}

impl Error {
    /// Create an invalid key error
    pub fn invalid_key(key: &str, reason: &'static str) -> Self {
        Error::InvalidKey {
            key: key.to_string(),
            reason,
        }
    }

    /// Create a write failed error
    pub fn write_failed<S: Into<String>>(key: &str, reason: S) -> Self {
        Error::WriteFailed {
            key: key.to_string(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::invalid_key("../etc", "contains a path separator");
        assert_eq!(
            err.to_string(),
            "Invalid checkpoint key \"../etc\": contains a path separator"
        );

        let err = Error::write_failed("k.cursor", "disk full");
        assert!(err.to_string().contains("disk full"));
    }
}
