//! Error type for filesystem operations.

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::status::FileSystemStatusCode;

/// A failed filesystem step, carrying the status code it maps to.
#[derive(Debug, Error)]
#[error("{} at {}: {}", .code, .path.display(), .message)]
pub struct FsError {
    /// Status code reported for this failure.
    pub code: FileSystemStatusCode,
    /// The path that caused the error.
    pub path: PathBuf,
    /// A human-readable error message.
    pub message: String,
    #[source]
    pub source: Option<std::io::Error>,
}

/// Result alias used throughout the operation crates.
pub type FsResult<T> = Result<T, FsError>;

impl FsError {
    /// Create an error with an explicit code.
    pub fn new(
        code: FileSystemStatusCode,
        path: impl Into<PathBuf>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            code,
            path: path.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Create an I/O error with path context.
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self {
            code: FileSystemStatusCode::from_io_error(&source),
            path: path.as_ref().to_path_buf(),
            message: source.to_string(),
            source: Some(source),
        }
    }

    /// The operation was cancelled before this step ran.
    pub fn cancelled(path: impl Into<PathBuf>) -> Self {
        Self::new(FileSystemStatusCode::Generic, path, "Operation cancelled")
    }

    /// Shorthand for a `Generic` failure.
    pub fn generic(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::new(FileSystemStatusCode::Generic, path, message)
    }

    /// Check if this error carries the given code.
    pub fn is(&self, code: FileSystemStatusCode) -> bool {
        self.code == code
    }
}
