//! Unified error types for the fsbridge core crate.
//!
//! Every backend and action reports failures through [`StorageError`]. The
//! variants follow the storage error taxonomy (validation, not-found,
//! permission, connection, integrity, invariant) so callers can match on
//! [`StorageError::kind()`] instead of parsing messages. Consumers such as
//! the agent map these onto their own transport error codes.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Top-level error type encompassing all core error categories.
#[derive(Error, Debug)]
pub enum CoreError {
    /// A storage operation failed.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// A configuration error (invalid values, missing fields, parse failures).
    #[error("Config error: {0}")]
    Config(String),

    /// A low-level I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised by path resolution, backends and actions.
#[derive(Error, Debug)]
pub enum StorageError {
    /// A required option is missing or an option value is malformed.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The requested action name is not one of the supported actions.
    #[error("Unknown action: {0}")]
    UnknownAction(String),

    /// The path does not exist but the action requires it to.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The backend, the connection's read-only flag, or root protection
    /// refused the operation.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Connecting, authenticating or changing directory on a remote backend
    /// failed.
    #[error("Connection failed: {0}")]
    Connection(String),

    /// State re-read after a mutating call does not match what was requested.
    #[error("Integrity check failed: {0}")]
    Integrity(String),

    /// An existing path is neither a directory, a file nor a link.
    #[error("Invariant violated: {0}")]
    Invariant(String),

    /// Generic filesystem failure reported by a backend.
    #[error("Operation failed: {0}")]
    OperationFailed(String),

    /// The backend or capability is declared but not implemented.
    #[error("Not supported: {0}")]
    NotSupported(String),

    /// A low-level I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Flat classification of a [`StorageError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    NotFound,
    Permission,
    Connection,
    Integrity,
    Invariant,
    Filesystem,
    NotSupported,
}

impl StorageError {
    /// Classify this error into its taxonomy category.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidArgument(_) | Self::UnknownAction(_) => ErrorKind::Validation,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::PermissionDenied(_) => ErrorKind::Permission,
            Self::Connection(_) => ErrorKind::Connection,
            Self::Integrity(_) => ErrorKind::Integrity,
            Self::Invariant(_) => ErrorKind::Invariant,
            Self::OperationFailed(_) => ErrorKind::Filesystem,
            Self::NotSupported(_) => ErrorKind::NotSupported,
            Self::Io(e) => match e.kind() {
                std::io::ErrorKind::NotFound => ErrorKind::NotFound,
                std::io::ErrorKind::PermissionDenied => ErrorKind::Permission,
                _ => ErrorKind::Filesystem,
            },
        }
    }

    /// Map an I/O error for `path` onto the matching variant.
    pub fn from_io(err: std::io::Error, path: &str) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound(path.to_string()),
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied(path.to_string()),
            _ => Self::OperationFailed(format!("{path}: {err}")),
        }
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, StorageError>;
