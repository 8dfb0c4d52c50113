//! Error types for broker operations.

use std::path::PathBuf;

use thiserror::Error;

/// Broker error type covering all failure modes surfaced to callers.
///
/// User cancellation of the external picker is not represented here; it
/// resolves successfully with an absent value.
#[derive(Debug, Error)]
pub enum BrokerError {
    /// The host platform capability level is below the minimum for this operation.
    #[error("platform capability too low: requires API level {required}, host reports {actual}")]
    MinimumTarget {
        /// Minimum API level required by the operation.
        required: u32,
        /// API level reported by the attached host.
        actual: u32,
    },

    /// A required host context was missing or an invariant was violated.
    #[error("internal error: {0}")]
    Internal(String),

    /// Another picker operation is already in flight; retry after it resolves.
    #[error("another picker operation is already active")]
    AlreadyActive,

    /// The save source path does not exist.
    #[error("file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// The picked file's extension is not in the allow-list.
    #[error("file extension not allowed: {extension}")]
    InvalidFileExtension {
        /// The rejected extension.
        extension: String,
    },

    /// Copying the picked document into the local cache failed.
    #[error("failed to copy picked file: {message}")]
    FileCopyFailed {
        /// Underlying transfer failure.
        message: String,
    },

    /// Streaming the save source to the destination failed.
    #[error("failed to save file: {message}")]
    SaveFileFailed {
        /// Underlying transfer failure.
        message: String,
    },

    /// The provider refused access to the save destination.
    #[error("security error while saving file: {message}")]
    SecurityException {
        /// Underlying provider failure.
        message: String,
    },
}

impl BrokerError {
    /// Convenience constructor for [`BrokerError::Internal`].
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Stable machine-readable code for the call/callback boundary.
    pub fn code(&self) -> &'static str {
        match self {
            Self::MinimumTarget { .. } => "minimum_target",
            Self::Internal(_) => "internal_error",
            Self::AlreadyActive => "already_active",
            Self::FileNotFound(_) => "file_not_found",
            Self::InvalidFileExtension { .. } => "invalid_file_extension",
            Self::FileCopyFailed { .. } => "file_copy_failed",
            Self::SaveFileFailed { .. } => "save_file_failed",
            Self::SecurityException { .. } => "security_exception",
        }
    }
}

/// Result type alias for broker operations.
pub type Result<T> = std::result::Result<T, BrokerError>;
