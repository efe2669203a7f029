use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Errors surfaced by the overlay and segmentation core.
///
/// Every stage reports to its immediate caller; nothing here retries.
#[derive(Error, Debug)]
pub enum DermaError {
    /// Template image, checkpoint or font file does not exist
    #[error("missing resource: {0}")]
    MissingResource(PathBuf),

    /// Checkpoint does not fit the requested architecture
    #[error("incompatible weights in {path}: {reason}")]
    IncompatibleWeights { path: PathBuf, reason: String },

    /// Photograph or template bytes could not be decoded
    #[error("failed to decode image: {0}")]
    DecodeError(String),

    /// Forward pass or output interpretation failed
    #[error("inference failed: {0}")]
    InferenceError(String),

    /// Composite could not be written
    #[error("failed to write {path}: {reason}")]
    WriteError { path: PathBuf, reason: String },

    #[error("inference did not finish within {0:?}")]
    InferenceTimeout(Duration),

    #[error("analysis cancelled")]
    Cancelled,

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, DermaError>;

impl DermaError {
    pub(crate) fn inference(err: impl std::fmt::Display) -> Self {
        DermaError::InferenceError(err.to_string())
    }

    pub(crate) fn write(path: impl Into<PathBuf>, err: impl std::fmt::Display) -> Self {
        DermaError::WriteError {
            path: path.into(),
            reason: err.to_string(),
        }
    }

    pub(crate) fn incompatible(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        DermaError::IncompatibleWeights {
            path: path.into(),
            reason: reason.into(),
        }
    }
}
