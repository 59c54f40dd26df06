//! Error types for the income core crate

use thiserror::Error;

use crate::serde_canon::CanonicalError;

/// Errors raised while validating, persisting or restoring model artifacts
#[derive(Error, Debug)]
pub enum CoreError {
    /// Model validation failed
    #[error("Model validation failed: {0}")]
    ValidationFailed(String),

    /// The classifier and encoder set on disk were not produced together
    #[error("Incompatible artifacts: {0}")]
    IncompatibleArtifacts(String),

    /// Invalid model parameters
    #[error("Invalid model parameters: {0}")]
    InvalidParameters(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Canonical serialization error
    #[error("Canonical serialization error: {0}")]
    Canonical(#[from] CanonicalError),

    /// Atomic replace of an artifact file failed
    #[error("Failed to persist {path}: {source}")]
    Persist {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Result type for income core operations
pub type Result<T> = std::result::Result<T, CoreError>;
