//! Error types for container operations.

use thiserror::Error;

/// Container operation error.
#[derive(Debug, Error)]
pub enum ExrError {
    /// File I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid or corrupted file.
    #[error("decode error: {0}")]
    Decode(String),

    /// Encoding error.
    #[error("encode error: {0}")]
    Encode(String),
}

/// Result type for container operations.
pub type ExrResult<T> = Result<T, ExrError>;
