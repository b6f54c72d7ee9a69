//! Error types for the staging crate.

/// Errors that can occur while loading or staging a document.
#[derive(Debug, thiserror::Error)]
pub enum StageError {
    /// The document could not be decoded.
    #[error("document error: {0}")]
    Document(String),

    /// I/O failure while reading a document.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience alias for staging results.
pub type StageResult<T> = Result<T, StageError>;
