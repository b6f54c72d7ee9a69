//! Error types for the residue crate.

/// Errors that can occur while reading or writing residue.
#[derive(Debug, thiserror::Error)]
pub enum ResidueError {
    /// Stored residue is not well-formed markup.
    #[error("malformed residue: {0}")]
    Malformed(String),

    /// The record kind has no residue property.
    #[error("record {0} cannot hold residue")]
    NoResidueSlot(lxm_types::RecordId),

    /// Store operation failed.
    #[error("store error: {0}")]
    Store(#[from] lxm_store::StoreError),
}

/// Convenience alias for residue results.
pub type ResidueResult<T> = Result<T, ResidueError>;
