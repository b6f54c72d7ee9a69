//! Error types for the index crate.

/// Errors that can occur while building or querying lookup tables.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    /// Store operation failed.
    #[error("store error: {0}")]
    Store(#[from] lxm_store::StoreError),

    /// A feature-structure expression could not be parsed.
    #[error("invalid feature structure: {0}")]
    InvalidFeatureStructure(String),

    /// A feature name did not match any feature definition.
    #[error("unknown feature: {0}")]
    UnknownFeature(String),
}

/// Convenience alias for index results.
pub type IndexResult<T> = Result<T, IndexError>;
