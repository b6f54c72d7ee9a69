//! Error types for the resolver crate.

/// Errors that abort resolution.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    /// Store operation failed.
    #[error("store error: {0}")]
    Store(#[from] lxm_store::StoreError),
}

/// Convenience alias for resolver results.
pub type ResolveResult<T> = Result<T, ResolveError>;
