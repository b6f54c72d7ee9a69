use lxm_types::{Guid, RecordId};

use crate::record::RecordKind;

/// Errors from repository operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The requested record does not exist.
    #[error("record not found: {0}")]
    NotFound(RecordId),

    /// The record exists but is of a different kind.
    #[error("record {id} is a {actual}, expected {expected}")]
    WrongKind {
        id: RecordId,
        expected: RecordKind,
        actual: RecordKind,
    },

    /// A record with this guid already exists.
    #[error("duplicate guid: {0}")]
    DuplicateGuid(Guid),

    /// Unknown custom field.
    #[error("custom field not found: {0}")]
    FieldNotFound(u32),

    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Result alias for repository operations.
pub type StoreResult<T> = Result<T, StoreError>;
