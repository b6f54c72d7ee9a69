use lxm_index::IndexError;
use lxm_refs::ResolveError;
use lxm_residue::ResidueError;
use lxm_stage::StageError;
use lxm_store::StoreError;
use lxm_types::RecordId;

/// Errors that abort a merge run.
///
/// Everything else the run meets is recorded in the run summary.
#[derive(Debug, thiserror::Error)]
pub enum MergeError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("index error: {0}")]
    Index(#[from] IndexError),

    #[error("staging error: {0}")]
    Stage(#[from] StageError),

    #[error("residue error: {0}")]
    Residue(#[from] ResidueError),

    #[error("resolution error: {0}")]
    Resolve(#[from] ResolveError),

    /// The document breaks its own well-formedness rules.
    #[error("structural error on {record} field '{field}': {message}")]
    Structural {
        record: RecordId,
        field: String,
        message: String,
    },

    /// Configuration is invalid.
    #[error("configuration error: {0}")]
    Config(String),
}

impl MergeError {
    pub fn structural(
        record: RecordId,
        field: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Structural {
            record,
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Convenience alias for merge results.
pub type MergeResult<T> = Result<T, MergeError>;
