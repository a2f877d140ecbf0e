use thiserror::Error;

use cairn_storage::StorageError;

pub type Result<T> = std::result::Result<T, CairnError>;

#[derive(Debug, Error)]
pub enum CairnError {
    /// An index or data key does not match the naming grammar. This means
    /// the index namespace is corrupted; a partially-parsed index cannot be
    /// trusted, so listings abort instead of degrading.
    #[error("malformed blob key: '{0}'")]
    MalformedKey(String),

    #[error("no such backup: '{0}'")]
    BackupNotFound(String),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("invalid manifest content: {0}")]
    Manifest(#[from] serde_json::Error),
}

impl CairnError {
    /// Whether the underlying cause is a storage authorization failure.
    /// Only the self-healing cleanup path treats this as recoverable.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, CairnError::Storage(StorageError::Unauthorized(_)))
    }
}
