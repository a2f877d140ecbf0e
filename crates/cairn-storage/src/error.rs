use thiserror::Error;

pub type Result<T> = std::result::Result<T, StorageError>;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage I/O error: {0}")]
    Backend(#[source] Box<opendal::Error>),

    #[error("not authorized: {0}")]
    Unauthorized(String),

    #[error("no such blob: '{0}'")]
    NotFound(String),

    #[error("unsupported storage provider: '{0}'")]
    UnsupportedProvider(String),

    #[error("storage configuration error: {0}")]
    Config(String),

    #[error("blob '{0}' is not valid UTF-8")]
    NotText(String),
}

impl From<opendal::Error> for StorageError {
    fn from(value: opendal::Error) -> Self {
        match value.kind() {
            opendal::ErrorKind::PermissionDenied => StorageError::Unauthorized(value.to_string()),
            opendal::ErrorKind::NotFound => StorageError::NotFound(value.to_string()),
            _ => StorageError::Backend(Box::new(value)),
        }
    }
}

impl StorageError {
    /// Whether this error is transient and worth retrying during backend
    /// construction. Configuration mistakes and permission problems never
    /// resolve on their own.
    pub fn is_transient(&self) -> bool {
        match self {
            StorageError::Backend(e) => {
                e.is_temporary()
                    || matches!(
                        e.kind(),
                        opendal::ErrorKind::Unexpected | opendal::ErrorKind::RateLimited
                    )
            }
            StorageError::Unauthorized(_)
            | StorageError::NotFound(_)
            | StorageError::UnsupportedProvider(_)
            | StorageError::Config(_)
            | StorageError::NotText(_) => false,
        }
    }
}
