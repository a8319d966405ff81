use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    /// The value was rejected by its field validator. Nothing was mutated.
    #[error("Validation failed for field '{field}': {value:?}")]
    ValidationFailed { field: String, value: String },

    /// The field kind is not registered. This is an integration bug.
    #[error("Unknown field kind: {0}")]
    UnknownFieldKind(String),

    /// Reading or writing the backing file failed. In-memory state is kept
    /// and stays dirty, so a later flush retries.
    #[error("Persistence I/O failure on '{}': {source}", path.display())]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// `begin_batch` (or `load`) was called while a batch is open.
    #[error("A batch is already active")]
    BatchAlreadyActive,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Lock error: {0}")]
    LockError(String),
}

impl StoreError {
    pub(crate) fn persistence(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Persistence {
            path: path.into(),
            source,
        }
    }

    /// Errors that indicate a caller bug rather than bad data or a bad disk.
    pub fn is_programming_error(&self) -> bool {
        matches!(self, Self::UnknownFieldKind(_) | Self::BatchAlreadyActive)
    }

    /// Errors after which the caller can keep operating on the in-memory state.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::ValidationFailed { .. } | Self::Persistence { .. } | Self::Serialization(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;

impl<T> From<std::sync::PoisonError<T>> for StoreError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        Self::LockError(err.to_string())
    }
}
