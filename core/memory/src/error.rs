use thiserror::Error;

/// Errors surfaced by the memory store
#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("memory database error: {0}")]
    Database(#[source] rusqlite::Error),

    #[error("failed to encode or decode stored blob: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("unknown campaign status '{0}'")]
    UnknownStatus(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, MemoryError>;

impl From<rusqlite::Error> for MemoryError {
    /// Row mappers smuggle blob and enum failures through
    /// `FromSqlConversionFailure`; unwrap them back into their own variants.
    fn from(err: rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::FromSqlConversionFailure(idx, ty, inner) => {
                let inner = match inner.downcast::<MemoryError>() {
                    Ok(own) => return *own,
                    Err(inner) => inner,
                };
                match inner.downcast::<serde_json::Error>() {
                    Ok(json) => MemoryError::Serialization(*json),
                    Err(inner) => MemoryError::Database(
                        rusqlite::Error::FromSqlConversionFailure(idx, ty, inner),
                    ),
                }
            }
            other => MemoryError::Database(other),
        }
    }
}
