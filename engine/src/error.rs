use thiserror::Error;

/// Failures surfaced by the record store.
///
/// Precondition violations (`NotInitialized` through `NotFound`) are returned
/// to the caller of the CRUD operation. `Storage` only escapes from explicit
/// transfers such as `export_snapshot`; persistence failures behind a CRUD call
/// are absorbed by the store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database not initialized")]
    NotInitialized,
    #[error("collection \"{0}\" does not exist")]
    UnknownCollection(String),
    #[error("record must have an id")]
    MissingId,
    #[error("record with id \"{0}\" already exists")]
    DuplicateId(String),
    #[error("record with id \"{0}\" not found")]
    NotFound(String),
    #[error("invalid database format: {0}")]
    InvalidFormat(String),
    #[error("storage error: {0}")]
    Storage(String),
}

impl StoreError {
    pub fn invalid_format(reason: impl Into<String>) -> Self {
        Self::InvalidFormat(reason.into())
    }
}

pub type Result<T, E = StoreError> = std::result::Result<T, E>;
