//! Error types for credential persistence

/// Errors from key-value backends and credential record handling.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("storage backend error: {0}")]
    Backend(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("serialization error: {0}")]
    Serialize(String),

    #[error("invalid credential record: {0}")]
    InvalidRecord(String),
}

/// Result alias for credential store operations.
pub type Result<T> = std::result::Result<T, Error>;
