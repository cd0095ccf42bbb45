//! Error types for session transitions

/// Errors from session state transitions.
///
/// Only write-through failures surface here; missing or corrupt stored data
/// is handled as a state transition, not an error.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("credential store error: {0}")]
    Store(#[from] credential_store::Error),
}

/// Result alias for session operations.
pub type Result<T> = std::result::Result<T, Error>;
