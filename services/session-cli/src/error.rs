//! Command-line host errors
//!
//! Library failures travel as `anyhow` errors with context; these cover
//! the conditions the binary itself detects.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("usage: {0}")]
    Usage(String),

    #[error("no sign-in callback received within {0} seconds")]
    CallbackTimeout(u64),

    #[error("callback listener stopped before a sign-in arrived")]
    CallbackAborted,

    #[error("not signed in, run `tourism-session login <email>` first")]
    NotSignedIn,
}

/// Result alias using service Error
pub type Result<T> = std::result::Result<T, Error>;
