//! Error types for API calls

/// Errors from dispatching API requests.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("request failed with status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("invalid response body: {0}")]
    Decode(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("not authenticated")]
    NotAuthenticated,

    #[error("session error: {0}")]
    Session(#[from] session::Error),
}

/// Result alias for API operations.
pub type Result<T> = std::result::Result<T, ApiError>;

/// Coarse failure class used to pick a recovery strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// 401: recoverable through the refresh protocol
    Authentication,
    /// No response at all; never retried by the session layer
    Network,
    /// Any other HTTP error status
    Http,
    /// Local problem (bad request, undecodable body, storage)
    Local,
}

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            ApiError::Status { status: 401, .. } => FailureKind::Authentication,
            ApiError::Status { .. } => FailureKind::Http,
            ApiError::Transport(_) => FailureKind::Network,
            ApiError::Decode(_)
            | ApiError::InvalidRequest(_)
            | ApiError::NotAuthenticated
            | ApiError::Session(_) => FailureKind::Local,
        }
    }

    pub fn is_auth_failure(&self) -> bool {
        self.kind() == FailureKind::Authentication
    }

    /// Text suitable for inline display. Server messages pass through;
    /// everything else becomes a generic sentence.
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Status { message, .. } if !message.is_empty() => message.clone(),
            ApiError::Status { status, .. } => format!("Request failed (status {status})"),
            ApiError::Transport(_) => "Network error, please try again.".to_string(),
            ApiError::NotAuthenticated => "Please sign in to continue.".to_string(),
            _ => "Something went wrong, please try again.".to_string(),
        }
    }
}
