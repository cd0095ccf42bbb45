//! Observable session snapshot

use common::Secret;
use credential_store::{TokenPair, UserProfile};

use crate::phase::AuthPhase;

/// Projection of the credential record published to the rest of the
/// application.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionState {
    pub phase: AuthPhase,
    pub user: Option<UserProfile>,
    pub tokens: Option<TokenPair>,
    pub is_loading: bool,
    pub last_error: Option<String>,
}

impl SessionState {
    /// True iff both tokens are present.
    pub fn is_authenticated(&self) -> bool {
        self.tokens.as_ref().is_some_and(TokenPair::is_complete)
    }

    pub fn access_token(&self) -> Option<&Secret<String>> {
        self.tokens.as_ref().map(|t| &t.access_token)
    }

    pub fn refresh_token(&self) -> Option<&Secret<String>> {
        self.tokens.as_ref().map(|t| &t.refresh_token)
    }

    pub fn needs_profile_completion(&self) -> bool {
        self.phase == AuthPhase::AuthenticatedIncomplete
    }
}
