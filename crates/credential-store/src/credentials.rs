//! Credential record storage
//!
//! Maps the session record (access token, refresh token, cached user) onto a
//! `KeyValueStore`. This is the single source of truth across restarts; the
//! in-memory session state is only ever a cache of it.
//!
//! Reads never fail: missing keys, a half-present token pair, an unreadable
//! backend or an unparsable user blob all degrade to "absent".

use std::sync::Arc;

use common::Secret;
use tracing::{debug, warn};

use crate::backend::KeyValueStore;
use crate::error::{Error, Result};
use crate::keys::{
    ACCESS_TOKEN_KEY, PROFILE_INCOMPLETE_KEY, REFRESH_TOKEN_KEY, SESSION_KEYS, USER_KEY,
};
use crate::profile::{TokenPair, UserProfile};

/// A credential record as read back from storage.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredSession {
    pub tokens: TokenPair,
    pub user: Option<UserProfile>,
    /// Sign-in stopped at profile completion
    pub profile_incomplete: bool,
}

/// Credential record accessor over a shared backend.
#[derive(Clone)]
pub struct CredentialStore {
    backend: Arc<dyn KeyValueStore>,
}

impl CredentialStore {
    pub fn new(backend: Arc<dyn KeyValueStore>) -> Self {
        Self { backend }
    }

    /// The underlying backend, shared with preference storage.
    pub fn backend(&self) -> &Arc<dyn KeyValueStore> {
        &self.backend
    }

    /// Persist a full record for a fresh sign-in.
    ///
    /// Both tokens land in one `set_many`. Leftovers of the previous record
    /// (the incomplete-profile marker, and the user key when no user is
    /// given) are removed first, so every intermediate state still satisfies
    /// "user only alongside both tokens".
    pub async fn write(&self, tokens: &TokenPair, user: Option<&UserProfile>) -> Result<()> {
        if !tokens.is_complete() {
            return Err(Error::InvalidRecord(
                "access and refresh token must both be non-empty".into(),
            ));
        }

        let mut entries = token_entries(tokens);
        let stale: &[&str] = match user {
            Some(user) => {
                let json = serde_json::to_string(user)
                    .map_err(|e| Error::Serialize(format!("serializing user profile: {e}")))?;
                entries.push((USER_KEY.to_string(), json));
                &[PROFILE_INCOMPLETE_KEY]
            }
            None => &[PROFILE_INCOMPLETE_KEY, USER_KEY],
        };

        self.backend.remove_many(stale).await?;
        self.backend.set_many(entries).await?;
        debug!(backend = self.backend.id(), has_user = user.is_some(), "credential record written");
        Ok(())
    }

    /// Overwrite both tokens after a refresh, keeping the cached user.
    pub async fn replace_tokens(&self, tokens: &TokenPair) -> Result<()> {
        if !tokens.is_complete() {
            return Err(Error::InvalidRecord(
                "refreshed token pair is incomplete".into(),
            ));
        }
        self.backend.set_many(token_entries(tokens)).await?;
        debug!(backend = self.backend.id(), "tokens replaced");
        Ok(())
    }

    /// Replace only the cached user. Ignored when no token pair is stored.
    pub async fn update_user(&self, user: &UserProfile) -> Result<()> {
        if self.read().await.is_none() {
            debug!("no credential record, not caching user");
            return Ok(());
        }
        let json = serde_json::to_string(user)
            .map_err(|e| Error::Serialize(format!("serializing user profile: {e}")))?;
        self.backend
            .set_many(vec![(USER_KEY.to_string(), json)])
            .await
    }

    /// Set or clear the incomplete-profile marker. Setting it is ignored when
    /// no token pair is stored.
    pub async fn set_profile_incomplete(&self, incomplete: bool) -> Result<()> {
        if !incomplete {
            return self.backend.remove_many(&[PROFILE_INCOMPLETE_KEY]).await;
        }
        if self.read().await.is_none() {
            debug!("no credential record, not marking profile incomplete");
            return Ok(());
        }
        self.backend
            .set_many(vec![(PROFILE_INCOMPLETE_KEY.to_string(), "true".to_string())])
            .await
    }

    /// Read the record. `None` unless both tokens are present and non-empty.
    ///
    /// Every record key comes from one `get_many`, so a concurrent token swap
    /// is seen either entirely or not at all.
    pub async fn read(&self) -> Option<StoredSession> {
        let values = match self.backend.get_many(&SESSION_KEYS).await {
            Ok(values) => values,
            Err(e) => {
                warn!(backend = self.backend.id(), error = %e, "credential read failed, treating as absent");
                return None;
            }
        };
        let mut values = values.into_iter();
        let mut next = || values.next().flatten();
        let access = next().filter(|v| !v.trim().is_empty());
        let refresh = next().filter(|v| !v.trim().is_empty());
        let user_blob = next();
        let profile_incomplete = next().is_some_and(|v| v == "true");

        let tokens = match (access, refresh) {
            (Some(access), Some(refresh)) => TokenPair {
                access_token: Secret::new(access),
                refresh_token: Secret::new(refresh),
            },
            (None, None) => return None,
            (access, refresh) => {
                warn!(
                    has_access = access.is_some(),
                    has_refresh = refresh.is_some(),
                    "credential store holds a partial token pair, treating as absent"
                );
                return None;
            }
        };

        let user = match user_blob {
            Some(raw) => match serde_json::from_str::<Option<UserProfile>>(&raw) {
                Ok(user) => user,
                Err(e) => {
                    warn!(error = %e, "cached user profile is malformed, ignoring it");
                    None
                }
            },
            None => None,
        };

        Some(StoredSession {
            tokens,
            user,
            profile_incomplete,
        })
    }

    pub async fn access_token(&self) -> Option<Secret<String>> {
        self.read().await.map(|s| s.tokens.access_token.clone())
    }

    pub async fn refresh_token(&self) -> Option<Secret<String>> {
        self.read().await.map(|s| s.tokens.refresh_token.clone())
    }

    /// Remove every record key in one batch.
    pub async fn clear(&self) -> Result<()> {
        self.backend.remove_many(&SESSION_KEYS).await?;
        debug!(backend = self.backend.id(), "credential record cleared");
        Ok(())
    }
}

fn token_entries(tokens: &TokenPair) -> Vec<(String, String)> {
    vec![
        (
            ACCESS_TOKEN_KEY.to_string(),
            tokens.access_token.expose().clone(),
        ),
        (
            REFRESH_TOKEN_KEY.to_string(),
            tokens.refresh_token.expose().clone(),
        ),
    ]
}
