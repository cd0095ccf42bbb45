//! Session state container
//!
//! The one place session transitions happen. Token-changing transitions
//! write through to the credential store first and only publish the new
//! snapshot once the write succeeded, so state and store agree after every
//! transition. Clearing is the exception: memory is always cleared, even
//! when the store refuses, because a stale in-memory token is worse than a
//! stale file.
//!
//! A tokio Mutex serializes transitions so a store write and the matching
//! publish are never interleaved with another transition.

use common::Secret;
use credential_store::{CredentialStore, StoredSession, TokenPair, UserProfile};
use tokio::sync::{Mutex, watch};
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::phase::{AuthEvent, AuthPhase, handle_event};
use crate::state::SessionState;

/// Outcome of a transition tied to the refresh token that was spent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapOutcome {
    Applied,
    /// The session no longer holds the spent refresh token (logout or a new
    /// sign-in landed first); nothing was changed.
    Superseded,
}

/// Central session state, shared via `Arc` by every component that needs it.
pub struct SessionContainer {
    store: CredentialStore,
    state: watch::Sender<SessionState>,
    transitions: Mutex<()>,
}

impl SessionContainer {
    /// Create an unauthenticated container backed by `store`.
    ///
    /// Nothing is read from the store here; that is hydration's job.
    pub fn new(store: CredentialStore) -> Self {
        let (state, _) = watch::channel(SessionState::default());
        Self {
            store,
            state,
            transitions: Mutex::new(()),
        }
    }

    pub fn store(&self) -> &CredentialStore {
        &self.store
    }

    /// Clone of the current state.
    pub fn snapshot(&self) -> SessionState {
        self.state.borrow().clone()
    }

    /// Receiver that observes every published transition.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.borrow().is_authenticated()
    }

    pub fn access_token(&self) -> Option<Secret<String>> {
        self.state.borrow().access_token().cloned()
    }

    /// Establish a session from server-issued tokens.
    pub async fn set_auth(&self, user: Option<UserProfile>, tokens: TokenPair) -> Result<()> {
        let _guard = self.transitions.lock().await;
        self.store.write(&tokens, user.as_ref()).await?;
        self.publish(AuthEvent::Succeeded, |s| {
            s.user = user;
            s.tokens = Some(tokens);
            s.is_loading = false;
            s.last_error = None;
        });
        Ok(())
    }

    /// Adopt a record read back from the store at startup. No write: the
    /// record came from the store.
    ///
    /// Ignored once any sign-in or sign-out transition has run.
    pub async fn restore(&self, stored: StoredSession) {
        let _guard = self.transitions.lock().await;
        if self.state.borrow().phase != AuthPhase::Unauthenticated {
            debug!("session already moved on, not restoring stored record");
            return;
        }
        let incomplete = stored.profile_incomplete;
        self.publish(AuthEvent::Restored { incomplete }, |s| {
            s.user = stored.user;
            s.tokens = Some(stored.tokens);
        });
    }

    /// Swap in a pair refreshed with `spent`, keeping the cached user.
    ///
    /// Applies only while the session still holds `spent`.
    pub async fn replace_tokens(&self, spent: &Secret<String>, tokens: TokenPair) -> Result<SwapOutcome> {
        let _guard = self.transitions.lock().await;
        if !self.holds_refresh_token(spent) {
            debug!("session changed during refresh, dropping refreshed tokens");
            return Ok(SwapOutcome::Superseded);
        }
        self.store.replace_tokens(&tokens).await?;
        self.state.send_modify(|s| s.tokens = Some(tokens));
        debug!("session tokens replaced");
        Ok(SwapOutcome::Applied)
    }

    /// Explicit logout.
    pub async fn clear_auth(&self) -> Result<()> {
        self.terminate(AuthEvent::LoggedOut).await
    }

    /// Irrecoverable refresh failure. Same effect as logout.
    pub async fn expire(&self) -> Result<()> {
        self.terminate(AuthEvent::SessionExpired).await
    }

    /// Expire the session `spent` belongs to. A session that has since been
    /// replaced or ended is left alone.
    pub async fn expire_if_current(&self, spent: &Secret<String>) -> Result<SwapOutcome> {
        let _guard = self.transitions.lock().await;
        if !self.holds_refresh_token(spent) {
            debug!("session changed during refresh, not expiring");
            return Ok(SwapOutcome::Superseded);
        }
        self.clear_locked(AuthEvent::SessionExpired).await?;
        Ok(SwapOutcome::Applied)
    }

    /// Mark a login/registration/provider flow as in progress.
    pub async fn begin_authentication(&self) {
        let _guard = self.transitions.lock().await;
        self.publish(AuthEvent::Submit, |s| {
            s.is_loading = true;
            s.last_error = None;
        });
    }

    /// Record a failed authentication attempt.
    pub async fn fail_authentication(&self, message: impl Into<String>) {
        let message = message.into();
        let _guard = self.transitions.lock().await;
        self.publish(AuthEvent::Failed(message.clone()), |s| {
            s.is_loading = false;
            s.last_error = Some(message);
        });
    }

    /// Surface a message without changing authentication status.
    pub fn set_error(&self, message: impl Into<String>) {
        let message = message.into();
        self.state.send_modify(|s| s.last_error = Some(message));
    }

    pub fn clear_error(&self) {
        self.state.send_modify(|s| {
            s.last_error = None;
            s.phase = handle_event(std::mem::take(&mut s.phase), AuthEvent::ErrorDismissed);
        });
    }

    pub fn set_loading(&self, loading: bool) {
        self.state.send_if_modified(|s| {
            let changed = s.is_loading != loading;
            s.is_loading = loading;
            changed
        });
    }

    /// Identity provider flagged missing profile fields. Persisted so a
    /// restart lands back on profile completion.
    pub async fn mark_profile_incomplete(&self) -> Result<()> {
        let _guard = self.transitions.lock().await;
        self.store.set_profile_incomplete(true).await?;
        self.publish(AuthEvent::ProfileIncomplete, |_| {});
        Ok(())
    }

    /// Profile completion accepted; cache the returned user.
    pub async fn complete_profile(&self, user: UserProfile) -> Result<()> {
        let _guard = self.transitions.lock().await;
        self.store.update_user(&user).await?;
        self.store.set_profile_incomplete(false).await?;
        self.publish(AuthEvent::ProfileCompleted, |s| {
            s.user = Some(user);
            s.is_loading = false;
            s.last_error = None;
        });
        Ok(())
    }

    /// Refresh the cached user after a profile fetch.
    pub async fn update_user(&self, user: UserProfile) -> Result<()> {
        let _guard = self.transitions.lock().await;
        if !self.state.borrow().is_authenticated() {
            debug!("ignoring profile update without a session");
            return Ok(());
        }
        self.store.update_user(&user).await?;
        self.state.send_modify(|s| s.user = Some(user));
        Ok(())
    }

    async fn terminate(&self, event: AuthEvent) -> Result<()> {
        let _guard = self.transitions.lock().await;
        self.clear_locked(event).await
    }

    /// Caller holds `transitions`.
    async fn clear_locked(&self, event: AuthEvent) -> Result<()> {
        let cleared = self.store.clear().await;
        if let Err(ref e) = cleared {
            warn!(error = %e, "failed to clear credential store, clearing memory anyway");
        }
        let reason = if event == AuthEvent::SessionExpired {
            "expired"
        } else {
            "logout"
        };
        self.publish(event, |s| {
            s.user = None;
            s.tokens = None;
            s.is_loading = false;
            s.last_error = None;
        });
        info!(reason, "session cleared");
        cleared.map_err(Into::into)
    }

    fn holds_refresh_token(&self, spent: &Secret<String>) -> bool {
        self.state.borrow().refresh_token() == Some(spent)
    }

    fn publish(&self, event: AuthEvent, apply: impl FnOnce(&mut SessionState)) {
        self.state.send_modify(|s| {
            let from = s.phase.label();
            s.phase = handle_event(std::mem::take(&mut s.phase), event);
            apply(s);
            debug!(from, to = s.phase.label(), "session transition");
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use credential_store::{BoxFuture, KeyValueStore, MemoryStore};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn user(id: &str) -> UserProfile {
        serde_json::from_value(serde_json::json!({ "id": id, "role": "user" })).unwrap()
    }

    fn container() -> SessionContainer {
        SessionContainer::new(CredentialStore::new(Arc::new(MemoryStore::new())))
    }

    /// Memory store whose writes can be switched off.
    #[derive(Default)]
    struct FlakyStore {
        inner: MemoryStore,
        reject_writes: AtomicBool,
    }

    impl KeyValueStore for FlakyStore {
        fn id(&self) -> &str {
            "flaky"
        }

        fn get<'a>(
            &'a self,
            key: &'a str,
        ) -> BoxFuture<'a, credential_store::Result<Option<String>>> {
            self.inner.get(key)
        }

        fn get_many<'a>(
            &'a self,
            keys: &'a [&'a str],
        ) -> BoxFuture<'a, credential_store::Result<Vec<Option<String>>>> {
            self.inner.get_many(keys)
        }

        fn set_many<'a>(
            &'a self,
            entries: Vec<(String, String)>,
        ) -> BoxFuture<'a, credential_store::Result<()>> {
            if self.reject_writes.load(Ordering::SeqCst) {
                return Box::pin(async {
                    Err(credential_store::Error::Backend("read-only".into()))
                });
            }
            self.inner.set_many(entries)
        }

        fn remove_many<'a>(
            &'a self,
            keys: &'a [&'a str],
        ) -> BoxFuture<'a, credential_store::Result<()>> {
            if self.reject_writes.load(Ordering::SeqCst) {
                return Box::pin(async {
                    Err(credential_store::Error::Backend("read-only".into()))
                });
            }
            self.inner.remove_many(keys)
        }
    }

    async fn store_has_tokens(container: &SessionContainer) -> bool {
        container.store().read().await.is_some()
    }

    #[tokio::test]
    async fn set_auth_writes_through() {
        let container = container();
        container
            .set_auth(Some(user("u1")), TokenPair::new("at", "rt"))
            .await
            .unwrap();

        let state = container.snapshot();
        assert!(state.is_authenticated());
        assert_eq!(state.phase, AuthPhase::Authenticated);
        assert_eq!(state.user.unwrap().id, "u1");

        let stored = container.store().read().await.unwrap();
        assert_eq!(stored.tokens, TokenPair::new("at", "rt"));
    }

    #[tokio::test]
    async fn state_and_store_agree_across_transitions() {
        let container = container();
        let steps: Vec<Option<TokenPair>> = vec![
            Some(TokenPair::new("at1", "rt1")),
            None,
            None,
            Some(TokenPair::new("at2", "rt2")),
            Some(TokenPair::new("at3", "rt3")),
            None,
        ];

        for step in steps {
            match step {
                Some(tokens) => container.set_auth(None, tokens).await.unwrap(),
                None => container.clear_auth().await.unwrap(),
            }
            assert_eq!(
                container.is_authenticated(),
                store_has_tokens(&container).await,
                "state and store disagree"
            );
        }
    }

    #[tokio::test]
    async fn failed_write_leaves_state_untouched() {
        let backend = Arc::new(FlakyStore::default());
        let container = SessionContainer::new(CredentialStore::new(backend.clone()));
        backend.reject_writes.store(true, Ordering::SeqCst);

        let result = container.set_auth(None, TokenPair::new("at", "rt")).await;
        assert!(result.is_err());
        assert!(!container.is_authenticated());
        assert!(!store_has_tokens(&container).await);
    }

    #[tokio::test]
    async fn clear_wipes_memory_even_if_store_refuses() {
        let backend = Arc::new(FlakyStore::default());
        let container = SessionContainer::new(CredentialStore::new(backend.clone()));
        container
            .set_auth(Some(user("u1")), TokenPair::new("at", "rt"))
            .await
            .unwrap();

        backend.reject_writes.store(true, Ordering::SeqCst);
        assert!(container.clear_auth().await.is_err());

        let state = container.snapshot();
        assert!(!state.is_authenticated());
        assert!(state.user.is_none());
        assert_eq!(state.phase, AuthPhase::Unauthenticated);
    }

    #[tokio::test]
    async fn error_does_not_affect_authentication() {
        let container = container();
        container
            .set_auth(None, TokenPair::new("at", "rt"))
            .await
            .unwrap();

        container.set_error("could not load bookings");
        let state = container.snapshot();
        assert!(state.is_authenticated());
        assert_eq!(state.last_error.as_deref(), Some("could not load bookings"));

        container.clear_error();
        let state = container.snapshot();
        assert!(state.is_authenticated());
        assert!(state.last_error.is_none());
        assert_eq!(state.phase, AuthPhase::Authenticated);
    }

    #[tokio::test]
    async fn failed_login_sets_error_and_stops_loading() {
        let container = container();
        container.begin_authentication().await;
        let state = container.snapshot();
        assert!(state.is_loading);
        assert_eq!(state.phase, AuthPhase::Authenticating);

        container.fail_authentication("Invalid email or password").await;
        let state = container.snapshot();
        assert!(!state.is_loading);
        assert!(!state.is_authenticated());
        assert_eq!(state.last_error.as_deref(), Some("Invalid email or password"));
        assert!(matches!(state.phase, AuthPhase::Error { .. }));

        container.clear_error();
        assert_eq!(container.snapshot().phase, AuthPhase::Unauthenticated);
    }

    #[tokio::test]
    async fn profile_completion_flow() {
        let container = container();
        container.begin_authentication().await;
        container
            .set_auth(Some(user("u1")), TokenPair::new("at", "rt"))
            .await
            .unwrap();
        container.mark_profile_incomplete().await.unwrap();
        assert!(container.snapshot().needs_profile_completion());
        assert!(container.store().read().await.unwrap().profile_incomplete);

        let mut completed = user("u1");
        completed.phone = Some("+84 900 000 000".into());
        container.complete_profile(completed).await.unwrap();

        let state = container.snapshot();
        assert_eq!(state.phase, AuthPhase::Authenticated);
        assert_eq!(state.user.unwrap().phone.as_deref(), Some("+84 900 000 000"));
        let stored = container.store().read().await.unwrap();
        assert!(!stored.profile_incomplete);
        assert_eq!(stored.user.unwrap().phone.as_deref(), Some("+84 900 000 000"));
    }

    #[tokio::test]
    async fn replace_tokens_keeps_user_and_phase() {
        let container = container();
        container
            .set_auth(Some(user("u1")), TokenPair::new("at1", "rt1"))
            .await
            .unwrap();
        let outcome = container
            .replace_tokens(&Secret::from("rt1"), TokenPair::new("at2", "rt2"))
            .await
            .unwrap();
        assert_eq!(outcome, SwapOutcome::Applied);

        let state = container.snapshot();
        assert_eq!(state.access_token().unwrap().expose(), "at2");
        assert_eq!(state.user.unwrap().id, "u1");
        assert_eq!(state.phase, AuthPhase::Authenticated);
        assert_eq!(
            container.store().access_token().await.unwrap().expose(),
            "at2"
        );
    }

    #[tokio::test]
    async fn refreshed_pair_is_dropped_after_logout() {
        let container = container();
        container
            .set_auth(Some(user("u1")), TokenPair::new("at1", "rt1"))
            .await
            .unwrap();
        container.clear_auth().await.unwrap();

        let outcome = container
            .replace_tokens(&Secret::from("rt1"), TokenPair::new("at2", "rt2"))
            .await
            .unwrap();
        assert_eq!(outcome, SwapOutcome::Superseded);
        assert!(!container.is_authenticated());
        assert!(!store_has_tokens(&container).await);
    }

    #[tokio::test]
    async fn refreshed_pair_does_not_replace_another_sign_in() {
        let container = container();
        container
            .set_auth(Some(user("u1")), TokenPair::new("at1", "rt1"))
            .await
            .unwrap();
        container
            .set_auth(Some(user("u2")), TokenPair::new("at_b", "rt_b"))
            .await
            .unwrap();

        let spent = Secret::from("rt1");
        let outcome = container
            .replace_tokens(&spent, TokenPair::new("at2", "rt2"))
            .await
            .unwrap();
        assert_eq!(outcome, SwapOutcome::Superseded);
        assert_eq!(
            container.expire_if_current(&spent).await.unwrap(),
            SwapOutcome::Superseded
        );

        let stored = container.store().read().await.unwrap();
        assert_eq!(stored.tokens, TokenPair::new("at_b", "rt_b"));
        assert_eq!(stored.user.unwrap().id, "u2");
        assert_eq!(container.access_token().unwrap().expose(), "at_b");
    }

    #[tokio::test]
    async fn expire_if_current_ends_matching_session() {
        let container = container();
        container
            .set_auth(Some(user("u1")), TokenPair::new("at1", "rt1"))
            .await
            .unwrap();

        let outcome = container.expire_if_current(&Secret::from("rt1")).await.unwrap();
        assert_eq!(outcome, SwapOutcome::Applied);
        assert!(!container.is_authenticated());
        assert!(!store_has_tokens(&container).await);
        assert_eq!(container.snapshot().phase, AuthPhase::Unauthenticated);
    }

    #[tokio::test]
    async fn late_restore_does_not_override_sign_in() {
        let container = container();
        container
            .set_auth(Some(user("u2")), TokenPair::new("at_b", "rt_b"))
            .await
            .unwrap();
        container
            .restore(StoredSession {
                tokens: TokenPair::new("at_old", "rt_old"),
                user: Some(user("u1")),
                profile_incomplete: true,
            })
            .await;

        let state = container.snapshot();
        assert_eq!(state.access_token().unwrap().expose(), "at_b");
        assert_eq!(state.phase, AuthPhase::Authenticated);
    }

    #[tokio::test]
    async fn failed_relogin_keeps_the_live_session_consistent() {
        let container = container();
        container
            .set_auth(Some(user("u1")), TokenPair::new("at", "rt"))
            .await
            .unwrap();

        container.begin_authentication().await;
        container.fail_authentication("Invalid email or password").await;

        let state = container.snapshot();
        assert!(state.is_authenticated());
        assert_eq!(state.phase, AuthPhase::Authenticated);
        assert!(!state.is_loading);
        assert_eq!(state.last_error.as_deref(), Some("Invalid email or password"));
    }

    #[tokio::test]
    async fn subscribers_observe_transitions() {
        let container = container();
        let mut rx = container.subscribe();

        container
            .set_auth(None, TokenPair::new("at", "rt"))
            .await
            .unwrap();
        rx.changed().await.unwrap();
        assert!(rx.borrow_and_update().is_authenticated());

        container.expire().await.unwrap();
        rx.changed().await.unwrap();
        assert!(!rx.borrow_and_update().is_authenticated());
    }

    #[tokio::test]
    async fn update_user_without_session_is_ignored() {
        let container = container();
        container.update_user(user("ghost")).await.unwrap();
        assert!(container.snapshot().user.is_none());
    }
}
