//! Refresh interceptor
//!
//! Wraps the dispatcher with the 401 recovery protocol:
//!
//! 1. A request that was already replayed propagates its failure.
//! 2. Otherwise it is marked as retried and a refresh is attempted with the
//!    refresh token read from the credential store.
//! 3. On success the new pair is written through the session container and
//!    the request is replayed once with the new access token.
//! 4. A missing refresh token, a rejected refresh or a failed write ends the
//!    session: credentials are cleared, the navigator is sent to the login
//!    page and the original failure is returned.
//! 5. Every outcome is tied to the refresh token that was spent. If a logout
//!    or a new sign-in lands while the refresh is in flight, the result is
//!    dropped: no tokens are written back, nothing is cleared, no redirect.
//!
//! Concurrent 401s coalesce: refreshes are serialized behind one lock, and
//! a waiter whose failed token has already been replaced reuses the new one
//! instead of spending the (possibly rotated) refresh token again.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use common::Secret;
use session::{SessionContainer, SwapOutcome, login_url};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::auth::refresh_tokens;
use crate::dispatcher::Dispatcher;
use crate::error::Result;
use crate::metrics::{self, RefreshOutcome};
use crate::navigator::Navigator;
use crate::request::{ApiRequest, ApiResponse, set_bearer};

/// HTTP client bound to a session.
pub struct SessionClient {
    dispatcher: Dispatcher,
    navigator: Arc<dyn Navigator>,
    refresh_lock: Mutex<()>,
    refreshing: AtomicBool,
}

/// Clears the in-flight marker when the refresh settles, including on cancellation.
struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
    fn mark(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::SeqCst);
        Self(flag)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl SessionClient {
    pub fn new(dispatcher: Dispatcher, navigator: Arc<dyn Navigator>) -> Self {
        Self {
            dispatcher,
            navigator,
            refresh_lock: Mutex::new(()),
            refreshing: AtomicBool::new(false),
        }
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn session(&self) -> &Arc<SessionContainer> {
        self.dispatcher.session()
    }

    /// True while a refresh call is outstanding.
    pub fn is_refreshing(&self) -> bool {
        self.refreshing.load(Ordering::SeqCst)
    }

    /// Send `request`, recovering from one expired access token.
    pub async fn execute(&self, mut request: ApiRequest) -> Result<ApiResponse> {
        self.dispatcher.prepare(&mut request)?;
        let failure = match self.dispatcher.dispatch(&request).await {
            Ok(response) => return Ok(response),
            Err(e) => e,
        };

        if !failure.is_auth_failure() || !request.authenticate {
            return Err(failure);
        }
        if request.retried {
            debug!(request_id = %request.request_id, "already replayed, giving up");
            return Err(failure);
        }
        request.retried = true;

        let used = request.bearer_token().map(str::to_owned);
        let Some(token) = self.recover(used.as_deref()).await else {
            return Err(failure);
        };

        set_bearer(&mut request.headers, token.expose())?;
        let result = self.dispatcher.dispatch(&request).await;
        metrics::record_replay(result.is_ok());
        result
    }

    /// Obtain a usable access token after `used` was rejected.
    ///
    /// `None` means the session could not be recovered; any forced logout
    /// has already happened by then.
    async fn recover(&self, used: Option<&str>) -> Option<Secret<String>> {
        let _serial = self.refresh_lock.lock().await;

        // Another request may have refreshed or ended the session while we waited
        if let Some(used) = used {
            match self.session().access_token() {
                Some(current) if current.expose() != used => {
                    debug!("token already refreshed by a concurrent request");
                    metrics::record_refresh(RefreshOutcome::Reused);
                    return Some(current);
                }
                Some(_) => {}
                None => {
                    debug!("session ended while waiting for refresh");
                    return None;
                }
            }
        }

        let _in_flight = InFlight::mark(&self.refreshing);

        let Some(refresh_token) = self.session().store().refresh_token().await else {
            warn!("no refresh token stored, ending session");
            metrics::record_refresh(RefreshOutcome::MissingToken);
            self.force_logout().await;
            return None;
        };

        let started = Instant::now();
        let refreshed = refresh_tokens(&self.dispatcher, &refresh_token).await;
        metrics::record_refresh_duration(started.elapsed().as_secs_f64());

        let tokens = match refreshed {
            Ok(tokens) => tokens,
            Err(e) => {
                warn!(error = %e, "token refresh rejected, ending session");
                metrics::record_refresh(RefreshOutcome::Rejected);
                self.end_session(&refresh_token).await;
                return None;
            }
        };

        let access = tokens.access_token.clone();
        match self.session().replace_tokens(&refresh_token, tokens).await {
            Ok(SwapOutcome::Applied) => {
                info!("access token refreshed");
                metrics::record_refresh(RefreshOutcome::Success);
                Some(access)
            }
            Ok(SwapOutcome::Superseded) => {
                info!("session changed during refresh, not replaying");
                metrics::record_refresh(RefreshOutcome::Superseded);
                None
            }
            Err(e) => {
                warn!(error = %e, "could not persist refreshed tokens, ending session");
                metrics::record_refresh(RefreshOutcome::StoreFailed);
                self.end_session(&refresh_token).await;
                None
            }
        }
    }

    /// End the session `spent` belonged to, unless it was already replaced.
    async fn end_session(&self, spent: &Secret<String>) {
        match self.session().expire_if_current(spent).await {
            Ok(SwapOutcome::Applied) => {}
            Ok(SwapOutcome::Superseded) => {
                debug!("session changed during refresh, not redirecting");
                return;
            }
            Err(e) => warn!(error = %e, "credential store not cleared"),
        }
        self.redirect_to_login();
    }

    async fn force_logout(&self) {
        if let Err(e) = self.session().expire().await {
            warn!(error = %e, "credential store not cleared");
        }
        self.redirect_to_login();
    }

    fn redirect_to_login(&self) {
        metrics::record_forced_logout();
        let target = login_url(self.navigator.current_path().as_deref());
        self.navigator.redirect(&target);
    }
}
