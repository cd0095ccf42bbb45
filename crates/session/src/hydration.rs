//! Startup hydration
//!
//! Restores preferences and the stored credential record into the session
//! container exactly once, then releases the `HydrationGate`. Until the gate
//! is released every view decision resolves to `View::Loading`, so neither
//! the signed-in nor the signed-out surface is shown on a guess.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use credential_store::Preferences;
use tokio::sync::watch;
use tracing::{debug, info};

use crate::container::SessionContainer;
use crate::state::SessionState;

/// What the host should render for a given session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    /// Neutral placeholder, hydration not finished
    Loading,
    Authenticated,
    Anonymous,
}

/// One-shot "hydration complete" flag.
#[derive(Clone)]
pub struct HydrationGate {
    hydrated: Arc<watch::Sender<bool>>,
    started: Arc<AtomicBool>,
}

impl Default for HydrationGate {
    fn default() -> Self {
        Self::new()
    }
}

impl HydrationGate {
    pub fn new() -> Self {
        let (hydrated, _) = watch::channel(false);
        Self {
            hydrated: Arc::new(hydrated),
            started: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_hydrated(&self) -> bool {
        *self.hydrated.borrow()
    }

    /// Suspend until hydration has completed.
    pub async fn wait_hydrated(&self) {
        let mut rx = self.hydrated.subscribe();
        // The sender lives in `self`, so the channel cannot close while we wait.
        let _ = rx.wait_for(|hydrated| *hydrated).await;
    }

    /// Decide what to render. Always `Loading` before release.
    pub fn view(&self, state: &SessionState) -> View {
        if !self.is_hydrated() {
            View::Loading
        } else if state.is_authenticated() {
            View::Authenticated
        } else {
            View::Anonymous
        }
    }

    fn try_start(&self) -> bool {
        !self.started.swap(true, Ordering::SeqCst)
    }

    fn release(&self) {
        self.hydrated.send_replace(true);
    }
}

/// Outcome of the startup pass.
#[derive(Debug, Clone, PartialEq)]
pub struct HydrationReport {
    pub preferences: Preferences,
    /// A complete token pair was found and adopted
    pub restored: bool,
    /// The cached user snapshot was readable
    pub user_restored: bool,
}

/// Run the startup pass.
///
/// Returns `None` when hydration already ran (or is running) for this gate.
pub async fn hydrate(container: &SessionContainer, gate: &HydrationGate) -> Option<HydrationReport> {
    if !gate.try_start() {
        debug!("hydration already started, skipping");
        return None;
    }

    let backend = container.store().backend().clone();
    let preferences = Preferences::load(backend.as_ref()).await;

    let stored = container.store().read().await;
    let restored = stored.is_some();
    let user_restored = stored.as_ref().is_some_and(|s| s.user.is_some());

    if let Some(stored) = stored {
        container.restore(stored).await;
    }

    gate.release();
    info!(
        restored,
        user_restored,
        theme = preferences.theme.as_str(),
        locale = %preferences.locale,
        "hydration complete"
    );

    Some(HydrationReport {
        preferences,
        restored,
        user_restored,
    })
}
