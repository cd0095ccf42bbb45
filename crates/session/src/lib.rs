//! In-memory session state for the tourism client
//!
//! Owns the observable projection of the credential record, the pure auth
//! phase machine that drives it, and the one-time startup hydration that
//! fills it from durable storage. The credential store stays the single
//! source of truth; every token-changing transition writes through to it
//! before the new state is published.
//!
//! Session lifecycle:
//! 1. `hydrate()` restores the stored record and releases the `HydrationGate`
//! 2. Login/registration: `begin_authentication()` → `set_auth()` or `fail_authentication()`
//! 3. Identity-provider callback may land in `AuthenticatedIncomplete` until `complete_profile()`
//! 4. Refresh protocol calls `replace_tokens()`, or `expire_if_current()` when recovery is
//!    impossible; both are no-ops once the session has moved on
//! 5. Logout calls `clear_auth()`

pub mod container;
pub mod error;
pub mod guard;
pub mod hydration;
pub mod phase;
pub mod redirect;
pub mod state;

pub use container::{SessionContainer, SwapOutcome};
pub use error::{Error, Result};
pub use guard::{SubmitGuard, SubmitTicket};
pub use hydration::{HydrationGate, HydrationReport, View, hydrate};
pub use phase::{AuthEvent, AuthPhase, handle_event};
pub use redirect::{
    ADMIN_LANDING, COMPLETE_PROFILE_PATH, DEFAULT_LANDING, LOGIN_PATH, landing_page, login_url,
    redirect_param, safe_redirect,
};
pub use state::SessionState;
