//! Terminal stand-in for page navigation

use api_client::Navigator;
use parking_lot::Mutex;
use tracing::warn;

/// Reports forced logouts to the operator instead of changing pages.
#[derive(Default)]
pub struct TerminalNavigator {
    last: Mutex<Option<String>>,
    current: Option<String>,
}

impl TerminalNavigator {
    /// `current` is the path being worked on, offered back as the
    /// post-login destination.
    pub fn new(current: Option<String>) -> Self {
        Self {
            last: Mutex::new(None),
            current,
        }
    }

    /// Target of the most recent redirect, if one happened.
    pub fn last_redirect(&self) -> Option<String> {
        self.last.lock().clone()
    }
}

impl Navigator for TerminalNavigator {
    fn redirect(&self, target: &str) {
        warn!(target_path = target, "session ended, sign-in required");
        eprintln!(
            "Your session has ended. Sign in again with `tourism-session login <email>` or `tourism-session oauth`."
        );
        *self.last.lock() = Some(target.to_string());
    }

    fn current_path(&self) -> Option<String> {
        self.current.clone()
    }
}
