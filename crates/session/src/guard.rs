//! Duplicate-submission guard
//!
//! Toggle-style actions (favorite a trip, cancel a booking) must ignore
//! repeat triggers while their own request is outstanding. The ticket
//! releases its key on drop, including when the request future is dropped.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

#[derive(Clone, Default)]
pub struct SubmitGuard {
    pending: Arc<Mutex<HashSet<String>>>,
}

impl SubmitGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `key`. `None` while another ticket for the same key is alive.
    pub fn try_begin(&self, key: impl Into<String>) -> Option<SubmitTicket> {
        let key = key.into();
        let mut pending = self.pending.lock();
        if !pending.insert(key.clone()) {
            debug!(key = %key, "submission already in flight, ignoring");
            return None;
        }
        Some(SubmitTicket {
            key,
            pending: self.pending.clone(),
        })
    }

    pub fn is_pending(&self, key: &str) -> bool {
        self.pending.lock().contains(key)
    }
}

/// Proof of an in-flight submission.
pub struct SubmitTicket {
    key: String,
    pending: Arc<Mutex<HashSet<String>>>,
}

impl SubmitTicket {
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Drop for SubmitTicket {
    fn drop(&mut self) {
        self.pending.lock().remove(&self.key);
    }
}
