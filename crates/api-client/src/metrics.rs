//! Refresh protocol metrics
//!
//! - `session_refresh_total` (counter): label `outcome` =
//!   `success` | `rejected` | `missing_token` | `reused` | `store_failed` | `superseded`
//! - `session_refresh_duration_seconds` (histogram): time spent in the refresh call
//! - `session_replay_total` (counter): label `outcome` = `success` | `failure`
//! - `session_forced_logout_total` (counter)
//!
//! Calls are no-ops until a recorder is installed.

pub const REFRESH_DURATION_METRIC: &str = "session_refresh_duration_seconds";

/// Histogram buckets for the refresh call, 10ms to 30s.
pub const REFRESH_DURATION_BUCKETS: &[f64] = &[0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    Success,
    Rejected,
    MissingToken,
    /// A concurrent refresh already produced a newer token
    Reused,
    /// Refresh succeeded but the new pair could not be persisted
    StoreFailed,
    /// The session changed while the refresh was in flight
    Superseded,
}

impl RefreshOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            RefreshOutcome::Success => "success",
            RefreshOutcome::Rejected => "rejected",
            RefreshOutcome::MissingToken => "missing_token",
            RefreshOutcome::Reused => "reused",
            RefreshOutcome::StoreFailed => "store_failed",
            RefreshOutcome::Superseded => "superseded",
        }
    }
}

pub fn record_refresh(outcome: RefreshOutcome) {
    metrics::counter!("session_refresh_total", "outcome" => outcome.as_str()).increment(1);
}

pub fn record_refresh_duration(duration_secs: f64) {
    metrics::histogram!(REFRESH_DURATION_METRIC).record(duration_secs);
}

pub fn record_replay(succeeded: bool) {
    let outcome = if succeeded { "success" } else { "failure" };
    metrics::counter!("session_replay_total", "outcome" => outcome).increment(1);
}

pub fn record_forced_logout() {
    metrics::counter!("session_forced_logout_total").increment(1);
}
