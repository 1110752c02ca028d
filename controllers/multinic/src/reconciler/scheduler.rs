//! Adaptive requeue scheduling
//!
//! A recent change predicts another: ticks that dispatched, or whose CR saw
//! a change within the fast window, requeue on the fast interval; quiescent
//! CRs fall back to the slow cadence.

use chrono::{DateTime, Utc};
use std::time::Duration;

/// Compute the next enqueue delay for a successful tick.
pub fn next_requeue(
    now: DateTime<Utc>,
    dispatched: bool,
    last_change: Option<DateTime<Utc>>,
    fast_window: Duration,
    fast: Duration,
    slow: Duration,
) -> Duration {
    if dispatched {
        return fast;
    }
    if let Some(changed_at) = last_change {
        let since = (now - changed_at).to_std().unwrap_or(Duration::ZERO);
        if since <= fast_window {
            return fast;
        }
    }
    slow
}
