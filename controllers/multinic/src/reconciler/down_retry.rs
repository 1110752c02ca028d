//! DOWN-port retry escalation
//!
//! A CR's DOWN-port state is summarized by a hash over the sorted DOWN port
//! IDs. While the hash is stable the affected nodes are re-sent on a fast
//! cadence for the first `max_fast` attempts, then on the slow cadence; a
//! changed hash restarts the fast phase. The downstream applier may have
//! lost state, so due nodes are re-sent even when their content hash is
//! unchanged.

use chrono::{DateTime, Utc};
use crds::DownPortRetryStatus;
use sha2::{Digest, Sha256};
use std::time::Duration;

/// Hash over the sorted, deduplicated set of DOWN port IDs; empty when no
/// port is DOWN.
pub fn down_ports_hash(port_ids: &[String]) -> String {
    if port_ids.is_empty() {
        return String::new();
    }
    let mut ids: Vec<&str> = port_ids.iter().map(String::as_str).collect();
    ids.sort_unstable();
    ids.dedup();
    hex::encode(Sha256::digest(ids.join(",")))
}

/// Decide whether the DOWN nodes are due for a re-send at `now`.
///
/// Returns `(due, wait)`: `wait` is the remaining time until the next
/// attempt when not due. An empty `down_hash` never retries (the caller
/// clears the stored state).
pub fn should_retry_down_ports(
    prev: Option<&DownPortRetryStatus>,
    down_hash: &str,
    now: DateTime<Utc>,
    fast: Duration,
    slow: Duration,
    max_fast: u32,
) -> (bool, Option<Duration>) {
    if down_hash.is_empty() {
        return (false, None);
    }
    let Some(prev) = prev else {
        return (true, None);
    };
    if prev.hash != down_hash {
        return (true, None);
    }
    let Some(last_attempt) = prev.last_attempt else {
        return (true, None);
    };

    let interval = if prev.fast_attempts < max_fast {
        fast
    } else {
        slow
    };
    let elapsed = (now - last_attempt).to_std().unwrap_or(Duration::ZERO);
    if elapsed >= interval {
        (true, None)
    } else {
        (false, Some(interval - elapsed))
    }
}

/// State to store after a successful re-send of the DOWN nodes.
pub fn next_retry_state(
    prev: Option<&DownPortRetryStatus>,
    down_hash: &str,
    now: DateTime<Utc>,
    max_fast: u32,
) -> DownPortRetryStatus {
    let fast_attempts = match prev {
        Some(prev) if prev.hash == down_hash => (prev.fast_attempts + 1).min(max_fast),
        _ => 1,
    };
    DownPortRetryStatus {
        hash: down_hash.to_string(),
        last_attempt: Some(now),
        fast_attempts,
    }
}
