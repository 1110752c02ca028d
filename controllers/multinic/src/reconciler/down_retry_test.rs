use super::down_retry::*;
use chrono::{TimeZone, Utc};
use crds::DownPortRetryStatus;
use std::time::Duration;

const FAST: Duration = Duration::from_secs(10);
const SLOW: Duration = Duration::from_secs(120);
const MAX_FAST: u32 = 3;

#[test]
fn hash_is_empty_without_down_ports() {
    assert_eq!(down_ports_hash(&[]), "");
}

#[test]
fn hash_is_order_insensitive_and_deduplicated() {
    let a = down_ports_hash(&["port-b".to_string(), "port-a".to_string()]);
    let b = down_ports_hash(&["port-a".to_string(), "port-b".to_string()]);
    let c = down_ports_hash(&[
        "port-a".to_string(),
        "port-b".to_string(),
        "port-a".to_string(),
    ]);
    assert_eq!(a, b);
    assert_eq!(a, c);
    assert_ne!(a, down_ports_hash(&["port-a".to_string()]));
}

#[test]
fn empty_hash_never_retries() {
    let now = Utc::now();
    let prev = DownPortRetryStatus {
        hash: "hash-1".to_string(),
        last_attempt: Some(now),
        fast_attempts: 1,
    };
    let (due, wait) = should_retry_down_ports(Some(&prev), "", now, FAST, SLOW, MAX_FAST);
    assert!(!due);
    assert!(wait.is_none());
}

#[test]
fn new_or_changed_hash_is_due_immediately() {
    let now = Utc.with_ymd_and_hms(2026, 1, 10, 10, 0, 0).unwrap();

    let (due, wait) = should_retry_down_ports(None, "hash-1", now, FAST, SLOW, MAX_FAST);
    assert!(due);
    assert!(wait.is_none());

    let prev = DownPortRetryStatus {
        hash: "hash-0".to_string(),
        last_attempt: Some(now),
        fast_attempts: 2,
    };
    let (due, wait) = should_retry_down_ports(Some(&prev), "hash-1", now, FAST, SLOW, MAX_FAST);
    assert!(due);
    assert!(wait.is_none());
}

#[test]
fn fast_phase_waits_out_the_fast_interval() {
    let now = Utc.with_ymd_and_hms(2026, 1, 10, 10, 0, 0).unwrap();
    let prev = DownPortRetryStatus {
        hash: "hash-1".to_string(),
        last_attempt: Some(now),
        fast_attempts: 1,
    };

    let (due, wait) = should_retry_down_ports(Some(&prev), "hash-1", now, FAST, SLOW, MAX_FAST);
    assert!(!due);
    let wait = wait.unwrap();
    assert!(wait > Duration::ZERO && wait <= FAST);

    let halfway = now + chrono::Duration::seconds(5);
    let (due, wait) = should_retry_down_ports(Some(&prev), "hash-1", halfway, FAST, SLOW, MAX_FAST);
    assert!(!due);
    assert_eq!(wait.unwrap(), Duration::from_secs(5));

    let after_fast = now + chrono::Duration::seconds(11);
    let (due, wait) =
        should_retry_down_ports(Some(&prev), "hash-1", after_fast, FAST, SLOW, MAX_FAST);
    assert!(due);
    assert!(wait.is_none());
}

#[test]
fn exhausted_fast_attempts_switch_to_slow_cadence() {
    let now = Utc.with_ymd_and_hms(2026, 1, 10, 10, 0, 0).unwrap();
    let prev = DownPortRetryStatus {
        hash: "hash-1".to_string(),
        last_attempt: Some(now),
        fast_attempts: MAX_FAST,
    };

    let (due, wait) = should_retry_down_ports(Some(&prev), "hash-1", now, FAST, SLOW, MAX_FAST);
    assert!(!due);
    let wait = wait.unwrap();
    assert!(wait > FAST && wait <= SLOW);

    let after_slow = now + chrono::Duration::seconds(121);
    let (due, _) = should_retry_down_ports(Some(&prev), "hash-1", after_slow, FAST, SLOW, MAX_FAST);
    assert!(due);
}

#[test]
fn attempts_accumulate_while_hash_is_stable_and_cap_at_max() {
    let now = Utc::now();
    let mut state: Option<DownPortRetryStatus> = None;
    for expected in 1..=MAX_FAST + 2 {
        let next = next_retry_state(state.as_ref(), "hash-1", now, MAX_FAST);
        assert_eq!(next.fast_attempts, expected.min(MAX_FAST));
        assert_eq!(next.hash, "hash-1");
        assert_eq!(next.last_attempt, Some(now));
        state = Some(next);
    }
}

#[test]
fn hash_change_resets_fast_attempts() {
    let now = Utc::now();
    let prev = DownPortRetryStatus {
        hash: "hash-1".to_string(),
        last_attempt: Some(now),
        fast_attempts: MAX_FAST,
    };
    let next = next_retry_state(Some(&prev), "hash-2", now, MAX_FAST);
    assert_eq!(next.fast_attempts, 1);
    assert_eq!(next.hash, "hash-2");
}
