//! Status-condition update protocol
//!
//! A single step keeps `Ready` and its mirror `Degraded` complementary and
//! maintains `lastError`, `lastSyncedAt` and the DOWN-retry state. Updates
//! go through an optimistic-concurrency loop: re-fetch, mutate, skip when
//! nothing changed, and retry conflicts with bounded backoff.

use chrono::{DateTime, Utc};
use crds::{Condition, DownPortRetryStatus, OpenstackConfig, OpenstackConfigStatus};
use kube::api::PostParams;
use kube::Api;
use std::time::Duration;
use tracing::warn;

pub const COND_READY: &str = "Ready";
pub const COND_DEGRADED: &str = "Degraded";

pub const REASON_SYNCED: &str = "Synced";
pub const REASON_NO_CHANGE: &str = "NoChange";
pub const REASON_CONFIG_ERROR: &str = "ConfigError";
pub const REASON_CONTRABASS_ERROR: &str = "ContrabassError";
pub const REASON_KEYSTONE_ERROR: &str = "KeystoneError";
pub const REASON_NEUTRON_ENDPOINT_ERROR: &str = "NeutronEndpointError";
pub const REASON_NEUTRON_PORT_ERROR: &str = "NeutronPortError";
pub const REASON_NEUTRON_SUBNET_ERROR: &str = "NeutronSubnetError";
pub const REASON_SUBNET_NOT_FOUND: &str = "SubnetNotFound";
pub const REASON_SUBNET_NOT_UNIQUE: &str = "SubnetNotUnique";
pub const REASON_SUBNET_REQUIRED: &str = "SubnetRequired";
pub const REASON_VIOLA_POST_ERROR: &str = "ViolaPostError";

const CONFLICT_RETRIES: u32 = 5;
const CONFLICT_BACKOFF: Duration = Duration::from_millis(200);

/// How a status update treats the stored DOWN-retry state.
#[derive(Debug, Clone)]
pub enum DownRetryPatch {
    Keep,
    Clear,
    Set(DownPortRetryStatus),
}

/// Apply the Ready/Degraded pair and the bookkeeping fields to a status.
pub fn apply_ready_condition(
    status: &mut OpenstackConfigStatus,
    ready: bool,
    reason: &str,
    message: &str,
    observed_generation: Option<i64>,
    now: DateTime<Utc>,
) {
    status.set_condition(Condition {
        type_: COND_READY.to_string(),
        status: if ready { "True" } else { "False" }.to_string(),
        reason: reason.to_string(),
        message: message.to_string(),
        observed_generation,
        last_transition_time: Some(now),
    });

    let (degraded_status, degraded_reason, degraded_message) = if ready {
        ("False", "Healthy", "controller healthy".to_string())
    } else {
        ("True", "Error", message.to_string())
    };
    status.set_condition(Condition {
        type_: COND_DEGRADED.to_string(),
        status: degraded_status.to_string(),
        reason: degraded_reason.to_string(),
        message: degraded_message,
        observed_generation,
        last_transition_time: Some(now),
    });

    status.last_error = if ready {
        String::new()
    } else {
        message.to_string()
    };
    if ready && reason == REASON_SYNCED {
        status.last_synced_at = Some(now);
    }
}

/// Update the CR status with optimistic concurrency.
///
/// Not-found means the CR was deleted mid-tick and the update is dropped.
/// Conflicts are retried with bounded backoff; persistent conflict is
/// surfaced to the caller, which logs it without changing scheduling.
pub async fn update_status(
    api: &Api<OpenstackConfig>,
    name: &str,
    ready: bool,
    reason: &str,
    message: &str,
    retry: DownRetryPatch,
    now: DateTime<Utc>,
) -> Result<(), kube::Error> {
    let mut attempt = 0;
    loop {
        let mut latest = match api.get(name).await {
            Ok(obj) => obj,
            Err(kube::Error::Api(ae)) if ae.code == 404 => return Ok(()),
            Err(err) => return Err(err),
        };

        let generation = latest.metadata.generation;
        let mut status = latest.status.clone().unwrap_or_default();
        let before = status.clone();

        apply_ready_condition(&mut status, ready, reason, message, generation, now);
        match &retry {
            DownRetryPatch::Keep => {}
            DownRetryPatch::Clear => status.down_port_retry = None,
            DownRetryPatch::Set(state) => status.down_port_retry = Some(state.clone()),
        }

        if latest.status.is_some() && status == before {
            return Ok(());
        }
        latest.status = Some(status);
        latest.metadata.managed_fields = None;

        match api
            .replace_status(
                name,
                &PostParams::default(),
                serde_json::to_vec(&latest).map_err(kube::Error::SerdeError)?,
            )
            .await
        {
            Ok(_) => return Ok(()),
            Err(kube::Error::Api(ae)) if ae.code == 409 => {
                attempt += 1;
                if attempt >= CONFLICT_RETRIES {
                    return Err(kube::Error::Api(ae));
                }
                warn!(name, attempt, "status update conflict, retrying");
                tokio::time::sleep(CONFLICT_BACKOFF * attempt).await;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ready_and_degraded_stay_complementary() {
        let mut status = OpenstackConfigStatus::default();
        let now = Utc::now();

        apply_ready_condition(&mut status, true, REASON_NO_CHANGE, "no changes", Some(1), now);
        assert_eq!(status.condition(COND_READY).unwrap().status, "True");
        assert_eq!(status.condition(COND_DEGRADED).unwrap().status, "False");

        apply_ready_condition(&mut status, false, REASON_KEYSTONE_ERROR, "boom", Some(1), now);
        assert_eq!(status.condition(COND_READY).unwrap().status, "False");
        assert_eq!(status.condition(COND_DEGRADED).unwrap().status, "True");
        assert_eq!(status.condition(COND_DEGRADED).unwrap().message, "boom");
    }

    #[test]
    fn last_error_is_empty_iff_ready() {
        let mut status = OpenstackConfigStatus::default();
        let now = Utc::now();

        apply_ready_condition(&mut status, false, REASON_VIOLA_POST_ERROR, "post failed", None, now);
        assert_eq!(status.last_error, "post failed");

        apply_ready_condition(&mut status, true, REASON_SYNCED, "synced 2 node(s)", None, now);
        assert!(status.last_error.is_empty());
    }

    #[test]
    fn last_synced_at_updates_only_on_synced() {
        let mut status = OpenstackConfigStatus::default();
        let first = Utc::now();
        apply_ready_condition(&mut status, true, REASON_SYNCED, "synced 1 node(s)", None, first);
        assert_eq!(status.last_synced_at, Some(first));

        let later = first + chrono::Duration::seconds(60);
        apply_ready_condition(&mut status, true, REASON_NO_CHANGE, "no changes", None, later);
        assert_eq!(status.last_synced_at, Some(first));

        apply_ready_condition(&mut status, false, REASON_KEYSTONE_ERROR, "boom", None, later);
        assert_eq!(status.last_synced_at, Some(first));
    }

    #[test]
    fn transition_time_is_preserved_when_status_value_is_stable() {
        let mut status = OpenstackConfigStatus::default();
        let first = Utc::now();
        apply_ready_condition(&mut status, true, REASON_SYNCED, "synced", None, first);

        let later = first + chrono::Duration::seconds(60);
        apply_ready_condition(&mut status, true, REASON_NO_CHANGE, "no changes", None, later);
        let ready = status.condition(COND_READY).unwrap();
        assert_eq!(ready.reason, REASON_NO_CHANGE);
        assert_eq!(ready.last_transition_time, Some(first));

        apply_ready_condition(&mut status, false, REASON_KEYSTONE_ERROR, "boom", None, later);
        let ready = status.condition(COND_READY).unwrap();
        assert_eq!(ready.last_transition_time, Some(later));
    }

    #[test]
    fn observed_generation_mirrors_the_cr_generation() {
        let mut status = OpenstackConfigStatus::default();
        apply_ready_condition(&mut status, true, REASON_SYNCED, "synced", Some(7), Utc::now());
        assert_eq!(status.condition(COND_READY).unwrap().observed_generation, Some(7));
        assert_eq!(status.condition(COND_DEGRADED).unwrap().observed_generation, Some(7));
    }
}
