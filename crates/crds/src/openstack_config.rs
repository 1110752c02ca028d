//! OpenstackConfig CRD
//!
//! Declares a managed set of OpenStack VM instances and the subnet whose
//! ports should be projected into per-node interface configuration.

use chrono::{DateTime, Utc};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "multinic.okestro.io",
    version = "v1alpha1",
    kind = "OpenstackConfig",
    namespaced,
    status = "OpenstackConfigStatus"
)]
#[serde(rename_all = "camelCase")]
pub struct OpenstackConfigSpec {
    /// OpenStack subnet ID to target. If set, subnetName is ignored.
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "subnetID")]
    pub subnet_id: Option<String>,

    /// OpenStack subnet name to target when subnetID is empty.
    /// Duplicate names are rejected, so subnetID is recommended.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subnet_name: Option<String>,

    /// OpenStack VM instance IDs to project.
    #[serde(rename = "vmIDs")]
    pub vm_ids: Vec<String>,

    /// Provider and project identifiers.
    pub credentials: OpenstackCredentials,

    /// Per-CR overrides of operator-level defaults.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<OpenstackConfigSettings>,

    /// References to sensitive values required by this CR.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secrets: Option<OpenstackConfigSecrets>,
}

/// Identifiers needed to resolve OpenStack access.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct OpenstackCredentials {
    /// Provider ID used by the Contrabass API; also the inventory and
    /// cache namespace.
    #[serde(rename = "openstackProviderID")]
    pub openstack_provider_id: String,

    /// Optional downstream-cluster routing ID; defaults to the
    /// openstack provider ID.
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "k8sProviderID")]
    pub k8s_provider_id: Option<String>,

    /// OpenStack project (tenant) ID.
    #[serde(rename = "projectID")]
    pub project_id: String,
}

/// Per-CR settings overriding operator defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct OpenstackConfigSettings {
    /// Contrabass API base URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contrabass_endpoint: Option<String>,

    /// Inline key for decrypting provider credentials.
    /// A secret reference is recommended instead.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contrabass_encrypt_key: Option<String>,

    /// Contrabass HTTP timeout (e.g. "30s").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contrabass_timeout: Option<String>,

    /// Allow insecure TLS towards Contrabass.
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "contrabassInsecureTLS")]
    pub contrabass_insecure_tls: Option<bool>,

    /// Viola API base URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub viola_endpoint: Option<String>,

    /// Viola HTTP timeout (e.g. "30s").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub viola_timeout: Option<String>,

    /// Allow insecure TLS towards Viola.
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "violaInsecureTLS")]
    pub viola_insecure_tls: Option<bool>,

    /// OpenStack HTTP timeout (e.g. "30s").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub openstack_timeout: Option<String>,

    /// Allow insecure TLS towards OpenStack services.
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "openstackInsecureTLS")]
    pub openstack_insecure_tls: Option<bool>,

    /// Neutron endpoint override (skips catalog resolution).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub openstack_neutron_endpoint: Option<String>,

    /// Nova endpoint override (skips catalog resolution).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub openstack_nova_endpoint: Option<String>,

    /// Catalog endpoint interface (public/internal/admin).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub openstack_endpoint_interface: Option<String>,

    /// Catalog endpoint region.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub openstack_endpoint_region: Option<String>,

    /// Nova metadata key used to map a VM to its node name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub openstack_node_name_metadata_key: Option<String>,

    /// Port statuses to project (e.g. ACTIVE, DOWN). Empty allows all.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub openstack_port_allowed_statuses: Option<Vec<String>>,

    /// Per-node interface cap applied after normalization.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub openstack_interface_limit: Option<u32>,

    /// Fast retry count for DOWN ports before switching to the slow cadence.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub down_port_fast_retry_max: Option<u32>,

    /// Fast polling interval.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poll_fast_interval: Option<String>,

    /// Slow polling interval.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poll_slow_interval: Option<String>,

    /// Requeue interval after a failed tick.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poll_error_interval: Option<String>,

    /// Window after a change during which polling stays fast.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poll_fast_window: Option<String>,
}

/// Reference to a key inside a Secret.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SecretKeyRef {
    /// Secret name.
    pub name: String,

    /// Secret data key.
    pub key: String,
}

/// Secret references for this CR.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct OpenstackConfigSecrets {
    /// Provides the credential decryption key via a Secret.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contrabass_encrypt_key_secret_ref: Option<SecretKeyRef>,
}

/// A single status condition, set-by-type semantics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Condition type (e.g. "Ready", "Degraded").
    #[serde(rename = "type")]
    pub type_: String,

    /// "True", "False" or "Unknown".
    pub status: String,

    /// Machine-readable reason for the last transition.
    pub reason: String,

    /// Human-readable detail.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,

    /// CR generation observed when this condition was set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,

    /// Time of the last status change of this condition.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<DateTime<Utc>>,
}

/// DOWN-port retry bookkeeping.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DownPortRetryStatus {
    /// Hash over the sorted set of DOWN port IDs.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub hash: String,

    /// Last time the affected nodes were (re)sent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_attempt: Option<DateTime<Utc>>,

    /// Attempts accumulated in the fast retry phase.
    #[serde(default)]
    pub fast_attempts: u32,
}

/// Observed state of an OpenstackConfig.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct OpenstackConfigStatus {
    /// Current conditions; `Ready` and `Degraded` are kept complementary.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,

    /// Last time node configs were successfully dispatched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_synced_at: Option<DateTime<Utc>>,

    /// Latest reconcile error message; empty while Ready.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub last_error: String,

    /// DOWN-port retry state.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub down_port_retry: Option<DownPortRetryStatus>,
}

impl OpenstackConfigStatus {
    /// Look up a condition by type.
    pub fn condition(&self, type_: &str) -> Option<&Condition> {
        self.conditions.iter().find(|c| c.type_ == type_)
    }

    /// Insert or replace a condition by type, preserving the previous
    /// transition time when the status value did not change.
    pub fn set_condition(&mut self, mut condition: Condition) {
        match self.conditions.iter_mut().find(|c| c.type_ == condition.type_) {
            Some(existing) => {
                if existing.status == condition.status {
                    condition.last_transition_time = existing.last_transition_time;
                }
                *existing = condition;
            }
            None => self.conditions.push(condition),
        }
    }
}
