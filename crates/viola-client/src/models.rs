//! Node configuration wire model
//!
//! These shapes are shared between the dispatch payload, the change-detection
//! hash, and the inventory records, so field order and omission rules must
//! stay stable: the canonical JSON of a normalized `NodeConfig` is what gets
//! hashed.

use serde::{Deserialize, Serialize};

/// A single projected network interface on a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeInterface {
    /// Stable 1-based index after normalization
    pub id: u32,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub port_id: String,

    pub mac_address: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub address: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub cidr: String,

    #[serde(default, skip_serializing_if = "is_zero")]
    pub mtu: u32,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub network_id: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub subnet_id: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub device_id: String,
}

/// Canonical per-node configuration sent to Viola.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeConfig {
    pub node_name: String,
    pub instance_id: String,
    pub interfaces: Vec<NodeInterface>,
}

fn is_zero(n: &u32) -> bool {
    *n == 0
}
