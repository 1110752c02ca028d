//! Two-tier change detection
//!
//! The fast tier is a per-process map of the last dispatched hash per
//! `(provider, node)`; the durable tier is the inventory store. A node is
//! dispatched only when its canonical hash differs from both tiers. Both
//! tiers are written only after a dispatch observably succeeded.

use super::projection::config_hash;
use chrono::{DateTime, Utc};
use inventory::Store;
use std::collections::HashMap;
use std::sync::RwLock;
use tracing::{debug, error};
use viola_client::NodeConfig;

/// Last dispatched state for one node
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub hash: String,
    pub node: NodeConfig,
}

/// Per-process cache of last dispatched node configs
#[derive(Default)]
pub struct ChangeCache {
    inner: RwLock<HashMap<String, CacheEntry>>,
}

impl ChangeCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, provider_id: &str, node_name: &str) -> Option<CacheEntry> {
        let inner = self.inner.read().expect("change cache lock poisoned");
        inner.get(&key(provider_id, node_name)).cloned()
    }

    pub fn insert(&self, provider_id: &str, node_name: &str, entry: CacheEntry) {
        let mut inner = self.inner.write().expect("change cache lock poisoned");
        inner.insert(key(provider_id, node_name), entry);
    }
}

/// Outcome of change detection over one projection
#[derive(Debug, Default)]
pub struct ChangeSet {
    /// Nodes whose canonical form differs from the last dispatched one.
    pub to_send: Vec<NodeConfig>,
    /// Canonical hash per node name, for every inspected node.
    pub hashes: HashMap<String, String>,
}

/// Compare normalized nodes against both cache tiers.
///
/// A memory hit with a stale durable record repairs the durable store; a
/// durable hit promotes the record into memory. Inventory failures are
/// logged and treated as "unknown", which errs towards dispatching.
pub fn detect_changes(
    cache: &ChangeCache,
    store: Option<&Store>,
    provider_id: &str,
    nodes: &[NodeConfig],
    now: DateTime<Utc>,
) -> ChangeSet {
    let mut change_set = ChangeSet::default();

    for node in nodes {
        let hash = config_hash(node);
        change_set
            .hashes
            .insert(node.node_name.clone(), hash.clone());

        if let Some(entry) = cache.get(provider_id, &node.node_name) {
            if entry.hash == hash {
                if let Some(store) = store {
                    let last = store.get_hash(provider_id, &node.node_name);
                    if last != hash {
                        if let Err(err) = store.upsert(provider_id, &entry.node, &entry.hash, now) {
                            error!(node = %node.node_name, error = %err, "inventory repair failed");
                        }
                    }
                }
                debug!(node = %node.node_name, "unchanged (memory)");
                continue;
            }
        }

        if let Some(store) = store {
            let last = store.get_hash(provider_id, &node.node_name);
            if !last.is_empty() && last == hash {
                cache.insert(
                    provider_id,
                    &node.node_name,
                    CacheEntry {
                        hash: hash.clone(),
                        node: node.clone(),
                    },
                );
                debug!(node = %node.node_name, "unchanged (inventory)");
                continue;
            }
        }

        change_set.to_send.push(node.clone());
    }

    change_set
}

fn key(provider_id: &str, node_name: &str) -> String {
    format!("{}|{}", provider_id, node_name)
}
