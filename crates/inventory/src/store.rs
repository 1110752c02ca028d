//! File-backed inventory store
//!
//! A single mutex guards both the in-memory map and the backing file;
//! persistence writes a temp file and renames it, so concurrent readers see
//! either the old or the new file, never a torn one. Each
//! `(provider, node)` key is independently last-writer-wins.

use crate::error::InventoryError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use viola_client::NodeConfig;

/// Last-dispatched record for one node of one provider
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    pub provider_id: String,
    pub node_name: String,
    pub instance_id: String,
    pub config: NodeConfig,
    pub last_config_hash: String,
    pub updated_at: DateTime<Utc>,
}

#[derive(Default, Serialize, Deserialize)]
struct FileData {
    #[serde(default)]
    records: Vec<Record>,
}

/// Durable key-value store of last-sent node configs
pub struct Store {
    path: PathBuf,
    data: Mutex<HashMap<String, Record>>,
}

impl Store {
    /// Open (or create) a store backed by the given file.
    pub fn new(path: impl Into<PathBuf>) -> Result<Self, InventoryError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let data = Self::load(&path)?;
        Ok(Self {
            path,
            data: Mutex::new(data),
        })
    }

    /// Last dispatched hash for `(provider, node)`, empty if never dispatched.
    pub fn get_hash(&self, provider_id: &str, node_name: &str) -> String {
        let data = self.data.lock().expect("inventory mutex poisoned");
        data.get(&key(provider_id, node_name))
            .map(|rec| rec.last_config_hash.clone())
            .unwrap_or_default()
    }

    /// Record the latest dispatched config and persist the file.
    pub fn upsert(
        &self,
        provider_id: &str,
        node: &NodeConfig,
        hash: &str,
        updated_at: DateTime<Utc>,
    ) -> Result<(), InventoryError> {
        let mut data = self.data.lock().expect("inventory mutex poisoned");
        data.insert(
            key(provider_id, &node.node_name),
            Record {
                provider_id: provider_id.to_string(),
                node_name: node.node_name.clone(),
                instance_id: node.instance_id.clone(),
                config: node.clone(),
                last_config_hash: hash.to_string(),
                updated_at,
            },
        );
        Self::persist(&self.path, &data)
    }

    /// List records matching the given filters; empty filters match all.
    pub fn list(&self, provider_id: &str, node_name: &str, instance_id: &str) -> Vec<Record> {
        let data = self.data.lock().expect("inventory mutex poisoned");
        let mut out: Vec<Record> = data
            .values()
            .filter(|rec| provider_id.is_empty() || rec.provider_id == provider_id)
            .filter(|rec| node_name.is_empty() || rec.node_name == node_name)
            .filter(|rec| instance_id.is_empty() || rec.instance_id == instance_id)
            .cloned()
            .collect();
        out.sort_by(|a, b| {
            (a.provider_id.as_str(), a.node_name.as_str())
                .cmp(&(b.provider_id.as_str(), b.node_name.as_str()))
        });
        out
    }

    fn load(path: &Path) -> Result<HashMap<String, Record>, InventoryError> {
        let raw = match fs::read(path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(HashMap::new());
            }
            Err(err) => return Err(err.into()),
        };
        let payload: FileData = serde_json::from_slice(&raw)?;
        Ok(payload
            .records
            .into_iter()
            .map(|rec| (key(&rec.provider_id, &rec.node_name), rec))
            .collect())
    }

    fn persist(path: &Path, data: &HashMap<String, Record>) -> Result<(), InventoryError> {
        let mut records: Vec<&Record> = data.values().collect();
        records.sort_by(|a, b| {
            (a.provider_id.as_str(), a.node_name.as_str())
                .cmp(&(b.provider_id.as_str(), b.node_name.as_str()))
        });
        let payload = serde_json::json!({ "records": records });
        let raw = serde_json::to_vec_pretty(&payload)?;
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, raw)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }
}

fn key(provider_id: &str, node_name: &str) -> String {
    format!("{}|{}", provider_id, node_name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use viola_client::NodeInterface;

    fn node(name: &str) -> NodeConfig {
        NodeConfig {
            node_name: name.to_string(),
            instance_id: name.to_string(),
            interfaces: vec![NodeInterface {
                id: 1,
                port_id: "port-a".to_string(),
                mac_address: "fa:16:3e:00:00:01".to_string(),
                address: "10.0.0.10".to_string(),
                cidr: "10.0.0.0/24".to_string(),
                mtu: 1450,
                network_id: "net-a".to_string(),
                subnet_id: "subnet-a".to_string(),
                device_id: name.to_string(),
            }],
        }
    }

    #[test]
    fn upsert_then_get_hash() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::new(dir.path().join("inventory.json")).unwrap();

        assert_eq!(store.get_hash("prov-1", "node-a"), "");
        store
            .upsert("prov-1", &node("node-a"), "hash-1", Utc::now())
            .unwrap();
        assert_eq!(store.get_hash("prov-1", "node-a"), "hash-1");
        assert_eq!(store.get_hash("prov-2", "node-a"), "");
    }

    #[test]
    fn survives_reload_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("inventory.json");

        {
            let store = Store::new(&path).unwrap();
            store
                .upsert("prov-1", &node("node-a"), "hash-1", Utc::now())
                .unwrap();
            store
                .upsert("prov-1", &node("node-b"), "hash-2", Utc::now())
                .unwrap();
        }

        let reopened = Store::new(&path).unwrap();
        assert_eq!(reopened.get_hash("prov-1", "node-a"), "hash-1");
        assert_eq!(reopened.get_hash("prov-1", "node-b"), "hash-2");
        assert_eq!(reopened.list("prov-1", "", "").len(), 2);
    }

    #[test]
    fn list_filters_by_provider_node_and_instance() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::new(dir.path().join("inventory.json")).unwrap();
        store
            .upsert("prov-1", &node("node-a"), "h1", Utc::now())
            .unwrap();
        store
            .upsert("prov-2", &node("node-b"), "h2", Utc::now())
            .unwrap();

        assert_eq!(store.list("", "", "").len(), 2);
        assert_eq!(store.list("prov-1", "", "").len(), 1);
        assert_eq!(store.list("", "node-b", "").len(), 1);
        assert_eq!(store.list("", "", "node-a").len(), 1);
        assert!(store.list("prov-1", "node-b", "").is_empty());
    }

    #[test]
    fn upsert_overwrites_same_key() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::new(dir.path().join("inventory.json")).unwrap();
        store
            .upsert("prov-1", &node("node-a"), "h1", Utc::now())
            .unwrap();
        store
            .upsert("prov-1", &node("node-a"), "h2", Utc::now())
            .unwrap();

        assert_eq!(store.get_hash("prov-1", "node-a"), "h2");
        assert_eq!(store.list("", "", "").len(), 1);
    }
}
