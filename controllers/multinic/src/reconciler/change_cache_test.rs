use super::change_cache::*;
use super::projection::config_hash;
use chrono::Utc;
use inventory::Store;
use viola_client::{NodeConfig, NodeInterface};

const PROVIDER: &str = "prov-1";

fn node(name: &str, address: &str) -> NodeConfig {
    NodeConfig {
        node_name: name.to_string(),
        instance_id: name.to_string(),
        interfaces: vec![NodeInterface {
            id: 1,
            port_id: "port-a".to_string(),
            mac_address: "fa:16:3e:00:00:01".to_string(),
            address: address.to_string(),
            cidr: "10.0.0.0/24".to_string(),
            mtu: 1450,
            network_id: "net-a".to_string(),
            subnet_id: "subnet-a".to_string(),
            device_id: name.to_string(),
        }],
    }
}

fn temp_store() -> (tempfile::TempDir, Store) {
    let dir = tempfile::tempdir().unwrap();
    let store = Store::new(dir.path().join("inventory.json")).unwrap();
    (dir, store)
}

#[test]
fn unknown_node_is_a_dispatch_candidate() {
    let cache = ChangeCache::new();
    let (_dir, store) = temp_store();
    let nodes = vec![node("node-a", "10.0.0.10")];

    let changes = detect_changes(&cache, Some(&store), PROVIDER, &nodes, Utc::now());
    assert_eq!(changes.to_send.len(), 1);
    assert_eq!(changes.hashes.len(), 1);
    assert_eq!(
        changes.hashes["node-a"],
        config_hash(&nodes[0]),
    );
}

#[test]
fn memory_hit_skips_dispatch() {
    let cache = ChangeCache::new();
    let n = node("node-a", "10.0.0.10");
    cache.insert(
        PROVIDER,
        "node-a",
        CacheEntry {
            hash: config_hash(&n),
            node: n.clone(),
        },
    );

    let changes = detect_changes(&cache, None, PROVIDER, &[n], Utc::now());
    assert!(changes.to_send.is_empty());
}

#[test]
fn memory_hit_repairs_stale_inventory() {
    let cache = ChangeCache::new();
    let (_dir, store) = temp_store();
    let n = node("node-a", "10.0.0.10");
    let hash = config_hash(&n);
    cache.insert(
        PROVIDER,
        "node-a",
        CacheEntry {
            hash: hash.clone(),
            node: n.clone(),
        },
    );
    store.upsert(PROVIDER, &n, "stale-hash", Utc::now()).unwrap();

    let changes = detect_changes(&cache, Some(&store), PROVIDER, &[n], Utc::now());
    assert!(changes.to_send.is_empty());
    assert_eq!(store.get_hash(PROVIDER, "node-a"), hash);
}

#[test]
fn inventory_hit_promotes_into_memory() {
    let cache = ChangeCache::new();
    let (_dir, store) = temp_store();
    let n = node("node-a", "10.0.0.10");
    let hash = config_hash(&n);
    store.upsert(PROVIDER, &n, &hash, Utc::now()).unwrap();

    let changes = detect_changes(&cache, Some(&store), PROVIDER, &[n.clone()], Utc::now());
    assert!(changes.to_send.is_empty());
    let promoted = cache.get(PROVIDER, "node-a").unwrap();
    assert_eq!(promoted.hash, hash);

    // A second pass hits memory without consulting the store.
    let changes = detect_changes(&cache, None, PROVIDER, &[n], Utc::now());
    assert!(changes.to_send.is_empty());
}

#[test]
fn changed_config_is_dispatched_again() {
    let cache = ChangeCache::new();
    let (_dir, store) = temp_store();
    let before = node("node-a", "10.0.0.10");
    let hash = config_hash(&before);
    cache.insert(
        PROVIDER,
        "node-a",
        CacheEntry {
            hash: hash.clone(),
            node: before.clone(),
        },
    );
    store.upsert(PROVIDER, &before, &hash, Utc::now()).unwrap();

    let after = node("node-a", "10.0.0.99");
    let changes = detect_changes(&cache, Some(&store), PROVIDER, &[after.clone()], Utc::now());
    assert_eq!(changes.to_send.len(), 1);
    assert_eq!(changes.to_send[0].interfaces[0].address, "10.0.0.99");
}

#[test]
fn providers_do_not_share_cache_keys() {
    let cache = ChangeCache::new();
    let n = node("node-a", "10.0.0.10");
    cache.insert(
        "prov-1",
        "node-a",
        CacheEntry {
            hash: config_hash(&n),
            node: n.clone(),
        },
    );

    let changes = detect_changes(&cache, None, "prov-2", &[n], Utc::now());
    assert_eq!(changes.to_send.len(), 1);
}
