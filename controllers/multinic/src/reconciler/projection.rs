//! Port-to-node projection
//!
//! Pure transform from observed Neutron ports to canonical per-node
//! configuration. Identical input yields byte-identical canonical output:
//! the hash of the normalized form is what change detection compares.

use openstack_client::{FixedIp, Port};
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};
use viola_client::{NodeConfig, NodeInterface};

/// Subnet selector resolved from the CR each tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubnetFilter {
    pub id: String,
    pub cidr: String,
    pub network_id: String,
    pub mtu: u32,
}

/// Result of projecting one CR's VM set.
#[derive(Debug, Default)]
pub struct Projection {
    /// Normalized node configs, one per requested VM (possibly with zero
    /// interfaces; the caller drops those before dispatch).
    pub nodes: Vec<NodeConfig>,
    /// Node names owning at least one surviving DOWN port.
    pub down_nodes: HashSet<String>,
    /// IDs of surviving DOWN ports.
    pub down_ports: Vec<String>,
}

/// Map each VM's ports to a normalized `NodeConfig`.
pub fn project_nodes(
    vm_ids: &[String],
    name_map: &HashMap<String, String>,
    ports: &[Port],
    filter: Option<&SubnetFilter>,
    interface_limit: Option<usize>,
) -> Projection {
    let unique_vms = unique_list(vm_ids);
    let vm_set: HashSet<&str> = unique_vms.iter().map(String::as_str).collect();

    let mut node_ports: HashMap<&str, Vec<&Port>> = HashMap::new();
    for port in ports {
        if vm_set.contains(port.device_id.as_str()) {
            node_ports.entry(port.device_id.as_str()).or_default().push(port);
        }
    }

    let mut projection = Projection::default();
    for vm in &unique_vms {
        let node_name = name_map
            .get(vm)
            .filter(|name| !name.is_empty())
            .cloned()
            .unwrap_or_else(|| vm.clone());

        let mut list = node_ports.remove(vm.as_str()).unwrap_or_default();
        list.sort_by(|a, b| {
            (&a.mac_address, &a.id, &a.network_id).cmp(&(&b.mac_address, &b.id, &b.network_id))
        });

        let mut interfaces = Vec::with_capacity(list.len());
        for port in list {
            let mut address = String::new();
            let mut cidr = String::new();
            let mut mtu = 0;
            let mut subnet_id = first_subnet(&port.fixed_ips);

            if let Some(filter) = filter {
                if !filter.network_id.is_empty() && port.network_id != filter.network_id {
                    continue;
                }
                let Some(fip) = select_fixed_ip(&port.fixed_ips, &filter.id) else {
                    continue;
                };
                address = fip.ip_address.clone();
                subnet_id = fip.subnet_id.clone();
                cidr = filter.cidr.clone();
                mtu = filter.mtu;
            } else if let Some(fip) = port.fixed_ips.first() {
                address = fip.ip_address.clone();
            }

            if port.status.eq_ignore_ascii_case("DOWN") {
                projection.down_nodes.insert(node_name.clone());
                projection.down_ports.push(port.id.clone());
            }

            interfaces.push(NodeInterface {
                id: 0,
                port_id: port.id.clone(),
                mac_address: port.mac_address.clone(),
                address,
                cidr,
                mtu,
                network_id: port.network_id.clone(),
                subnet_id,
                device_id: port.device_id.clone(),
            });
        }

        let node = normalize_node_config(
            NodeConfig {
                node_name,
                instance_id: vm.clone(),
                interfaces,
            },
            interface_limit,
        );
        projection.nodes.push(node);
    }
    projection
}

/// Canonicalize a node config: interfaces sorted by `(mac, portId,
/// address)`, IDs reassigned sequentially from 1, optional cap applied.
pub fn normalize_node_config(mut node: NodeConfig, interface_limit: Option<usize>) -> NodeConfig {
    node.interfaces.sort_by(|a, b| {
        (&a.mac_address, &a.port_id, &a.address).cmp(&(&b.mac_address, &b.port_id, &b.address))
    });
    if let Some(limit) = interface_limit {
        node.interfaces.truncate(limit);
    }
    for (index, iface) in node.interfaces.iter_mut().enumerate() {
        iface.id = index as u32 + 1;
    }
    node
}

/// SHA-256 over the canonical JSON form of a normalized node config.
pub fn config_hash(node: &NodeConfig) -> String {
    let data = serde_json::to_vec(node).expect("node config serializes");
    hex::encode(Sha256::digest(data))
}

fn first_subnet(fips: &[FixedIp]) -> String {
    fips.first().map(|fip| fip.subnet_id.clone()).unwrap_or_default()
}

fn select_fixed_ip<'a>(fips: &'a [FixedIp], subnet_id: &str) -> Option<&'a FixedIp> {
    if subnet_id.is_empty() {
        return fips.first();
    }
    fips.iter().find(|fip| fip.subnet_id == subnet_id)
}

fn unique_list(items: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    items
        .iter()
        .filter(|item| seen.insert(item.as_str()))
        .cloned()
        .collect()
}
