//! Neutron network client
//!
//! Port listing filtered by project and device IDs, plus the subnet and
//! network lookups needed to enrich projected interfaces with CIDR and MTU.

use crate::error::OpenstackError;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashSet;
use std::time::Duration;
use tracing::debug;

/// Neutron API client
pub struct NeutronClient {
    client: Client,
    base_url: String,
}

/// A Neutron port as observed by the operator
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Port {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub network_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub mac_address: String,
    #[serde(default)]
    pub device_id: String,
    #[serde(default)]
    pub fixed_ips: Vec<FixedIp>,
}

/// A fixed IP assignment on a port
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FixedIp {
    #[serde(default)]
    pub ip_address: String,
    #[serde(default)]
    pub subnet_id: String,
}

/// A Neutron subnet
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Subnet {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub cidr: String,
    #[serde(default)]
    pub network_id: String,
}

/// A Neutron network (only the fields the operator consumes)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Network {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub mtu: u32,
}

#[derive(Deserialize)]
struct PortsResponse {
    #[serde(default)]
    ports: Vec<Port>,
}

#[derive(Deserialize)]
struct SubnetsResponse {
    #[serde(default)]
    subnets: Vec<Subnet>,
}

#[derive(Deserialize)]
struct SubnetResponse {
    subnet: Subnet,
}

#[derive(Deserialize)]
struct NetworkResponse {
    network: Network,
}

impl NeutronClient {
    /// Create a new Neutron client for the given endpoint
    pub fn new(
        base_url: &str,
        timeout: Duration,
        insecure_tls: bool,
    ) -> Result<Self, OpenstackError> {
        let client = Client::builder()
            .timeout(timeout)
            .danger_accept_invalid_certs(insecure_tls)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// List ports filtered server-side by project and optional device IDs.
    ///
    /// Neutron supports repeating the `device_id` parameter; because some
    /// deployments ignore the repeated-param form, the result is re-filtered
    /// client-side against the requested device set.
    pub async fn list_ports(
        &self,
        token: &str,
        project_id: &str,
        device_ids: &[String],
    ) -> Result<Vec<Port>, OpenstackError> {
        let mut query: Vec<String> = Vec::new();
        if !project_id.is_empty() {
            query.push(format!("project_id={}", urlencoding::encode(project_id)));
        }
        for id in device_ids {
            query.push(format!("device_id={}", urlencoding::encode(id)));
        }
        let mut url = format!("{}/v2.0/ports", self.base_url);
        if !query.is_empty() {
            url = format!("{}?{}", url, query.join("&"));
        }
        debug!(project_id, devices = device_ids.len(), "Listing neutron ports");

        let response = self
            .client
            .get(&url)
            .header("X-Auth-Token", token)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(OpenstackError::Api(format!(
                "Failed to list ports: {} - {}",
                status, body
            )));
        }

        let out: PortsResponse = response.json().await?;
        if device_ids.is_empty() {
            return Ok(out.ports);
        }
        let wanted: HashSet<&str> = device_ids.iter().map(String::as_str).collect();
        Ok(out
            .ports
            .into_iter()
            .filter(|p| wanted.contains(p.device_id.as_str()))
            .collect())
    }

    /// Get a subnet by ID
    pub async fn get_subnet(&self, token: &str, id: &str) -> Result<Subnet, OpenstackError> {
        let url = format!(
            "{}/v2.0/subnets/{}",
            self.base_url,
            urlencoding::encode(id)
        );
        debug!(subnet = id, "Fetching neutron subnet");

        let response = self
            .client
            .get(&url)
            .header("X-Auth-Token", token)
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(OpenstackError::NotFound(format!("Subnet {} not found", id)));
        }
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(OpenstackError::Api(format!(
                "Failed to get subnet {}: {} - {}",
                id, status, body
            )));
        }

        let out: SubnetResponse = response.json().await?;
        Ok(out.subnet)
    }

    /// List subnets by project and exact name
    pub async fn list_subnets(
        &self,
        token: &str,
        project_id: &str,
        name: &str,
    ) -> Result<Vec<Subnet>, OpenstackError> {
        let mut query: Vec<String> = Vec::new();
        if !project_id.is_empty() {
            query.push(format!("project_id={}", urlencoding::encode(project_id)));
        }
        if !name.is_empty() {
            query.push(format!("name={}", urlencoding::encode(name)));
        }
        let mut url = format!("{}/v2.0/subnets", self.base_url);
        if !query.is_empty() {
            url = format!("{}?{}", url, query.join("&"));
        }
        debug!(project_id, name, "Listing neutron subnets");

        let response = self
            .client
            .get(&url)
            .header("X-Auth-Token", token)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(OpenstackError::Api(format!(
                "Failed to list subnets: {} - {}",
                status, body
            )));
        }

        let out: SubnetsResponse = response.json().await?;
        Ok(out.subnets)
    }

    /// Get a network by ID (for its MTU)
    pub async fn get_network(&self, token: &str, id: &str) -> Result<Network, OpenstackError> {
        let url = format!(
            "{}/v2.0/networks/{}",
            self.base_url,
            urlencoding::encode(id)
        );
        debug!(network = id, "Fetching neutron network");

        let response = self
            .client
            .get(&url)
            .header("X-Auth-Token", token)
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(OpenstackError::NotFound(format!(
                "Network {} not found",
                id
            )));
        }
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(OpenstackError::Api(format!(
                "Failed to get network {}: {} - {}",
                id, status, body
            )));
        }

        let out: NetworkResponse = response.json().await?;
        Ok(out.network)
    }
}
