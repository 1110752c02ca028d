//! Nova compute client
//!
//! Single-purpose lookup of server name and metadata, used to map VM IDs to
//! worker node names.

use crate::error::OpenstackError;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

/// Nova API client
pub struct NovaClient {
    client: Client,
    base_url: String,
}

/// A Nova server (only the fields the operator consumes)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Server {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

#[derive(Deserialize)]
struct ServerResponse {
    server: Server,
}

impl NovaClient {
    /// Create a new Nova client for the given endpoint
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

    /// Get a server by ID
    pub async fn get_server(&self, token: &str, server_id: &str) -> Result<Server, OpenstackError> {
        let url = format!(
            "{}/servers/{}",
            self.base_url,
            urlencoding::encode(server_id)
        );
        debug!(server = server_id, "Fetching nova server");

        let response = self
            .client
            .get(&url)
            .header("X-Auth-Token", token)
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(OpenstackError::NotFound(format!(
                "Server {} not found",
                server_id
            )));
        }
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(OpenstackError::Api(format!(
                "Failed to get server {}: {} - {}",
                server_id, status, body
            )));
        }

        let out: ServerResponse = response.json().await?;
        Ok(out.server)
    }
}
