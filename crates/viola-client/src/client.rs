//! Viola API client

use crate::error::ViolaError;
use crate::models::NodeConfig;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

/// Client for the Viola node-config dispatch API
pub struct ViolaClient {
    client: Client,
    base_url: String,
    auth_token: Option<String>,
    provider_id: Option<String>,
}

impl ViolaClient {
    /// Create a new Viola client
    ///
    /// # Arguments
    /// * `base_url` - Viola base URL (e.g., "http://viola-api.multinic-system")
    /// * `timeout` - per-request timeout
    /// * `insecure_tls` - skip TLS certificate verification
    pub fn new(base_url: String, timeout: Duration, insecure_tls: bool) -> Result<Self, ViolaError> {
        let client = Client::builder()
            .timeout(timeout)
            .danger_accept_invalid_certs(insecure_tls)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            auth_token: None,
            provider_id: None,
        })
    }

    /// Attach a bearer token to every request
    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    /// Set the `x-provider-id` routing header
    pub fn with_provider_id(mut self, provider_id: impl Into<String>) -> Self {
        self.provider_id = Some(provider_id.into());
        self
    }

    /// POST a batch of node configs to Viola.
    ///
    /// The batch is all-or-nothing: a non-2xx response leaves the caller's
    /// caches untouched. 200 and 202 both count as accepted.
    pub async fn send_node_configs(&self, nodes: &[NodeConfig]) -> Result<(), ViolaError> {
        let url = format!("{}/v1/k8s/multinic/node-configs", self.base_url);
        debug!("Posting {} node config(s) to Viola", nodes.len());

        let mut req = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(nodes);
        if let Some(token) = &self.auth_token {
            req = req.header("Authorization", format!("Bearer {}", token));
        }
        if let Some(provider_id) = &self.provider_id {
            req = req.header("x-provider-id", provider_id);
        }

        let response = req.send().await?;

        let status = response.status();
        if status != reqwest::StatusCode::OK && status != reqwest::StatusCode::ACCEPTED {
            let body = response.text().await.unwrap_or_default();
            return Err(ViolaError::Api(format!(
                "Failed to post node configs: {} - {}",
                status, body
            )));
        }

        Ok(())
    }
}
