//! Contrabass API client

use crate::crypto::decrypt_aes_cbc;
use crate::error::ContrabassError;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// Client for the Contrabass infrastructure API
pub struct ContrabassClient {
    client: Client,
    base_url: String,
    encrypt_key: String,
    auth_token: Option<String>,
}

/// A resolved provider record with decrypted credentials
#[derive(Debug, Clone)]
pub struct Provider {
    pub keystone_url: String,
    pub admin_id: String,
    pub admin_password: String,
    pub domain: String,
    pub rabbit_user: String,
    pub rabbit_password: String,
    pub rabbit_urls: Vec<String>,
}

#[derive(Deserialize)]
struct ProviderResponse {
    data: ProviderData,
}

#[derive(Deserialize)]
struct ProviderData {
    #[serde(default)]
    url: String,
    attributes: ProviderAttrs,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProviderAttrs {
    #[serde(default)]
    admin_id: String,
    #[serde(default)]
    admin_pw: String,
    #[serde(default)]
    domain: String,
    #[serde(default, rename = "rabbitMQId")]
    rabbit_mq_id: String,
    #[serde(default, rename = "rabbitMQPw")]
    rabbit_mq_pw: String,
    #[serde(default, rename = "rabbitMQUrls")]
    rabbit_mq_urls: Vec<String>,
}

impl ContrabassClient {
    /// Create a new Contrabass client
    ///
    /// # Arguments
    /// * `base_url` - Contrabass base URL
    /// * `encrypt_key` - 16-byte AES key for credential decryption
    /// * `timeout` - per-request timeout
    /// * `insecure_tls` - skip TLS certificate verification
    pub fn new(
        base_url: String,
        encrypt_key: String,
        timeout: Duration,
        insecure_tls: bool,
    ) -> Result<Self, ContrabassError> {
        let client = Client::builder()
            .timeout(timeout)
            .danger_accept_invalid_certs(insecure_tls)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            encrypt_key,
            auth_token: None,
        })
    }

    /// Attach a bearer token to every request
    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    /// Fetch a provider record and decrypt its credentials.
    pub async fn get_provider(&self, provider_id: &str) -> Result<Provider, ContrabassError> {
        let url = format!(
            "{}/v1/contrabass/admin/infra/provider/{}",
            self.base_url, provider_id
        );
        debug!(provider = provider_id, "Fetching contrabass provider");

        let mut req = self.client.get(&url);
        if let Some(token) = &self.auth_token {
            req = req.header("Authorization", format!("Bearer {}", token));
        }

        let response = req.send().await?;
        if response.status() != reqwest::StatusCode::OK {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ContrabassError::Api(format!(
                "Failed to get provider {}: {} - {}",
                provider_id, status, body
            )));
        }

        let out: ProviderResponse = response.json().await?;
        let attrs = out.data.attributes;

        let admin_password = decrypt_aes_cbc(&attrs.admin_pw, &self.encrypt_key)?;
        let rabbit_password = decrypt_aes_cbc(&attrs.rabbit_mq_pw, &self.encrypt_key)?;

        Ok(Provider {
            keystone_url: out.data.url,
            admin_id: attrs.admin_id,
            admin_password,
            domain: attrs.domain,
            rabbit_user: attrs.rabbit_mq_id,
            rabbit_password,
            rabbit_urls: attrs.rabbit_mq_urls,
        })
    }
}
