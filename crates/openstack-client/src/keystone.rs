//! Keystone identity client
//!
//! Issues project-scoped tokens via the password grant and exposes the
//! service catalog returned alongside, so callers can resolve Neutron and
//! Nova endpoints without extra round-trips.

use crate::error::OpenstackError;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Keystone API client
pub struct KeystoneClient {
    client: Client,
    base_url: String,
    domain: String,
}

#[derive(Serialize)]
struct AuthRequest<'a> {
    auth: AuthIdentity<'a>,
}

#[derive(Serialize)]
struct AuthIdentity<'a> {
    identity: IdentityContent<'a>,
    scope: ScopeContent<'a>,
}

#[derive(Serialize)]
struct IdentityContent<'a> {
    methods: [&'a str; 1],
    password: PasswordContent<'a>,
}

#[derive(Serialize)]
struct PasswordContent<'a> {
    user: UserContent<'a>,
}

#[derive(Serialize)]
struct UserContent<'a> {
    name: &'a str,
    domain: DomainContent<'a>,
    password: &'a str,
}

#[derive(Serialize)]
struct DomainContent<'a> {
    name: &'a str,
}

#[derive(Serialize)]
struct ScopeContent<'a> {
    project: ProjectContent<'a>,
}

#[derive(Serialize)]
struct ProjectContent<'a> {
    id: &'a str,
}

#[derive(Deserialize)]
struct TokenResponse {
    token: TokenBody,
}

#[derive(Deserialize)]
struct TokenBody {
    #[serde(default)]
    catalog: Vec<CatalogEntry>,
}

/// One service in the Keystone catalog
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogEntry {
    #[serde(rename = "type")]
    pub service_type: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub endpoints: Vec<CatalogEndpoint>,
}

/// One endpoint of a catalog service
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogEndpoint {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub interface: String,
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub region_id: String,
    #[serde(default)]
    pub url: String,
}

impl KeystoneClient {
    /// Create a new Keystone client
    ///
    /// The base URL is normalized to end in `/v3`.
    pub fn new(
        base_url: &str,
        domain: &str,
        timeout: Duration,
        insecure_tls: bool,
    ) -> Result<Self, OpenstackError> {
        let mut base = base_url.trim_end_matches('/').to_string();
        if !base.ends_with("/v3") {
            base.push_str("/v3");
        }
        let client = Client::builder()
            .timeout(timeout)
            .danger_accept_invalid_certs(insecure_tls)
            .build()?;

        Ok(Self {
            client,
            base_url: base,
            domain: domain.to_string(),
        })
    }

    /// Issue a project-scoped token via the password grant.
    ///
    /// Returns the `X-Subject-Token` header value together with the service
    /// catalog from the response body.
    pub async fn auth_token_with_catalog(
        &self,
        username: &str,
        password: &str,
        project_id: &str,
    ) -> Result<(String, Vec<CatalogEntry>), OpenstackError> {
        let url = format!("{}/auth/tokens", self.base_url);
        debug!(username, project_id, "Requesting keystone token");

        let body = AuthRequest {
            auth: AuthIdentity {
                identity: IdentityContent {
                    methods: ["password"],
                    password: PasswordContent {
                        user: UserContent {
                            name: username,
                            domain: DomainContent { name: &self.domain },
                            password,
                        },
                    },
                },
                scope: ScopeContent {
                    project: ProjectContent { id: project_id },
                },
            },
        };

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if status != reqwest::StatusCode::CREATED {
            let text = response.text().await.unwrap_or_default();
            return Err(OpenstackError::Api(format!(
                "Keystone auth failed: {} - {}",
                status, text
            )));
        }

        let token = response
            .headers()
            .get("X-Subject-Token")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| {
                OpenstackError::Authentication("missing X-Subject-Token header".to_string())
            })?;

        let out: TokenResponse = response.json().await?;
        Ok((token, out.token.catalog))
    }
}

/// Resolve a service endpoint URL from the catalog.
///
/// Picks the first service whose type matches (case-insensitive). When a
/// region is given, endpoints matching it by `region` or `region_id` are
/// preferred; within the candidates the requested interface wins, otherwise
/// the first candidate is used. The returned URL has any trailing `/`
/// stripped.
pub fn find_endpoint(
    catalog: &[CatalogEntry],
    service_type: &str,
    interface: &str,
    region: &str,
) -> Option<String> {
    let service_type = service_type.trim().to_lowercase();
    if service_type.is_empty() {
        return None;
    }
    let interface = interface.trim().to_lowercase();
    let region = region.trim().to_lowercase();

    for svc in catalog {
        if svc.service_type.to_lowercase() != service_type {
            continue;
        }
        if svc.endpoints.is_empty() {
            continue;
        }
        let mut candidates: Vec<&CatalogEndpoint> = svc.endpoints.iter().collect();
        if !region.is_empty() {
            let filtered: Vec<&CatalogEndpoint> = candidates
                .iter()
                .copied()
                .filter(|ep| {
                    ep.region.to_lowercase() == region || ep.region_id.to_lowercase() == region
                })
                .collect();
            if !filtered.is_empty() {
                candidates = filtered;
            }
        }
        if !interface.is_empty() {
            if let Some(ep) = candidates
                .iter()
                .find(|ep| ep.interface.to_lowercase() == interface)
            {
                return Some(ep.url.trim_end_matches('/').to_string());
            }
        }
        return Some(candidates[0].url.trim_end_matches('/').to_string());
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint(interface: &str, region: &str, url: &str) -> CatalogEndpoint {
        CatalogEndpoint {
            id: String::new(),
            interface: interface.to_string(),
            region: region.to_string(),
            region_id: region.to_string(),
            url: url.to_string(),
        }
    }

    fn catalog() -> Vec<CatalogEntry> {
        vec![
            CatalogEntry {
                service_type: "identity".to_string(),
                name: "keystone".to_string(),
                endpoints: vec![endpoint("public", "RegionOne", "https://keystone/v3/")],
            },
            CatalogEntry {
                service_type: "network".to_string(),
                name: "neutron".to_string(),
                endpoints: vec![
                    endpoint("internal", "RegionOne", "http://neutron.internal:9696/"),
                    endpoint("public", "RegionOne", "https://neutron:9696/"),
                    endpoint("public", "RegionTwo", "https://neutron.r2:9696/"),
                ],
            },
        ]
    }

    #[test]
    fn resolves_by_type_and_interface() {
        let url = find_endpoint(&catalog(), "network", "public", "");
        assert_eq!(url.as_deref(), Some("https://neutron:9696"));
    }

    #[test]
    fn region_filters_candidates_first() {
        let url = find_endpoint(&catalog(), "network", "public", "regiontwo");
        assert_eq!(url.as_deref(), Some("https://neutron.r2:9696"));
    }

    #[test]
    fn falls_back_to_first_candidate_without_interface_match() {
        let url = find_endpoint(&catalog(), "network", "admin", "RegionOne");
        assert_eq!(url.as_deref(), Some("http://neutron.internal:9696"));
    }

    #[test]
    fn unknown_service_yields_none() {
        assert!(find_endpoint(&catalog(), "compute", "public", "").is_none());
        assert!(find_endpoint(&catalog(), "", "public", "").is_none());
    }
}
