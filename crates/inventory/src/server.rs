//! Inventory read API
//!
//! Read-only HTTP endpoints over the inventory store so operators can
//! inspect what was last dispatched per node. Data routes answer 503 when
//! the operator runs without a store.

use crate::store::{Record, Store};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

/// HTTP server exposing the inventory read API
pub struct InventoryServer {
    addr: String,
    store: Option<Arc<Store>>,
}

#[derive(Clone)]
struct ApiState {
    store: Option<Arc<Store>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListQuery {
    #[serde(default)]
    provider_id: String,
    #[serde(default)]
    node_name: String,
    #[serde(default)]
    instance_id: String,
}

/// Aggregate view of one provider's inventory
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderSummary {
    pub provider_id: String,
    pub node_count: usize,
    pub interface_count: usize,
    pub updated_at: Option<DateTime<Utc>>,
}

impl InventoryServer {
    /// Create a server; `store` may be `None` when inventory is disabled.
    pub fn new(addr: impl Into<String>, store: Option<Arc<Store>>) -> Self {
        Self {
            addr: addr.into(),
            store,
        }
    }

    /// Build the router (exposed separately for handler tests).
    pub fn router(store: Option<Arc<Store>>) -> Router {
        Router::new()
            .route("/healthz", get(handle_health))
            .route("/v1/interfaces/node-configs", get(handle_list))
            .route("/v1/interfaces/providers", get(handle_providers))
            .with_state(ApiState { store })
    }

    /// Serve until the process exits.
    pub async fn run(self) -> std::io::Result<()> {
        let router = Self::router(self.store);
        let listener = tokio::net::TcpListener::bind(&self.addr).await?;
        info!(addr = %self.addr, "Inventory read API listening");
        axum::serve(listener, router).await
    }
}

async fn handle_health() -> &'static str {
    "ok"
}

async fn handle_list(
    State(state): State<ApiState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Record>>, (StatusCode, String)> {
    let store = state.store.as_ref().ok_or((
        StatusCode::SERVICE_UNAVAILABLE,
        "inventory store not available".to_string(),
    ))?;
    Ok(Json(store.list(
        &query.provider_id,
        &query.node_name,
        &query.instance_id,
    )))
}

async fn handle_providers(
    State(state): State<ApiState>,
) -> Result<Json<Vec<ProviderSummary>>, (StatusCode, String)> {
    let store = state.store.as_ref().ok_or((
        StatusCode::SERVICE_UNAVAILABLE,
        "inventory store not available".to_string(),
    ))?;

    let mut by_provider: BTreeMap<String, ProviderSummary> = BTreeMap::new();
    for rec in store.list("", "", "") {
        let entry = by_provider
            .entry(rec.provider_id.clone())
            .or_insert_with(|| ProviderSummary {
                provider_id: rec.provider_id.clone(),
                node_count: 0,
                interface_count: 0,
                updated_at: None,
            });
        entry.node_count += 1;
        entry.interface_count += rec.config.interfaces.len();
        entry.updated_at = match entry.updated_at {
            Some(existing) if existing >= rec.updated_at => Some(existing),
            _ => Some(rec.updated_at),
        };
    }

    Ok(Json(by_provider.into_values().collect()))
}
