//! Reconcile pipeline
//!
//! One tick per CR: resolve effective settings, discover the current cloud
//! state (provider → token → ports → subnet → server metadata), project it
//! into canonical node configs, detect changes against the two-tier cache,
//! merge due DOWN-port retries, dispatch, and record the outcome in status.
//! A tick never propagates an error to the watcher; every failure maps to a
//! `Ready=False` reason and an error-interval requeue.

pub mod change_cache;
pub mod down_retry;
pub mod projection;
pub mod scheduler;

#[cfg(test)]
mod change_cache_test;
#[cfg(test)]
mod down_retry_test;

use crate::conditions::{self, DownRetryPatch};
use crate::error::ControllerError;
use crate::settings::{self, OperatorDefaults, DEFAULT_ERROR_INTERVAL};
use self::change_cache::{CacheEntry, ChangeCache};
use self::down_retry::{down_ports_hash, next_retry_state, should_retry_down_ports};
use self::projection::{config_hash, project_nodes, SubnetFilter};
use chrono::{DateTime, Utc};
use contrabass_client::ContrabassClient;
use crds::{OpenstackConfig, OpenstackConfigSecrets};
use inventory::Store;
use k8s_openapi::api::core::v1::Secret;
use kube::{Api, Client, ResourceExt};
use kube_runtime::controller::Action;
use openstack_client::{find_endpoint, KeystoneClient, NeutronClient, NovaClient, Subnet};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tracing::{error, info, warn};
use viola_client::{NodeConfig, ViolaClient};

const ENCRYPT_KEY_LEN: usize = 16;

/// Reconciles OpenstackConfig resources against the cloud and Viola.
pub struct Reconciler {
    client: Client,
    defaults: OperatorDefaults,
    inventory: Option<Arc<Store>>,
    cache: ChangeCache,
    last_change: RwLock<HashMap<String, DateTime<Utc>>>,
}

impl Reconciler {
    pub fn new(client: Client, defaults: OperatorDefaults, inventory: Option<Arc<Store>>) -> Self {
        Self {
            client,
            defaults,
            inventory,
            cache: ChangeCache::new(),
            last_change: RwLock::new(HashMap::new()),
        }
    }

    /// Run one reconcile tick for a CR.
    pub async fn reconcile_openstack_config(&self, cfg: &OpenstackConfig) -> Action {
        let name = cfg.name_any();
        let namespace = cfg.namespace().unwrap_or_else(|| "default".to_string());
        let api: Api<OpenstackConfig> = Api::namespaced(self.client.clone(), &namespace);
        let now = Utc::now();

        info!(namespace = %namespace, name = %name, "Reconciling OpenstackConfig");

        // Effective settings; any resolution error is a ConfigError.
        let mut settings = match settings::resolve(&self.defaults, cfg.spec.settings.as_ref()) {
            Ok(s) => s,
            Err(err) => {
                error!(name = %name, error = %err, "settings resolution failed");
                return self
                    .fail(
                        &api,
                        &name,
                        conditions::REASON_CONFIG_ERROR,
                        &err.to_string(),
                        DEFAULT_ERROR_INTERVAL,
                        now,
                    )
                    .await;
            }
        };
        let error_interval = settings.poll_error_interval;

        match self
            .resolve_encrypt_key(&namespace, cfg.spec.secrets.as_ref())
            .await
        {
            Ok(Some(key)) => settings.contrabass_encrypt_key = key,
            Ok(None) => {}
            Err(err) => {
                error!(name = %name, error = %err, "encrypt key resolution failed");
                return self
                    .fail(
                        &api,
                        &name,
                        conditions::REASON_CONFIG_ERROR,
                        &err.to_string(),
                        error_interval,
                        now,
                    )
                    .await;
            }
        }
        if settings.contrabass_encrypt_key.len() != ENCRYPT_KEY_LEN {
            let msg = format!(
                "contrabass encrypt key must be {} bytes, got {}",
                ENCRYPT_KEY_LEN,
                settings.contrabass_encrypt_key.len()
            );
            error!(name = %name, "{}", msg);
            return self
                .fail(
                    &api,
                    &name,
                    conditions::REASON_CONFIG_ERROR,
                    &msg,
                    error_interval,
                    now,
                )
                .await;
        }

        let credentials = &cfg.spec.credentials;
        let provider_id = credentials.openstack_provider_id.clone();
        if cfg.spec.vm_ids.is_empty() {
            return self
                .fail(
                    &api,
                    &name,
                    conditions::REASON_CONFIG_ERROR,
                    "vmIDs must not be empty",
                    error_interval,
                    now,
                )
                .await;
        }

        let subnet_id = cfg.spec.subnet_id.as_deref().map(str::trim).unwrap_or("");
        let subnet_name = cfg.spec.subnet_name.as_deref().map(str::trim).unwrap_or("");
        if subnet_id.is_empty() && subnet_name.is_empty() {
            return self
                .fail(
                    &api,
                    &name,
                    conditions::REASON_SUBNET_REQUIRED,
                    "exactly one of subnetID or subnetName is required",
                    error_interval,
                    now,
                )
                .await;
        }

        // 1) Contrabass provider lookup.
        let provider = {
            let cb = ContrabassClient::new(
                settings.contrabass_endpoint.clone(),
                settings.contrabass_encrypt_key.clone(),
                settings.contrabass_timeout,
                settings.contrabass_insecure_tls,
            );
            let cb = match cb {
                Ok(cb) => cb,
                Err(err) => {
                    error!(name = %name, error = %err, "failed to build contrabass client");
                    return self
                        .fail(
                            &api,
                            &name,
                            conditions::REASON_CONTRABASS_ERROR,
                            &err.to_string(),
                            error_interval,
                            now,
                        )
                        .await;
                }
            };
            match cb.get_provider(&provider_id).await {
                Ok(provider) => provider,
                Err(err) => {
                    error!(name = %name, error = %err, "failed to fetch provider from contrabass");
                    return self
                        .fail(
                            &api,
                            &name,
                            conditions::REASON_CONTRABASS_ERROR,
                            &err.to_string(),
                            error_interval,
                            now,
                        )
                        .await;
                }
            }
        };

        // 2) Keystone token + service catalog.
        let (token, catalog) = {
            let keystone = KeystoneClient::new(
                &provider.keystone_url,
                &provider.domain,
                settings.openstack_timeout,
                settings.openstack_insecure_tls,
            );
            let keystone = match keystone {
                Ok(ks) => ks,
                Err(err) => {
                    error!(name = %name, error = %err, "failed to build keystone client");
                    return self
                        .fail(
                            &api,
                            &name,
                            conditions::REASON_KEYSTONE_ERROR,
                            &err.to_string(),
                            error_interval,
                            now,
                        )
                        .await;
                }
            };
            match keystone
                .auth_token_with_catalog(
                    &provider.admin_id,
                    &provider.admin_password,
                    &credentials.project_id,
                )
                .await
            {
                Ok(out) => out,
                Err(err) => {
                    error!(name = %name, error = %err, "failed to get keystone token");
                    return self
                        .fail(
                            &api,
                            &name,
                            conditions::REASON_KEYSTONE_ERROR,
                            &err.to_string(),
                            error_interval,
                            now,
                        )
                        .await;
                }
            }
        };

        // 3) Neutron endpoint + port listing.
        let neutron_endpoint = if !settings.neutron_endpoint.is_empty() {
            settings.neutron_endpoint.clone()
        } else {
            match find_endpoint(
                &catalog,
                "network",
                &settings.endpoint_interface,
                &settings.endpoint_region,
            ) {
                Some(endpoint) => endpoint,
                None => {
                    error!(
                        name = %name,
                        interface = %settings.endpoint_interface,
                        region = %settings.endpoint_region,
                        "failed to resolve neutron endpoint from catalog"
                    );
                    return self
                        .fail(
                            &api,
                            &name,
                            conditions::REASON_NEUTRON_ENDPOINT_ERROR,
                            "neutron endpoint not found",
                            error_interval,
                            now,
                        )
                        .await;
                }
            }
        };
        let neutron = match NeutronClient::new(
            &neutron_endpoint,
            settings.openstack_timeout,
            settings.openstack_insecure_tls,
        ) {
            Ok(neutron) => neutron,
            Err(err) => {
                error!(name = %name, error = %err, "failed to build neutron client");
                return self
                    .fail(
                        &api,
                        &name,
                        conditions::REASON_NEUTRON_ENDPOINT_ERROR,
                        &err.to_string(),
                        error_interval,
                        now,
                    )
                    .await;
            }
        };

        let mut ports = match neutron
            .list_ports(&token, &credentials.project_id, &cfg.spec.vm_ids)
            .await
        {
            Ok(ports) => ports,
            Err(err) => {
                error!(name = %name, error = %err, "failed to list neutron ports");
                return self
                    .fail(
                        &api,
                        &name,
                        conditions::REASON_NEUTRON_PORT_ERROR,
                        &err.to_string(),
                        error_interval,
                        now,
                    )
                    .await;
            }
        };

        // 4) Port status filter.
        if !settings.port_allowed_statuses.is_empty() {
            ports.retain(|port| {
                settings
                    .port_allowed_statuses
                    .iter()
                    .any(|status| port.status.eq_ignore_ascii_case(status))
            });
        }

        // 5) Subnet filter (ID wins over name; duplicate names fail hard).
        let subnet: Subnet = if !subnet_id.is_empty() {
            match neutron.get_subnet(&token, subnet_id).await {
                Ok(subnet) => subnet,
                Err(openstack_client::OpenstackError::NotFound(msg)) => {
                    warn!(name = %name, subnet = subnet_id, "subnet not found");
                    return self
                        .fail(
                            &api,
                            &name,
                            conditions::REASON_SUBNET_NOT_FOUND,
                            &msg,
                            error_interval,
                            now,
                        )
                        .await;
                }
                Err(err) => {
                    error!(name = %name, subnet = subnet_id, error = %err, "failed to get neutron subnet");
                    return self
                        .fail(
                            &api,
                            &name,
                            conditions::REASON_NEUTRON_SUBNET_ERROR,
                            &err.to_string(),
                            error_interval,
                            now,
                        )
                        .await;
                }
            }
        } else {
            let subnets = match neutron
                .list_subnets(&token, &credentials.project_id, subnet_name)
                .await
            {
                Ok(subnets) => subnets,
                Err(err) => {
                    error!(name = %name, subnet_name, error = %err, "failed to list neutron subnets");
                    return self
                        .fail(
                            &api,
                            &name,
                            conditions::REASON_NEUTRON_SUBNET_ERROR,
                            &err.to_string(),
                            error_interval,
                            now,
                        )
                        .await;
                }
            };
            match subnets.len() {
                0 => {
                    warn!(name = %name, subnet_name, "no matching subnet");
                    return self
                        .fail(
                            &api,
                            &name,
                            conditions::REASON_SUBNET_NOT_FOUND,
                            "subnet not found",
                            error_interval,
                            now,
                        )
                        .await;
                }
                1 => subnets.into_iter().next().expect("one subnet"),
                count => {
                    warn!(name = %name, subnet_name, count, "subnet name is not unique");
                    return self
                        .fail(
                            &api,
                            &name,
                            conditions::REASON_SUBNET_NOT_UNIQUE,
                            &format!("subnet name {:?} matches {} subnets", subnet_name, count),
                            error_interval,
                            now,
                        )
                        .await;
                }
            }
        };

        let mtu = match neutron.get_network(&token, &subnet.network_id).await {
            Ok(network) => network.mtu,
            Err(err) => {
                warn!(
                    name = %name,
                    network = %subnet.network_id,
                    error = %err,
                    "failed to get neutron network; MTU will be omitted"
                );
                0
            }
        };
        let filter = SubnetFilter {
            id: subnet.id.clone(),
            cidr: subnet.cidr.clone(),
            network_id: subnet.network_id.clone(),
            mtu,
        };

        // 6) Node names from Nova metadata, falling back to the VM ID.
        let name_map = self
            .resolve_node_names(&cfg.spec.vm_ids, &catalog, &token, &settings, &name)
            .await;

        // 7) Project and drop nodes that lost every interface to filtering.
        let projection = project_nodes(
            &cfg.spec.vm_ids,
            &name_map,
            &ports,
            Some(&filter),
            settings.interface_limit,
        );
        let nodes: Vec<NodeConfig> = projection
            .nodes
            .into_iter()
            .filter(|node| !node.interfaces.is_empty())
            .collect();

        // 8) DOWN-port retry decision.
        let down_hash = down_ports_hash(&projection.down_ports);
        let prev_retry = cfg.status.as_ref().and_then(|s| s.down_port_retry.as_ref());
        let (retry_due, retry_wait) = should_retry_down_ports(
            prev_retry,
            &down_hash,
            now,
            settings.poll_fast_interval,
            settings.poll_slow_interval,
            settings.down_fast_retry_max,
        );

        // 9) Change detection, then force-merge due DOWN nodes.
        let changes = change_cache::detect_changes(
            &self.cache,
            self.inventory.as_deref(),
            &provider_id,
            &nodes,
            now,
        );
        let mut to_send = changes.to_send;
        if retry_due {
            let queued: HashSet<String> = to_send.iter().map(|n| n.node_name.clone()).collect();
            for node in &nodes {
                if projection.down_nodes.contains(&node.node_name)
                    && !queued.contains(&node.node_name)
                {
                    info!(name = %name, node = %node.node_name, "re-sending node with DOWN port(s)");
                    to_send.push(node.clone());
                }
            }
        }

        let change_key = format!("{}/{}", namespace, name);
        if to_send.is_empty() {
            info!(name = %name, "no changes detected; skipping viola post");
            let retry_patch = if down_hash.is_empty() && prev_retry.is_some() {
                DownRetryPatch::Clear
            } else {
                DownRetryPatch::Keep
            };
            if let Err(err) = conditions::update_status(
                &api,
                &name,
                true,
                conditions::REASON_NO_CHANGE,
                "no changes detected",
                retry_patch,
                now,
            )
            .await
            {
                error!(name = %name, error = %err, "status update failed");
            }
            let last_change = self.last_change_at(&change_key);
            let mut delay = scheduler::next_requeue(
                now,
                false,
                last_change,
                settings.poll_fast_window,
                settings.poll_fast_interval,
                settings.poll_slow_interval,
            );
            if let Some(wait) = retry_wait {
                delay = delay.min(wait);
            }
            return Action::requeue(delay);
        }

        // 10) Dispatch to Viola.
        let routing_id = credentials
            .k8s_provider_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .unwrap_or(&provider_id)
            .to_string();
        let viola = match ViolaClient::new(
            settings.viola_endpoint.clone(),
            settings.viola_timeout,
            settings.viola_insecure_tls,
        ) {
            Ok(viola) => viola.with_provider_id(routing_id),
            Err(err) => {
                error!(name = %name, error = %err, "failed to build viola client");
                return self
                    .fail(
                        &api,
                        &name,
                        conditions::REASON_VIOLA_POST_ERROR,
                        &err.to_string(),
                        error_interval,
                        now,
                    )
                    .await;
            }
        };
        if let Err(err) = viola.send_node_configs(&to_send).await {
            error!(name = %name, error = %err, "failed to send node configs to viola");
            return self
                .fail(
                    &api,
                    &name,
                    conditions::REASON_VIOLA_POST_ERROR,
                    &err.to_string(),
                    error_interval,
                    now,
                )
                .await;
        }

        // 11) Dispatch succeeded: update both cache tiers and bookkeeping.
        for node in &to_send {
            let hash = changes
                .hashes
                .get(&node.node_name)
                .cloned()
                .unwrap_or_else(|| config_hash(node));
            self.cache.insert(
                &provider_id,
                &node.node_name,
                CacheEntry {
                    hash: hash.clone(),
                    node: node.clone(),
                },
            );
            if let Some(store) = &self.inventory {
                if let Err(err) = store.upsert(&provider_id, node, &hash, now) {
                    error!(name = %name, node = %node.node_name, error = %err, "inventory upsert failed");
                }
            }
        }
        self.record_change(&change_key, now);

        let retry_patch = if down_hash.is_empty() {
            if prev_retry.is_some() {
                DownRetryPatch::Clear
            } else {
                DownRetryPatch::Keep
            }
        } else if retry_due {
            DownRetryPatch::Set(next_retry_state(
                prev_retry,
                &down_hash,
                now,
                settings.down_fast_retry_max,
            ))
        } else {
            DownRetryPatch::Keep
        };

        info!(name = %name, count = to_send.len(), "synced node configs to viola");
        if let Err(err) = conditions::update_status(
            &api,
            &name,
            true,
            conditions::REASON_SYNCED,
            &format!("synced {} node(s)", to_send.len()),
            retry_patch,
            now,
        )
        .await
        {
            error!(name = %name, error = %err, "status update failed");
        }

        let delay = scheduler::next_requeue(
            now,
            true,
            Some(now),
            settings.poll_fast_window,
            settings.poll_fast_interval,
            settings.poll_slow_interval,
        );
        Action::requeue(delay)
    }

    /// Record a failed stage in status and requeue after the error interval.
    async fn fail(
        &self,
        api: &Api<OpenstackConfig>,
        name: &str,
        reason: &str,
        message: &str,
        interval: Duration,
        now: DateTime<Utc>,
    ) -> Action {
        if let Err(err) = conditions::update_status(
            api,
            name,
            false,
            reason,
            message,
            DownRetryPatch::Keep,
            now,
        )
        .await
        {
            error!(name, error = %err, "status update failed");
        }
        Action::requeue(interval)
    }

    /// Resolve the AES key from the referenced Secret, if any.
    async fn resolve_encrypt_key(
        &self,
        namespace: &str,
        secrets: Option<&OpenstackConfigSecrets>,
    ) -> Result<Option<String>, ControllerError> {
        let Some(secret_ref) = secrets.and_then(|s| s.contrabass_encrypt_key_secret_ref.as_ref())
        else {
            return Ok(None);
        };
        let api: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        let secret = api.get(&secret_ref.name).await?;
        let data = secret.data.unwrap_or_default();
        let value = data.get(&secret_ref.key).ok_or_else(|| {
            ControllerError::InvalidConfig(format!(
                "secret {}/{} has no key {:?}",
                namespace, secret_ref.name, secret_ref.key
            ))
        })?;
        let key = String::from_utf8(value.0.clone()).map_err(|_| {
            ControllerError::InvalidConfig(format!(
                "secret {}/{} key {:?} is not valid UTF-8",
                namespace, secret_ref.name, secret_ref.key
            ))
        })?;
        Ok(Some(key))
    }

    /// Map VM IDs to node names via Nova server metadata.
    ///
    /// A missing compute endpoint or a failed server lookup degrades to the
    /// VM ID; projection falls back per entry.
    async fn resolve_node_names(
        &self,
        vm_ids: &[String],
        catalog: &[openstack_client::CatalogEntry],
        token: &str,
        settings: &settings::EffectiveSettings,
        cr_name: &str,
    ) -> HashMap<String, String> {
        let mut name_map = HashMap::new();

        let nova_endpoint = if !settings.nova_endpoint.is_empty() {
            Some(settings.nova_endpoint.clone())
        } else {
            find_endpoint(
                catalog,
                "compute",
                &settings.endpoint_interface,
                &settings.endpoint_region,
            )
        };
        let Some(nova_endpoint) = nova_endpoint else {
            warn!(name = %cr_name, "nova endpoint not found; using VM IDs as node names");
            return name_map;
        };

        let nova = match NovaClient::new(
            &nova_endpoint,
            settings.openstack_timeout,
            settings.openstack_insecure_tls,
        ) {
            Ok(nova) => nova,
            Err(err) => {
                warn!(name = %cr_name, error = %err, "failed to build nova client; using VM IDs as node names");
                return name_map;
            }
        };

        for vm_id in vm_ids {
            match nova.get_server(token, vm_id).await {
                Ok(server) => {
                    let node_name = server
                        .metadata
                        .get(&settings.node_name_metadata_key)
                        .map(String::as_str)
                        .filter(|v| !v.is_empty())
                        .unwrap_or(&server.name)
                        .to_string();
                    if !node_name.is_empty() {
                        name_map.insert(vm_id.clone(), node_name);
                    }
                }
                Err(err) => {
                    warn!(
                        name = %cr_name,
                        vm = %vm_id,
                        error = %err,
                        "nova server lookup failed; falling back to VM ID"
                    );
                }
            }
        }
        name_map
    }

    fn last_change_at(&self, key: &str) -> Option<DateTime<Utc>> {
        let map = self.last_change.read().expect("last change lock poisoned");
        map.get(key).copied()
    }

    fn record_change(&self, key: &str, now: DateTime<Utc>) {
        let mut map = self.last_change.write().expect("last change lock poisoned");
        map.insert(key.to_string(), now);
    }
}
