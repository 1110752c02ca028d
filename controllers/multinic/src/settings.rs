//! Effective settings resolution
//!
//! Operator-level defaults come from environment variables read once at
//! startup; a CR's `spec.settings` block overrides any of them for that CR.
//! Resolution happens once per reconcile tick and any failure surfaces as a
//! `ConfigError` condition.

use crate::error::ControllerError;
use crds::OpenstackConfigSettings;
use std::env;
use std::time::Duration;

pub const DEFAULT_ERROR_INTERVAL: Duration = Duration::from_secs(30);

const DEFAULT_FAST_INTERVAL: Duration = Duration::from_secs(30);
const DEFAULT_SLOW_INTERVAL: Duration = Duration::from_secs(300);
const DEFAULT_FAST_WINDOW: Duration = Duration::from_secs(600);
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_DOWN_FAST_RETRY_MAX: u32 = 3;

/// Operator-level defaults loaded from the environment at startup.
#[derive(Debug, Clone)]
pub struct OperatorDefaults {
    pub contrabass_endpoint: String,
    pub contrabass_encrypt_key: String,
    pub contrabass_timeout: Duration,
    pub contrabass_insecure_tls: bool,
    pub viola_endpoint: String,
    pub viola_timeout: Duration,
    pub viola_insecure_tls: bool,
    pub openstack_timeout: Duration,
    pub openstack_insecure_tls: bool,
    pub neutron_endpoint: String,
    pub nova_endpoint: String,
    pub endpoint_interface: String,
    pub endpoint_region: String,
    pub node_name_metadata_key: String,
}

impl OperatorDefaults {
    /// Load defaults from environment variables (ConfigMap -> env).
    pub fn from_env() -> Self {
        Self {
            contrabass_endpoint: getenv(
                "CONTRABASS_ENDPOINT",
                "https://expert.bf.okestro.cloud",
            ),
            contrabass_encrypt_key: getenv("CONTRABASS_ENCRYPT_KEY", "conbaEncrypt2025"),
            contrabass_timeout: getenv_duration("CONTRABASS_TIMEOUT", DEFAULT_TIMEOUT),
            contrabass_insecure_tls: getenv_bool("CONTRABASS_INSECURE_TLS", true),
            viola_endpoint: getenv(
                "VIOLA_ENDPOINT",
                "http://viola-api.multinic-system.svc.cluster.local",
            ),
            viola_timeout: getenv_duration("VIOLA_TIMEOUT", DEFAULT_TIMEOUT),
            viola_insecure_tls: getenv_bool("VIOLA_INSECURE_TLS", false),
            openstack_timeout: getenv_duration("OPENSTACK_TIMEOUT", DEFAULT_TIMEOUT),
            openstack_insecure_tls: getenv_bool("OPENSTACK_INSECURE_TLS", true),
            neutron_endpoint: getenv("OPENSTACK_NEUTRON_ENDPOINT", ""),
            nova_endpoint: getenv("OPENSTACK_NOVA_ENDPOINT", ""),
            endpoint_interface: getenv("OPENSTACK_ENDPOINT_INTERFACE", "public"),
            endpoint_region: getenv("OPENSTACK_ENDPOINT_REGION", ""),
            node_name_metadata_key: getenv("OPENSTACK_NODE_NAME_METADATA_KEY", "node_name"),
        }
    }
}

/// The settings a single reconcile tick runs with.
#[derive(Debug, Clone)]
pub struct EffectiveSettings {
    pub contrabass_endpoint: String,
    pub contrabass_encrypt_key: String,
    pub contrabass_timeout: Duration,
    pub contrabass_insecure_tls: bool,
    pub viola_endpoint: String,
    pub viola_timeout: Duration,
    pub viola_insecure_tls: bool,
    pub openstack_timeout: Duration,
    pub openstack_insecure_tls: bool,
    /// Neutron endpoint override; empty means resolve from the catalog.
    pub neutron_endpoint: String,
    /// Nova endpoint override; empty means resolve from the catalog.
    pub nova_endpoint: String,
    pub endpoint_interface: String,
    pub endpoint_region: String,
    pub node_name_metadata_key: String,
    /// Uppercased allow-list of port statuses; empty allows all.
    pub port_allowed_statuses: Vec<String>,
    /// Optional per-node interface cap.
    pub interface_limit: Option<usize>,
    pub down_fast_retry_max: u32,
    pub poll_fast_interval: Duration,
    pub poll_slow_interval: Duration,
    pub poll_error_interval: Duration,
    pub poll_fast_window: Duration,
}

/// Merge operator defaults with a CR's settings block.
pub fn resolve(
    defaults: &OperatorDefaults,
    settings: Option<&OpenstackConfigSettings>,
) -> Result<EffectiveSettings, ControllerError> {
    let empty = OpenstackConfigSettings::default();
    let s = settings.unwrap_or(&empty);

    Ok(EffectiveSettings {
        contrabass_endpoint: override_str(&s.contrabass_endpoint, &defaults.contrabass_endpoint),
        contrabass_encrypt_key: override_str(
            &s.contrabass_encrypt_key,
            &defaults.contrabass_encrypt_key,
        ),
        contrabass_timeout: override_duration(
            "contrabassTimeout",
            &s.contrabass_timeout,
            defaults.contrabass_timeout,
        )?,
        contrabass_insecure_tls: s
            .contrabass_insecure_tls
            .unwrap_or(defaults.contrabass_insecure_tls),
        viola_endpoint: override_str(&s.viola_endpoint, &defaults.viola_endpoint),
        viola_timeout: override_duration("violaTimeout", &s.viola_timeout, defaults.viola_timeout)?,
        viola_insecure_tls: s.viola_insecure_tls.unwrap_or(defaults.viola_insecure_tls),
        openstack_timeout: override_duration(
            "openstackTimeout",
            &s.openstack_timeout,
            defaults.openstack_timeout,
        )?,
        openstack_insecure_tls: s
            .openstack_insecure_tls
            .unwrap_or(defaults.openstack_insecure_tls),
        neutron_endpoint: override_str(&s.openstack_neutron_endpoint, &defaults.neutron_endpoint),
        nova_endpoint: override_str(&s.openstack_nova_endpoint, &defaults.nova_endpoint),
        endpoint_interface: override_str(
            &s.openstack_endpoint_interface,
            &defaults.endpoint_interface,
        ),
        endpoint_region: override_str(&s.openstack_endpoint_region, &defaults.endpoint_region),
        node_name_metadata_key: override_str(
            &s.openstack_node_name_metadata_key,
            &defaults.node_name_metadata_key,
        ),
        port_allowed_statuses: s
            .openstack_port_allowed_statuses
            .as_deref()
            .unwrap_or_default()
            .iter()
            .map(|status| status.trim().to_uppercase())
            .filter(|status| !status.is_empty())
            .collect(),
        interface_limit: match s.openstack_interface_limit {
            Some(0) => {
                return Err(ControllerError::InvalidConfig(
                    "openstackInterfaceLimit must be at least 1".to_string(),
                ))
            }
            Some(n) => Some(n as usize),
            None => None,
        },
        down_fast_retry_max: match s.down_port_fast_retry_max {
            Some(0) => {
                return Err(ControllerError::InvalidConfig(
                    "downPortFastRetryMax must be at least 1".to_string(),
                ))
            }
            Some(n) => n,
            None => DEFAULT_DOWN_FAST_RETRY_MAX,
        },
        poll_fast_interval: override_duration(
            "pollFastInterval",
            &s.poll_fast_interval,
            DEFAULT_FAST_INTERVAL,
        )?,
        poll_slow_interval: override_duration(
            "pollSlowInterval",
            &s.poll_slow_interval,
            DEFAULT_SLOW_INTERVAL,
        )?,
        poll_error_interval: override_duration(
            "pollErrorInterval",
            &s.poll_error_interval,
            DEFAULT_ERROR_INTERVAL,
        )?,
        poll_fast_window: override_duration(
            "pollFastWindow",
            &s.poll_fast_window,
            DEFAULT_FAST_WINDOW,
        )?,
    })
}

fn override_str(value: &Option<String>, default: &str) -> String {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => v.to_string(),
        _ => default.to_string(),
    }
}

fn override_duration(
    field: &str,
    value: &Option<String>,
    default: Duration,
) -> Result<Duration, ControllerError> {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => humantime::parse_duration(v).map_err(|e| {
            ControllerError::InvalidConfig(format!("invalid duration for {}: {}", field, e))
        }),
        _ => Ok(default),
    }
}

fn getenv(key: &str, default: &str) -> String {
    match env::var(key) {
        Ok(v) if !v.is_empty() => v,
        _ => default.to_string(),
    }
}

fn getenv_bool(key: &str, default: bool) -> bool {
    match env::var(key) {
        Ok(v) if !v.is_empty() => v.parse().unwrap_or(default),
        _ => default,
    }
}

fn getenv_duration(key: &str, default: Duration) -> Duration {
    match env::var(key) {
        Ok(v) if !v.is_empty() => humantime::parse_duration(&v).unwrap_or(default),
        _ => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defaults() -> OperatorDefaults {
        OperatorDefaults {
            contrabass_endpoint: "https://contrabass.example".to_string(),
            contrabass_encrypt_key: "0123456789abcdef".to_string(),
            contrabass_timeout: DEFAULT_TIMEOUT,
            contrabass_insecure_tls: true,
            viola_endpoint: "http://viola.example".to_string(),
            viola_timeout: DEFAULT_TIMEOUT,
            viola_insecure_tls: false,
            openstack_timeout: DEFAULT_TIMEOUT,
            openstack_insecure_tls: true,
            neutron_endpoint: String::new(),
            nova_endpoint: String::new(),
            endpoint_interface: "public".to_string(),
            endpoint_region: String::new(),
            node_name_metadata_key: "node_name".to_string(),
        }
    }

    #[test]
    fn defaults_apply_without_cr_settings() {
        let resolved = resolve(&defaults(), None).unwrap();
        assert_eq!(resolved.contrabass_endpoint, "https://contrabass.example");
        assert_eq!(resolved.poll_fast_interval, DEFAULT_FAST_INTERVAL);
        assert_eq!(resolved.poll_slow_interval, DEFAULT_SLOW_INTERVAL);
        assert_eq!(resolved.poll_error_interval, DEFAULT_ERROR_INTERVAL);
        assert_eq!(resolved.down_fast_retry_max, DEFAULT_DOWN_FAST_RETRY_MAX);
        assert!(resolved.port_allowed_statuses.is_empty());
        assert!(resolved.interface_limit.is_none());
    }

    #[test]
    fn cr_settings_override_defaults() {
        let settings = OpenstackConfigSettings {
            viola_endpoint: Some("http://viola.override".to_string()),
            poll_fast_interval: Some("10s".to_string()),
            poll_slow_interval: Some("2m".to_string()),
            down_port_fast_retry_max: Some(5),
            openstack_port_allowed_statuses: Some(vec!["active".to_string(), "down".to_string()]),
            openstack_interface_limit: Some(10),
            ..Default::default()
        };
        let resolved = resolve(&defaults(), Some(&settings)).unwrap();
        assert_eq!(resolved.viola_endpoint, "http://viola.override");
        assert_eq!(resolved.poll_fast_interval, Duration::from_secs(10));
        assert_eq!(resolved.poll_slow_interval, Duration::from_secs(120));
        assert_eq!(resolved.down_fast_retry_max, 5);
        assert_eq!(resolved.port_allowed_statuses, vec!["ACTIVE", "DOWN"]);
        assert_eq!(resolved.interface_limit, Some(10));
    }

    #[test]
    fn blank_override_falls_back_to_default() {
        let settings = OpenstackConfigSettings {
            viola_endpoint: Some("   ".to_string()),
            ..Default::default()
        };
        let resolved = resolve(&defaults(), Some(&settings)).unwrap();
        assert_eq!(resolved.viola_endpoint, "http://viola.example");
    }

    #[test]
    fn invalid_duration_is_a_config_error() {
        let settings = OpenstackConfigSettings {
            poll_fast_interval: Some("not-a-duration".to_string()),
            ..Default::default()
        };
        let err = resolve(&defaults(), Some(&settings)).unwrap_err();
        assert!(matches!(err, ControllerError::InvalidConfig(_)));
    }

    #[test]
    fn zero_retry_max_is_rejected() {
        let settings = OpenstackConfigSettings {
            down_port_fast_retry_max: Some(0),
            ..Default::default()
        };
        assert!(matches!(
            resolve(&defaults(), Some(&settings)),
            Err(ControllerError::InvalidConfig(_))
        ));
    }
}
