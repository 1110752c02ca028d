//! OpenStack API clients
//!
//! Narrow, shape-preserving clients for the three OpenStack services the
//! operator consumes: Keystone (identity + service catalog), Neutron (ports,
//! subnets, networks) and Nova (server metadata). Each client owns its own
//! `reqwest::Client` with a per-call timeout and an optional insecure-TLS
//! mode; endpoints are either injected directly or resolved from the
//! Keystone service catalog via [`find_endpoint`].

pub mod error;
pub mod keystone;
pub mod neutron;
pub mod nova;

pub use error::OpenstackError;
pub use keystone::{find_endpoint, CatalogEndpoint, CatalogEntry, KeystoneClient};
pub use neutron::{FixedIp, Network, NeutronClient, Port, Subnet};
pub use nova::{NovaClient, Server};
