//! Multinic operator CRD definitions
//!
//! Kubernetes Custom Resource Definitions for the multinic operator.

pub mod openstack_config;

pub use openstack_config::*;
