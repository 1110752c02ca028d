//! Viola dispatch API client
//!
//! Posts per-node interface configuration batches to the Viola API, which
//! materializes them as MultiNicNodeConfig resources in the worker cluster.

pub mod client;
pub mod error;
pub mod models;

pub use client::ViolaClient;
pub use error::ViolaError;
pub use models::{NodeConfig, NodeInterface};
