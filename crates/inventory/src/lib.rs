//! Durable node-config inventory
//!
//! Records the last successfully dispatched `NodeConfig` per
//! `(provider, node)` so change detection survives operator restarts, and
//! serves a small read-only HTTP API for operators.

pub mod error;
pub mod server;
pub mod store;

pub use error::InventoryError;
pub use server::InventoryServer;
pub use store::{Record, Store};
