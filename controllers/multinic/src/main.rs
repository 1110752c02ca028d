//! Multinic Controller
//!
//! Watches OpenstackConfig CRs, discovers the ports of the declared VM
//! instances from OpenStack, projects them into per-node interface
//! configuration, and dispatches only the changed nodes to the Viola API.
//! A small read-only HTTP API exposes the last dispatched state per node.

mod conditions;
mod controller;
mod error;
mod reconciler;
mod settings;
mod watcher;

use crate::error::ControllerError;
use controller::Controller;
use settings::OperatorDefaults;
use std::env;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), ControllerError> {
    tracing_subscriber::fmt::init();

    info!("Starting multinic controller");

    let namespace = env::var("WATCH_NAMESPACE").ok();
    let inventory_path = match env::var("INVENTORY_PATH") {
        Ok(path) if path.is_empty() => None,
        Ok(path) => Some(path),
        Err(_) => Some("/var/lib/multinic/inventory.json".to_string()),
    };
    let inventory_listen_addr =
        env::var("INVENTORY_LISTEN_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());
    let defaults = OperatorDefaults::from_env();

    info!(
        namespace = namespace.as_deref().unwrap_or("default"),
        inventory = inventory_path.as_deref().unwrap_or("disabled"),
        listen = %inventory_listen_addr,
        "Configuration loaded"
    );

    let controller = Controller::new(namespace, defaults, inventory_path, inventory_listen_addr).await?;
    controller.run().await?;

    Ok(())
}
