//! Controller-specific error types.
//!
//! Cloud and dispatch failures never escape a reconcile tick; they are
//! recorded into the CR status with a stage reason instead. This enum covers
//! the failures that do propagate: wiring, configuration and persistence.

use inventory::InventoryError;
use thiserror::Error;

/// Errors that can occur in the multinic controller.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// Kubernetes API error
    #[error("Kubernetes error: {0}")]
    Kube(#[from] kube::Error),

    /// Inventory persistence error
    #[error("Inventory error: {0}")]
    Inventory(#[from] InventoryError),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Resource watch failed
    #[error("Resource watch failed: {0}")]
    Watch(String),
}
