//! Inventory errors

use thiserror::Error;

/// Errors that can occur while loading or persisting the inventory
#[derive(Debug, Error)]
pub enum InventoryError {
    /// Filesystem error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
