//! Viola client errors

use thiserror::Error;

/// Errors that can occur when dispatching to the Viola API
#[derive(Debug, Error)]
pub enum ViolaError {
    /// HTTP request/response error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Viola API returned an unexpected status
    #[error("Viola API error: {0}")]
    Api(String),

    /// JSON serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
