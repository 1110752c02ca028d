//! OpenStack client errors

use thiserror::Error;

/// Errors that can occur when talking to Keystone, Neutron or Nova
#[derive(Debug, Error)]
pub enum OpenstackError {
    /// HTTP request/response error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The API returned an unexpected status
    #[error("OpenStack API error: {0}")]
    Api(String),

    /// Authentication succeeded at the HTTP layer but the response was unusable
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),
}
