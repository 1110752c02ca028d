//! Contrabass client errors

use thiserror::Error;

/// Errors that can occur when resolving a provider from Contrabass
#[derive(Debug, Error)]
pub enum ContrabassError {
    /// HTTP request/response error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Contrabass API returned an unexpected status
    #[error("Contrabass API error: {0}")]
    Api(String),

    /// Credential decryption failed
    #[error("Decrypt error: {0}")]
    Decrypt(#[from] crate::crypto::CryptoError),
}
