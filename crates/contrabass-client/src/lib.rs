//! Contrabass provider API client
//!
//! Resolves an OpenStack provider record (Keystone URL plus admin and
//! RabbitMQ credentials) from the Contrabass infrastructure API. Sensitive
//! attributes arrive AES-128-CBC encrypted and are decrypted during lookup.

pub mod client;
pub mod crypto;
pub mod error;

pub use client::{ContrabassClient, Provider};
pub use error::ContrabassError;
