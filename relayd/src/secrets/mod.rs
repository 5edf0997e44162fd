//! Secret store abstraction layer.
//!
//! This module defines the `SecretStore` trait which abstracts durable storage
//! of the integration credential across different backends (file, Vault,
//! in-memory). Each call is an atomic whole-record read or overwrite; there are
//! no partial-field updates, and ordering between concurrent writers is
//! last-writer-wins.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::SecretsConfig;

pub mod file;
pub mod memory;
pub mod vault;

pub use file::FileStore;
pub use memory::MemoryStore;
pub use vault::VaultStore;

/// Create a secret store from configuration.
///
/// This is the single point where config becomes a store instance. The shared
/// HTTP client carries the per-operation timeout for network-backed stores.
/// Adding a new backend requires adding a match arm here.
pub fn create_store(config: &SecretsConfig, http: reqwest::Client) -> Arc<dyn SecretStore> {
    match config {
        SecretsConfig::File(file_config) => Arc::new(FileStore::new(file_config.dir.clone())),
        SecretsConfig::Vault(vault_config) => Arc::new(VaultStore::new(vault_config.clone(), http)),
        SecretsConfig::Memory => Arc::new(MemoryStore::new()),
    }
}

/// Result type for secret store operations
pub type Result<T> = std::result::Result<T, SecretError>;

/// Errors returned by secret store operations.
#[derive(Debug, thiserror::Error)]
pub enum SecretError {
    /// Secret not found in the store
    #[error("Secret not found: '{name}'")]
    NotFound { name: String },

    /// Store is unreachable (network error, I/O failure, auth failure)
    #[error("Secret store unavailable: {detail}")]
    Unavailable { detail: String },

    /// Stored record is malformed (not the expected JSON layout)
    #[error("Invalid secret value for '{name}': {detail}")]
    InvalidValue { name: String, detail: String },
}

/// The persisted integration credential.
///
/// Serialized as a flat JSON object with keys `refresh_token`, `client_id`,
/// `client_secret`, `access_token`, `token_expiry`, and `url`. The access token
/// and its expiry are present together or not at all: both are stamped by a
/// successful renewal and absent before the first one. The refresh token is
/// long-lived and never rotated by this service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialRecord {
    /// Long-lived credential used to obtain new access tokens
    pub refresh_token: String,
    /// OAuth client identifier
    pub client_id: String,
    /// OAuth client secret
    pub client_secret: String,
    /// Short-lived credential authenticating outbound ticket submissions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    /// Expiry of `access_token` in epoch seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_expiry: Option<i64>,
    /// Ticketing endpoint stored alongside the credential
    #[serde(rename = "url", default, skip_serializing_if = "Option::is_none")]
    pub endpoint_url: Option<String>,
}

impl CredentialRecord {
    /// True when the stored access token can still be used at `now` (epoch seconds).
    ///
    /// No clock-skew compensation: a token expiring within network round-trip
    /// time of `now` may still be rejected downstream.
    pub fn has_valid_token(&self, now: i64) -> bool {
        matches!(
            (self.access_token.as_deref(), self.token_expiry),
            (Some(_), Some(expiry)) if expiry > now
        )
    }
}

/// Abstract secret store interface.
///
/// Implementors provide durable, access-controlled storage for one credential
/// record per name.
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Read the whole record stored under `name`.
    async fn load(&self, name: &str) -> Result<CredentialRecord>;

    /// Atomically overwrite the whole record stored under `name`.
    async fn save(&self, name: &str, record: &CredentialRecord) -> Result<()>;
}

#[cfg(test)]
pub(crate) fn test_record() -> CredentialRecord {
    CredentialRecord {
        refresh_token: "1000.refresh.abc".to_string(),
        client_id: "1000.CLIENTID".to_string(),
        client_secret: "clientsecret".to_string(),
        access_token: None,
        token_expiry: None,
        endpoint_url: Some("https://sdpondemand.manageengine.com/api/v3/requests".to_string()),
    }
}
