//! HashiCorp Vault KV v2 secret store.
//!
//! Talks to `/v1/<mount>/data/<name>` with token authentication. The KV v2 API
//! wraps both reads and writes in a `data` envelope; reads come back as
//! `{"data": {"data": {...record...}}}` and writes are posted as
//! `{"data": {...record...}}`.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use super::{CredentialRecord, Result, SecretError, SecretStore};
use crate::config::VaultStoreConfig;

const VAULT_TOKEN_HEADER: &str = "X-Vault-Token";

/// Secret store backed by a Vault KV v2 mount.
pub struct VaultStore {
    client: reqwest::Client,
    address: String,
    mount: String,
    token: String,
}

impl std::fmt::Debug for VaultStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaultStore")
            .field("address", &self.address)
            .field("mount", &self.mount)
            .finish()
    }
}

#[derive(Deserialize)]
struct KvReadResponse {
    data: KvReadData,
}

#[derive(Deserialize)]
struct KvReadData {
    data: CredentialRecord,
}

impl VaultStore {
    pub fn new(config: VaultStoreConfig, client: reqwest::Client) -> Self {
        Self {
            client,
            address: config.address.trim_end_matches('/').to_string(),
            mount: config.mount,
            token: config.token,
        }
    }

    fn data_url(&self, name: &str) -> String {
        format!("{}/v1/{}/data/{}", self.address, self.mount, name)
    }
}

#[async_trait]
impl SecretStore for VaultStore {
    async fn load(&self, name: &str) -> Result<CredentialRecord> {
        let response = self
            .client
            .get(self.data_url(name))
            .header(VAULT_TOKEN_HEADER, &self.token)
            .send()
            .await
            .map_err(|e| SecretError::Unavailable {
                detail: format!("Vault read failed: {e}"),
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(SecretError::NotFound { name: name.to_string() });
        }
        if !status.is_success() {
            return Err(SecretError::Unavailable {
                detail: format!("Vault read returned HTTP {status}"),
            });
        }

        let parsed: KvReadResponse = response.json().await.map_err(|e| SecretError::InvalidValue {
            name: name.to_string(),
            detail: format!("unexpected Vault response: {e}"),
        })?;

        Ok(parsed.data.data)
    }

    async fn save(&self, name: &str, record: &CredentialRecord) -> Result<()> {
        let response = self
            .client
            .post(self.data_url(name))
            .header(VAULT_TOKEN_HEADER, &self.token)
            .json(&json!({ "data": record }))
            .send()
            .await
            .map_err(|e| SecretError::Unavailable {
                detail: format!("Vault write failed: {e}"),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(SecretError::Unavailable {
                detail: format!("Vault write returned HTTP {status}"),
            });
        }

        tracing::debug!(mount = %self.mount, "Persisted credential record to Vault");
        Ok(())
    }
}
