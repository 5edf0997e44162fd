//! In-memory secret store for tests and local development.
//!
//! Not durable: records live only as long as the process. The store can be
//! switched into an unavailable state to exercise store-failure paths.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;

use super::{CredentialRecord, Result, SecretError, SecretStore};

#[derive(Default)]
pub struct MemoryStore {
    records: RwLock<HashMap<String, CredentialRecord>>,
    unavailable: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with one record.
    pub fn with_record(name: &str, record: CredentialRecord) -> Self {
        Self {
            records: RwLock::new(HashMap::from([(name.to_string(), record)])),
            unavailable: AtomicBool::new(false),
        }
    }

    /// Make every subsequent call fail with `Unavailable`.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(SecretError::Unavailable {
                detail: "memory store marked unavailable".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl SecretStore for MemoryStore {
    async fn load(&self, name: &str) -> Result<CredentialRecord> {
        self.check_available()?;
        self.records
            .read()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| SecretError::NotFound { name: name.to_string() })
    }

    async fn save(&self, name: &str, record: &CredentialRecord) -> Result<()> {
        self.check_available()?;
        self.records.write().await.insert(name.to_string(), record.clone());
        Ok(())
    }
}
