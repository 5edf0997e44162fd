//! File-backed secret store.
//!
//! Stores one JSON file per secret name under a base directory, suitable for
//! volume-mounted secrets or single-host deployments. Writes go to a temporary
//! file in the same directory followed by a rename, so a concurrent reader
//! never observes a partially written record.

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

use super::{CredentialRecord, Result, SecretError, SecretStore};

/// Distinguishes temp files written by concurrent saves within one process.
static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Secret store that keeps each record in `<dir>/<name>.json`.
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.json"))
    }
}

#[async_trait]
impl SecretStore for FileStore {
    async fn load(&self, name: &str) -> Result<CredentialRecord> {
        let bytes = match tokio::fs::read(self.path(name)).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(SecretError::NotFound { name: name.to_string() });
            }
            Err(e) => {
                return Err(SecretError::Unavailable {
                    detail: format!("failed to read secret file: {e}"),
                });
            }
        };

        serde_json::from_slice(&bytes).map_err(|e| SecretError::InvalidValue {
            name: name.to_string(),
            detail: e.to_string(),
        })
    }

    async fn save(&self, name: &str, record: &CredentialRecord) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(record).map_err(|e| SecretError::InvalidValue {
            name: name.to_string(),
            detail: e.to_string(),
        })?;

        let path = self.path(name);
        // Unique per writer: concurrent saves of the same record must not
        // share a temp file, or the loser's rename fails after the winner's
        let tmp_path = self.dir.join(format!(
            ".{name}.json.{}.{}.tmp",
            std::process::id(),
            TMP_COUNTER.fetch_add(1, Ordering::Relaxed)
        ));

        tokio::fs::write(&tmp_path, &bytes).await.map_err(|e| SecretError::Unavailable {
            detail: format!("failed to write secret file: {e}"),
        })?;

        // Rename within the same directory is atomic on POSIX filesystems
        tokio::fs::rename(&tmp_path, &path).await.map_err(|e| SecretError::Unavailable {
            detail: format!("failed to replace secret file: {e}"),
        })?;

        tracing::debug!(path = %path.display(), "Persisted credential record");
        Ok(())
    }
}
