use super::{StoredTicket, TicketStore};
use crate::errors::{RecoveryHint, RegistryError, Result};
use async_trait::async_trait;
use cas_utils::{remove_if_exists, sharded_path, write_atomic};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

const EXTENSION: &str = "ticket";

/// On-disk record; the key is kept so the directory can be listed
#[derive(Serialize, Deserialize)]
struct FileRecord {
    key: String,
    /// Unix milliseconds after which the record is ignored
    expires_at: Option<i64>,
    bytes: Vec<u8>,
}

/// Directory of transcoded tickets sharded by key hash.
///
/// Survives restarts and can be shared between processes on one host.
#[derive(Debug, Clone)]
pub struct FileTicketStore {
    base_dir: PathBuf,
}

impl FileTicketStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Result<Self> {
        let base_dir = base_dir.into();
        std::fs::create_dir_all(&base_dir).map_err(|e| RegistryError::Io {
            path: base_dir.clone(),
            operation: "create ticket directory",
            source: e,
            recovery_hint: RecoveryHint::CheckPermissions {
                path: base_dir.clone(),
            },
        })?;
        Ok(Self { base_dir })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        sharded_path(&self.base_dir, key, EXTENSION)
    }

    async fn read_record(&self, path: &Path) -> Result<Option<FileRecord>> {
        let content = match tokio::fs::read(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(RegistryError::Io {
                    path: path.to_path_buf(),
                    operation: "read ticket file",
                    source: e,
                    recovery_hint: RecoveryHint::CheckPermissions {
                        path: path.to_path_buf(),
                    },
                })
            }
        };
        let record: FileRecord = bincode::deserialize(&content).map_err(|e| RegistryError::Corruption {
            key: path.display().to_string(),
            reason: e.to_string(),
            recovery_hint: RecoveryHint::Evict,
        })?;

        if record
            .expires_at
            .is_some_and(|deadline| Utc::now().timestamp_millis() >= deadline)
        {
            debug!(key = %record.key, "dropping ticket file past its TTL");
            remove_file(path).await?;
            return Ok(None);
        }
        Ok(Some(record))
    }

    /// Every ticket file under the base directory, skipping temporary files
    async fn ticket_files(&self) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        let mut shards = match tokio::fs::read_dir(&self.base_dir).await {
            Ok(shards) => shards,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(files),
            Err(e) => return Err(io_error(&self.base_dir, "list ticket directory", e)),
        };
        while let Some(shard) = shards
            .next_entry()
            .await
            .map_err(|e| io_error(&self.base_dir, "list ticket directory", e))?
        {
            let shard_path = shard.path();
            if !shard_path.is_dir() {
                continue;
            }
            let mut tickets = tokio::fs::read_dir(&shard_path)
                .await
                .map_err(|e| io_error(&shard_path, "list ticket shard", e))?;
            while let Some(entry) = tickets
                .next_entry()
                .await
                .map_err(|e| io_error(&shard_path, "list ticket shard", e))?
            {
                let path = entry.path();
                let hidden = path
                    .file_name()
                    .and_then(|name| name.to_str())
                    .map_or(true, |name| name.starts_with('.'));
                if !hidden && path.extension().is_some_and(|ext| ext == EXTENSION) {
                    files.push(path);
                }
            }
        }
        Ok(files)
    }
}

#[async_trait]
impl TicketStore for FileTicketStore {
    fn name(&self) -> &'static str {
        "file"
    }

    fn is_binary(&self) -> bool {
        true
    }

    async fn put(&self, key: &str, entry: StoredTicket, ttl: Option<Duration>) -> Result<()> {
        let StoredTicket::Encoded(bytes) = entry else {
            return Err(RegistryError::InvalidEntry {
                key: key.to_string(),
                reason: "file store only holds encoded tickets".to_string(),
                recovery_hint: RecoveryHint::Manual {
                    instructions: "route tickets through the transcoder".to_string(),
                },
            });
        };
        let expires_at = ttl.map(|ttl| {
            let ttl_millis = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
            Utc::now().timestamp_millis().saturating_add(ttl_millis)
        });
        let record = FileRecord {
            key: key.to_string(),
            expires_at,
            bytes,
        };
        let content = bincode::serialize(&record)?;
        let path = self.path_for(key);

        let target = path.clone();
        tokio::task::spawn_blocking(move || write_atomic(&target, &content))
            .await
            .map_err(|e| RegistryError::StoreUnavailable {
                store: "file",
                reason: format!("write task failed: {e}"),
                recovery_hint: RecoveryHint::Retry {
                    after: Duration::from_millis(50),
                },
            })?
            .map_err(|e| RegistryError::StoreUnavailable {
                store: "file",
                reason: e.to_string(),
                recovery_hint: RecoveryHint::CheckPermissions { path },
            })
    }

    async fn get(&self, key: &str) -> Result<Option<StoredTicket>> {
        let path = self.path_for(key);
        match self.read_record(&path).await {
            Ok(record) => Ok(record
                .filter(|record| record.key == key)
                .map(|record| StoredTicket::Encoded(record.bytes))),
            Err(e) if e.is_corruption() => {
                warn!(key = %key, error = %e, "removing unreadable ticket file");
                remove_file(&path).await?;
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    async fn remove(&self, key: &str) -> Result<bool> {
        remove_file(&self.path_for(key)).await
    }

    async fn clear(&self) -> Result<usize> {
        let mut removed = 0;
        for path in self.ticket_files().await? {
            if remove_file(&path).await? {
                removed += 1;
            }
        }
        Ok(removed)
    }

    async fn entries(&self) -> Result<Vec<(String, StoredTicket)>> {
        let mut entries = Vec::new();
        for path in self.ticket_files().await? {
            match self.read_record(&path).await {
                Ok(Some(record)) => entries.push((record.key, StoredTicket::Encoded(record.bytes))),
                Ok(None) => {}
                Err(e) if e.is_corruption() => {
                    warn!(path = %path.display(), error = %e, "skipping unreadable ticket file");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(entries)
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.entries().await?.len())
    }
}

async fn remove_file(path: &Path) -> Result<bool> {
    let target = path.to_path_buf();
    tokio::task::spawn_blocking(move || remove_if_exists(&target))
        .await
        .map_err(|e| RegistryError::StoreUnavailable {
            store: "file",
            reason: format!("remove task failed: {e}"),
            recovery_hint: RecoveryHint::Retry {
                after: Duration::from_millis(50),
            },
        })?
        .map_err(|e| RegistryError::StoreUnavailable {
            store: "file",
            reason: e.to_string(),
            recovery_hint: RecoveryHint::CheckPermissions {
                path: path.to_path_buf(),
            },
        })
}

fn io_error(path: &Path, operation: &'static str, source: std::io::Error) -> RegistryError {
    RegistryError::Io {
        path: path.to_path_buf(),
        operation,
        source,
        recovery_hint: RecoveryHint::CheckPermissions {
            path: path.to_path_buf(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_put_get_remove() {
        let dir = TempDir::new().unwrap();
        let store = FileTicketStore::new(dir.path()).unwrap();

        store
            .put("TGT-1", StoredTicket::Encoded(vec![1, 2, 3]), None)
            .await
            .unwrap();
        assert_eq!(
            store.get("TGT-1").await.unwrap(),
            Some(StoredTicket::Encoded(vec![1, 2, 3]))
        );
        assert!(store.remove("TGT-1").await.unwrap());
        assert!(!store.remove("TGT-1").await.unwrap());
        assert_eq!(store.get("TGT-1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_entries_survive_reopen() {
        let dir = TempDir::new().unwrap();
        {
            let store = FileTicketStore::new(dir.path()).unwrap();
            for i in 0..5 {
                store
                    .put(&format!("ST-{i}"), StoredTicket::Encoded(vec![i]), None)
                    .await
                    .unwrap();
            }
        }
        let reopened = FileTicketStore::new(dir.path()).unwrap();
        let mut keys: Vec<String> = reopened
            .entries()
            .await
            .unwrap()
            .into_iter()
            .map(|(key, _)| key)
            .collect();
        keys.sort();
        assert_eq!(keys, vec!["ST-0", "ST-1", "ST-2", "ST-3", "ST-4"]);
        assert_eq!(reopened.clear().await.unwrap(), 5);
        assert_eq!(reopened.len().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_expired_records_are_dropped() {
        let dir = TempDir::new().unwrap();
        let store = FileTicketStore::new(dir.path()).unwrap();
        store
            .put("ST-1", StoredTicket::Encoded(vec![1]), Some(Duration::ZERO))
            .await
            .unwrap();
        assert_eq!(store.get("ST-1").await.unwrap(), None);
        assert!(!store.path_for("ST-1").exists());
    }

    #[tokio::test]
    async fn test_garbage_file_is_evicted() {
        let dir = TempDir::new().unwrap();
        let store = FileTicketStore::new(dir.path()).unwrap();
        let path = store.path_for("ST-1");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, b"\xff").unwrap();

        assert_eq!(store.get("ST-1").await.unwrap(), None);
        assert!(!path.exists());
    }
}
