use std::{
    collections::{BTreeMap, HashMap},
    path::PathBuf,
    sync::{Arc, Mutex, PoisonError},
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, error};

use crate::{
    error::CheckpointError,
    fs::operations::{read_locked, write_atomically},
    utils::time::{decode_instant, encode_instant},
};

/// Key the session start is stored under unless configured otherwise.
pub const DEFAULT_CHECKPOINT_KEY: &str = "EditorTimeTracker_StartTime";

/// A small key/value store that outlives the tracked process. Values are instants, stored in a
/// format that round-trips sub-second precision and the offset.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    async fn has(&self, key: &str) -> Result<bool, CheckpointError>;

    /// Fails with [CheckpointError::NotFound] when nothing is stored under `key`.
    async fn get(&self, key: &str) -> Result<DateTime<Utc>, CheckpointError>;

    async fn set(&self, key: &str, instant: DateTime<Utc>) -> Result<(), CheckpointError>;

    /// Removing an absent key is a no-op.
    async fn delete(&self, key: &str) -> Result<(), CheckpointError>;
}

#[async_trait]
impl<T: CheckpointStore + ?Sized> CheckpointStore for Arc<T> {
    async fn has(&self, key: &str) -> Result<bool, CheckpointError> {
        self.as_ref().has(key).await
    }

    async fn get(&self, key: &str) -> Result<DateTime<Utc>, CheckpointError> {
        self.as_ref().get(key).await
    }

    async fn set(&self, key: &str, instant: DateTime<Utc>) -> Result<(), CheckpointError> {
        self.as_ref().set(key, instant).await
    }

    async fn delete(&self, key: &str) -> Result<(), CheckpointError> {
        self.as_ref().delete(key).await
    }
}

fn decode(key: &str, value: String) -> Result<DateTime<Utc>, CheckpointError> {
    decode_instant(&value).map_err(|source| CheckpointError::Malformed {
        key: key.to_string(),
        value,
        source,
    })
}

/// Registry file shared by everything running as the current user. It lives in the user state
/// directory rather than next to the time log.
pub struct FileCheckpointStore {
    path: PathBuf,
    // Serializes read-modify-write cycles within the process.
    write_lock: AsyncMutex<()>,
}

impl FileCheckpointStore {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            write_lock: AsyncMutex::new(()),
        }
    }

    async fn read_entries(&self) -> Result<BTreeMap<String, String>, CheckpointError> {
        match read_locked(&self.path).await? {
            Some(content) if !content.trim().is_empty() => {
                serde_json::from_str(&content).map_err(|e| {
                    error!(
                        "Checkpoint registry {:?} is unreadable, crash recovery is off until it is fixed or removed: {e}",
                        self.path
                    );
                    CheckpointError::Registry(e)
                })
            }
            _ => Ok(BTreeMap::new()),
        }
    }

    async fn write_entries(&self, entries: &BTreeMap<String, String>) -> Result<(), CheckpointError> {
        let content = serde_json::to_vec_pretty(entries)?;
        write_atomically(&self.path, &content).await?;
        Ok(())
    }
}

#[async_trait]
impl CheckpointStore for FileCheckpointStore {
    async fn has(&self, key: &str) -> Result<bool, CheckpointError> {
        Ok(self.read_entries().await?.contains_key(key))
    }

    async fn get(&self, key: &str) -> Result<DateTime<Utc>, CheckpointError> {
        let value = self
            .read_entries()
            .await?
            .remove(key)
            .ok_or_else(|| CheckpointError::NotFound(key.to_string()))?;
        decode(key, value)
    }

    async fn set(&self, key: &str, instant: DateTime<Utc>) -> Result<(), CheckpointError> {
        let _guard = self.write_lock.lock().await;
        let mut entries = self.read_entries().await?;
        entries.insert(key.to_string(), encode_instant(instant));
        debug!("Storing checkpoint {key} in {:?}", self.path);
        self.write_entries(&entries).await
    }

    async fn delete(&self, key: &str) -> Result<(), CheckpointError> {
        let _guard = self.write_lock.lock().await;
        let mut entries = self.read_entries().await?;
        if entries.remove(key).is_none() {
            return Ok(());
        }
        debug!("Removing checkpoint {key} from {:?}", self.path);
        self.write_entries(&entries).await
    }
}

/// Lives only as long as the process. Used for ephemeral runs, where crash recovery is not
/// wanted, and in tests.
#[derive(Default)]
pub struct MemoryCheckpointStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_entries<T>(&self, f: impl FnOnce(&mut HashMap<String, String>) -> T) -> T {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut entries)
    }
}

#[async_trait]
impl CheckpointStore for MemoryCheckpointStore {
    async fn has(&self, key: &str) -> Result<bool, CheckpointError> {
        Ok(self.with_entries(|entries| entries.contains_key(key)))
    }

    async fn get(&self, key: &str) -> Result<DateTime<Utc>, CheckpointError> {
        let value = self
            .with_entries(|entries| entries.get(key).cloned())
            .ok_or_else(|| CheckpointError::NotFound(key.to_string()))?;
        decode(key, value)
    }

    async fn set(&self, key: &str, instant: DateTime<Utc>) -> Result<(), CheckpointError> {
        self.with_entries(|entries| entries.insert(key.to_string(), encode_instant(instant)));
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CheckpointError> {
        self.with_entries(|entries| entries.remove(key));
        Ok(())
    }
}
