//! Resource Tracker
//!
//! Remembers the provider identifiers each resource produced on create, keyed
//! by physical identity, so later deletes and updates can find them even when
//! an earlier attempt was interrupted.

use crate::error::{ProvisionError, TrackerError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

/// Provider identifiers needed to manage a resource after creation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedEntry {
    pub resource_type: String,
    pub identifiers: BTreeMap<String, String>,
    pub tracked_at: DateTime<Utc>,
}

impl TrackedEntry {
    pub fn new(resource_type: &str) -> Self {
        Self {
            resource_type: resource_type.to_string(),
            identifiers: BTreeMap::new(),
            tracked_at: Utc::now(),
        }
    }

    pub fn with(mut self, key: &str, value: impl Into<String>) -> Self {
        self.identifiers.insert(key.to_string(), value.into());
        self
    }

    /// Look up a required identifier
    pub fn identifier(&self, key: &str) -> Result<&str, ProvisionError> {
        self.identifiers
            .get(key)
            .map(String::as_str)
            .ok_or_else(|| ProvisionError::MissingIdentifier {
                resource_type: self.resource_type.clone(),
                key: key.to_string(),
            })
    }
}

/// Keyed store of tracked entries
#[async_trait]
pub trait ResourceTracker: Send + Sync {
    async fn get(&self, identity: &str) -> Result<Option<TrackedEntry>, TrackerError>;
    async fn put(&self, identity: &str, entry: &TrackedEntry) -> Result<(), TrackerError>;
    async fn delete(&self, identity: &str) -> Result<(), TrackerError>;
}

#[async_trait]
impl<T: ResourceTracker + ?Sized> ResourceTracker for Arc<T> {
    async fn get(&self, identity: &str) -> Result<Option<TrackedEntry>, TrackerError> {
        (**self).get(identity).await
    }

    async fn put(&self, identity: &str, entry: &TrackedEntry) -> Result<(), TrackerError> {
        (**self).put(identity, entry).await
    }

    async fn delete(&self, identity: &str) -> Result<(), TrackerError> {
        (**self).delete(identity).await
    }
}

/// In-process tracker, used for dry runs and tests
#[derive(Debug, Default)]
pub struct MemoryTracker {
    entries: RwLock<HashMap<String, TrackedEntry>>,
}

impl MemoryTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl ResourceTracker for MemoryTracker {
    async fn get(&self, identity: &str) -> Result<Option<TrackedEntry>, TrackerError> {
        Ok(self.entries.read().await.get(identity).cloned())
    }

    async fn put(&self, identity: &str, entry: &TrackedEntry) -> Result<(), TrackerError> {
        self.entries
            .write()
            .await
            .insert(identity.to_string(), entry.clone());
        Ok(())
    }

    async fn delete(&self, identity: &str) -> Result<(), TrackerError> {
        self.entries.write().await.remove(identity);
        Ok(())
    }
}

/// Tracker persisted as a JSON document on disk
///
/// Every write replaces the whole file through a temporary sibling and a
/// rename, so a crash mid-write leaves the previous state readable.
#[derive(Debug)]
pub struct FileTracker {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileTracker {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<BTreeMap<String, TrackedEntry>, TrackerError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) if content.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn store(&self, entries: &BTreeMap<String, TrackedEntry>) -> Result<(), TrackerError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let content = serde_json::to_string_pretty(entries)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, content).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl ResourceTracker for FileTracker {
    async fn get(&self, identity: &str) -> Result<Option<TrackedEntry>, TrackerError> {
        let _guard = self.lock.lock().await;
        Ok(self.load().await?.remove(identity))
    }

    async fn put(&self, identity: &str, entry: &TrackedEntry) -> Result<(), TrackerError> {
        let _guard = self.lock.lock().await;
        let mut entries = self.load().await?;
        entries.insert(identity.to_string(), entry.clone());
        self.store(&entries).await?;
        tracing::debug!("Tracked {} in {:?}", identity, self.path);
        Ok(())
    }

    async fn delete(&self, identity: &str) -> Result<(), TrackerError> {
        let _guard = self.lock.lock().await;
        let mut entries = self.load().await?;
        if entries.remove(identity).is_some() {
            self.store(&entries).await?;
            tracing::debug!("Untracked {} in {:?}", identity, self.path);
        }
        Ok(())
    }
}
