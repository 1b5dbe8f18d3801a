//! JSON-file backed store.

use super::{KvStore, StoreError};
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Keeps every entry in memory and writes the whole map through to a JSON
/// file on each change.
///
/// Writes go to a temporary sibling first and are renamed over the target,
/// so a crash never leaves a half-written file behind. The in-memory map only
/// changes once the file has been replaced.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    /// `None` once closed.
    entries: RwLock<Option<BTreeMap<String, Bytes>>>,
}

impl FileStore {
    /// Open the store at `path`, creating it lazily on first write.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let entries = match tokio::fs::read(&path).await {
            Ok(content) if content.iter().all(u8::is_ascii_whitespace) => BTreeMap::new(),
            Ok(content) => {
                let raw: BTreeMap<String, Vec<u8>> = serde_json::from_slice(&content)?;
                raw.into_iter().map(|(k, v)| (k, Bytes::from(v))).collect()
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };
        info!(path = %path.display(), entries = entries.len(), "file store opened");

        Ok(Self {
            path,
            entries: RwLock::new(Some(entries)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(&self, entries: &BTreeMap<String, Bytes>) -> Result<(), StoreError> {
        let raw: BTreeMap<&str, &[u8]> = entries
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_ref()))
            .collect();
        let content = serde_json::to_vec(&raw)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let temp_path = self.path.with_extension("json.tmp");
        tokio::fs::write(&temp_path, content).await?;
        tokio::fs::rename(&temp_path, &self.path).await?;

        debug!(path = %self.path.display(), entries = entries.len(), "file store persisted");
        Ok(())
    }
}

#[async_trait]
impl KvStore for FileStore {
    async fn set(&self, key: &str, value: Bytes) -> Result<(), StoreError> {
        let mut guard = self.entries.write().await;
        let entries = guard.as_mut().ok_or(StoreError::Closed)?;
        let mut next = entries.clone();
        next.insert(key.to_string(), value);
        self.persist(&next).await?;
        *entries = next;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Bytes, StoreError> {
        let guard = self.entries.read().await;
        let entries = guard.as_ref().ok_or(StoreError::Closed)?;
        entries
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut guard = self.entries.write().await;
        let entries = guard.as_mut().ok_or(StoreError::Closed)?;
        if !entries.contains_key(key) {
            return Ok(());
        }
        let mut next = entries.clone();
        next.remove(key);
        self.persist(&next).await?;
        *entries = next;
        Ok(())
    }

    async fn close(&self) -> Result<(), StoreError> {
        let mut guard = self.entries.write().await;
        if let Some(entries) = guard.take() {
            self.persist(&entries).await?;
        }
        Ok(())
    }
}
