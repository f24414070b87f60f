// # Memory Cache Storage
//
// In-memory implementation of CacheStorage.
//
// ## Purpose
//
// Keeps the serialized cache in memory. Nothing survives a restart, so a
// fresh process always starts with a cold-start rebuild. Useful for tests
// and for embedding the updater where a cache file is not wanted.
//
// The cache is held in its serialized form so reads go through the same
// parse path as the file storage, including malformed-content handling.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::cache::RecordCache;
use crate::traits::CacheStorage;
use crate::Error;

/// In-memory record cache storage
#[derive(Debug, Clone, Default)]
pub struct MemoryCacheStorage {
    inner: Arc<RwLock<Option<String>>>,
}

impl MemoryCacheStorage {
    /// Create an empty storage (reads as "nothing persisted")
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a storage pre-populated with a cache
    pub fn with_cache(cache: &RecordCache) -> Result<Self, Error> {
        let json = serde_json::to_string(cache)?;
        Ok(Self {
            inner: Arc::new(RwLock::new(Some(json))),
        })
    }

    /// Replace the stored content with raw, possibly invalid, text
    pub async fn set_malformed(&self, content: impl Into<String>) {
        *self.inner.write().await = Some(content.into());
    }

    /// Forget the stored cache
    pub async fn clear(&self) {
        *self.inner.write().await = None;
    }
}

#[async_trait]
impl CacheStorage for MemoryCacheStorage {
    async fn read(&self) -> Result<Option<RecordCache>, Error> {
        let guard = self.inner.read().await;
        match guard.as_deref() {
            None => Ok(None),
            Some(content) => serde_json::from_str(content)
                .map(Some)
                .map_err(|e| Error::malformed_cache("memory", e.to_string())),
        }
    }

    async fn write(&self, cache: &RecordCache) -> Result<(), Error> {
        let json = serde_json::to_string(cache)?;
        *self.inner.write().await = Some(json);
        Ok(())
    }

    fn location(&self) -> String {
        "memory".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::DomainRecord;

    #[tokio::test]
    async fn memory_storage_round_trip() {
        let storage = MemoryCacheStorage::new();
        assert_eq!(storage.read().await.unwrap(), None);

        let cache = RecordCache::new(vec![DomainRecord::new("a.example.com", ["1.1.1.1"])]);
        storage.write(&cache).await.unwrap();
        assert_eq!(storage.read().await.unwrap(), Some(cache));

        storage.clear().await;
        assert_eq!(storage.read().await.unwrap(), None);
    }

    #[tokio::test]
    async fn clones_share_content() {
        let storage = MemoryCacheStorage::new();
        let clone = storage.clone();

        storage.set_malformed("{").await;
        assert!(clone.read().await.unwrap_err().is_malformed_cache());
    }
}
