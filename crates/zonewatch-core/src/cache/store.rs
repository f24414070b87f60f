//! Record cache store
//!
//! Couples a [`CacheStorage`] with the [`DnsBackend`] it is rebuilt from.
//!
//! ## Failure Handling
//!
//! | Situation            | Behavior                                        |
//! |----------------------|-------------------------------------------------|
//! | nothing persisted    | snapshot the backend, persist, return snapshot  |
//! | malformed content    | log, return the empty cache                     |
//! | I/O failure on read  | log, return the empty cache                     |
//! | cold-start snapshot fails | log, return the empty cache (not persisted) |
//!
//! An empty cache only means "no domain matched"; the reconciler keeps
//! running and the next refresh repairs the file.

use std::net::IpAddr;
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use super::{snapshot, RecordCache};
use crate::error::Result;
use crate::traits::{CacheStorage, DnsBackend};

/// Durable mapping from addresses to the domain names bound to them
#[derive(Clone)]
pub struct RecordCacheStore {
    storage: Arc<dyn CacheStorage>,
    backend: Arc<dyn DnsBackend>,
}

impl RecordCacheStore {
    /// Create a cache store
    ///
    /// # Parameters
    ///
    /// - `storage`: Where the cache is persisted
    /// - `backend`: Authoritative source used for rebuilds
    pub fn new(storage: Arc<dyn CacheStorage>, backend: Arc<dyn DnsBackend>) -> Self {
        Self { storage, backend }
    }

    /// Read the persisted cache
    ///
    /// A missing cache triggers exactly one snapshot rebuild, which is
    /// persisted before it is returned. This never fails: every error
    /// degrades to the empty cache.
    pub async fn load(&self) -> RecordCache {
        match self.storage.read().await {
            Ok(Some(cache)) => {
                debug!(
                    "Loaded {} cached record(s) from {}",
                    cache.len(),
                    self.storage.location()
                );
                cache
            }
            Ok(None) => {
                info!(
                    "No record cache at {}, rebuilding from {}",
                    self.storage.location(),
                    self.backend.provider_name()
                );
                match self.rebuild().await {
                    Ok(cache) => cache,
                    Err(e) => {
                        error!("Cold-start cache rebuild failed: {}", e);
                        RecordCache::empty()
                    }
                }
            }
            Err(e) if e.is_malformed_cache() => {
                warn!("Ignoring unusable record cache: {}", e);
                RecordCache::empty()
            }
            Err(e) => {
                error!(
                    "Failed to read record cache {}: {}",
                    self.storage.location(),
                    e
                );
                RecordCache::empty()
            }
        }
    }

    /// Every record name in `cache` bound to `ip`
    pub fn lookup(cache: &RecordCache, ip: &IpAddr) -> Vec<String> {
        cache.lookup(ip)
    }

    /// Replace the persisted cache
    pub async fn persist(&self, cache: &RecordCache) -> Result<()> {
        self.storage.write(cache).await?;
        debug!(
            "Persisted {} record(s) to {}",
            cache.len(),
            self.storage.location()
        );
        Ok(())
    }

    /// Snapshot the backend and persist the result
    ///
    /// The persisted cache is left untouched when the snapshot fails.
    pub async fn rebuild(&self) -> Result<RecordCache> {
        let cache = snapshot(self.backend.as_ref()).await?;
        self.persist(&cache).await?;
        Ok(cache)
    }
}

impl std::fmt::Debug for RecordCacheStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordCacheStore")
            .field("storage", &self.storage.location())
            .field("backend", &self.backend.provider_name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::DomainRecord;
    use crate::storage::MemoryCacheStorage;
    use crate::traits::{RecordType, ResourceRecord, UpsertOutcome, UpsertRequest, Zone};
    use crate::Error;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Backend with one zone whose contents can be swapped between calls
    struct CountingBackend {
        records: std::sync::Mutex<Vec<ResourceRecord>>,
        list_calls: AtomicUsize,
        fail: bool,
    }

    impl CountingBackend {
        fn new(records: Vec<ResourceRecord>) -> Self {
            Self {
                records: std::sync::Mutex::new(records),
                list_calls: AtomicUsize::new(0),
                fail: false,
            }
        }

        fn failing() -> Self {
            Self {
                fail: true,
                ..Self::new(Vec::new())
            }
        }
    }

    #[async_trait]
    impl DnsBackend for CountingBackend {
        async fn list_zones(&self) -> Result<Vec<Zone>> {
            self.list_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(Error::dns_backend("unavailable"));
            }
            Ok(vec![Zone {
                id: "z1".to_string(),
                name: "example.com".to_string(),
            }])
        }

        async fn list_records(&self, _zone_id: &str) -> Result<Vec<ResourceRecord>> {
            Ok(self.records.lock().unwrap().clone())
        }

        async fn upsert(&self, _request: &UpsertRequest) -> Result<UpsertOutcome> {
            Ok(UpsertOutcome::Unchanged)
        }

        fn provider_name(&self) -> &'static str {
            "counting"
        }
    }

    fn a_record(name: &str, values: &[&str]) -> ResourceRecord {
        ResourceRecord {
            name: name.to_string(),
            record_type: RecordType::A,
            values: values.iter().map(|v| v.to_string()).collect(),
            ttl: Some(60),
        }
    }

    #[tokio::test]
    async fn cold_start_rebuilds_once_and_persists() {
        let backend = Arc::new(CountingBackend::new(vec![a_record(
            "a.example.com",
            &["1.1.1.1"],
        )]));
        let storage = Arc::new(MemoryCacheStorage::new());
        let store = RecordCacheStore::new(storage.clone(), backend.clone());

        let loaded = store.load().await;

        assert_eq!(backend.list_calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            loaded,
            RecordCache::new(vec![DomainRecord::new("a.example.com", ["1.1.1.1"])])
        );
        assert_eq!(storage.read().await.unwrap(), Some(loaded.clone()));

        // Second load reads the persisted copy without touching the backend
        let again = store.load().await;
        assert_eq!(again, loaded);
        assert_eq!(backend.list_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn malformed_cache_degrades_to_empty() {
        let backend = Arc::new(CountingBackend::new(Vec::new()));
        let storage = Arc::new(MemoryCacheStorage::new());
        storage.set_malformed("not json").await;
        let store = RecordCacheStore::new(storage, backend.clone());

        assert!(store.load().await.is_empty());
        assert_eq!(backend.list_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn failed_cold_start_is_not_persisted() {
        let backend = Arc::new(CountingBackend::failing());
        let storage = Arc::new(MemoryCacheStorage::new());
        let store = RecordCacheStore::new(storage.clone(), backend.clone());

        assert!(store.load().await.is_empty());
        assert_eq!(storage.read().await.unwrap(), None);

        // Still absent, so the next load tries again
        store.load().await;
        assert_eq!(backend.list_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn rebuild_replaces_previous_cache() {
        let backend = Arc::new(CountingBackend::new(vec![
            a_record("a.example.com", &["1.1.1.1"]),
            a_record("gone.example.com", &["1.1.1.1"]),
        ]));
        let storage = Arc::new(MemoryCacheStorage::new());
        let store = RecordCacheStore::new(storage.clone(), backend.clone());

        store.rebuild().await.unwrap();
        *backend.records.lock().unwrap() = vec![a_record("a.example.com", &["1.1.1.1"])];
        store.rebuild().await.unwrap();

        let cache = store.load().await;
        assert_eq!(
            RecordCacheStore::lookup(&cache, &"1.1.1.1".parse().unwrap()),
            vec!["a.example.com"]
        );
    }
}
