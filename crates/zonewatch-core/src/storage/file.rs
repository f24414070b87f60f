// # File Cache Storage
//
// File-based implementation of CacheStorage.
//
// ## Purpose
//
// Persists the record cache as a JSON file. The file is the hand-off point
// between the refresher (writer) and the reconciler (reader), so it must
// never be observed half-written.
//
// ## Atomicity
//
// - Writes go to a uniquely named temporary file in the same directory
// - The temporary file is flushed and synced, then renamed over the target
// - Rename within one directory is atomic, so readers see the old or the
//   new file, never a mix
//
// ## Corruption
//
// A file that exists but does not parse is reported as
// `Error::MalformedCache`. It is not deleted; the next successful write
// replaces it.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::cache::RecordCache;
use crate::traits::CacheStorage;
use crate::Error;

/// Distinguishes temporary files of concurrent writers in one process
static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// File-based record cache storage
///
/// # Example
///
/// ```rust,no_run
/// use zonewatch_core::storage::FileCacheStorage;
/// use zonewatch_core::traits::CacheStorage;
/// use zonewatch_core::cache::{DomainRecord, RecordCache};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let storage = FileCacheStorage::new("/var/lib/zonewatch/records.json").await?;
///
///     let cache = RecordCache::new(vec![DomainRecord::new("a.example.com", ["1.1.1.1"])]);
///     storage.write(&cache).await?;
///
///     assert_eq!(storage.read().await?, Some(cache));
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct FileCacheStorage {
    path: PathBuf,
}

impl FileCacheStorage {
    /// Create a file cache storage, creating parent directories if needed
    ///
    /// The cache file itself is not created until the first write.
    pub async fn new<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).await.map_err(|e| {
                    Error::config(format!(
                        "Failed to create cache directory {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }

        Ok(Self { path })
    }

    /// Path of the cache file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Unique temporary path next to the cache file
    fn temp_path(&self) -> PathBuf {
        let file_name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "records".to_string());
        let n = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
        self.path
            .with_file_name(format!(".{}.{}.{}.tmp", file_name, std::process::id(), n))
    }
}

#[async_trait]
impl CacheStorage for FileCacheStorage {
    async fn read(&self) -> Result<Option<RecordCache>, Error> {
        let content = match fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("Cache file does not exist: {}", self.path.display());
                return Ok(None);
            }
            Err(e) => {
                return Err(Error::cache(format!(
                    "Failed to read cache file {}: {}",
                    self.path.display(),
                    e
                )));
            }
        };

        let cache: RecordCache = serde_json::from_str(&content)
            .map_err(|e| Error::malformed_cache(self.path.display().to_string(), e.to_string()))?;

        Ok(Some(cache))
    }

    async fn write(&self, cache: &RecordCache) -> Result<(), Error> {
        let json = serde_json::to_string_pretty(cache)
            .map_err(|e| Error::cache(format!("Failed to serialize cache: {}", e)))?;

        let temp_path = self.temp_path();
        let written = async {
            let mut file = fs::File::create(&temp_path).await?;
            file.write_all(json.as_bytes()).await?;
            file.flush().await?;
            file.sync_all().await?;
            fs::rename(&temp_path, &self.path).await
        }
        .await;

        if let Err(e) = written {
            // Best effort; a stray temp file is harmless
            let _ = fs::remove_file(&temp_path).await;
            return Err(Error::cache(format!(
                "Failed to write cache file {}: {}",
                self.path.display(),
                e
            )));
        }

        tracing::trace!("Cache written to file: {}", self.path.display());
        Ok(())
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}
