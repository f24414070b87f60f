// # Cache Storage Trait
//
// Defines the interface for persisting the record cache.
//
// ## Purpose
//
// The record cache maps addresses to the domain names bound to them. The
// refresher writes it, the reconciler reads it. Storage is the only thing
// the two tasks share, so every write must replace the whole cache in one
// step: a concurrent reader sees either the old or the new cache, never a
// torn mix.
//
// ## Implementations
//
// - File-based: JSON file replaced via write-then-rename
// - In-memory: for tests and embedding

use async_trait::async_trait;

use crate::cache::RecordCache;

/// Trait for record cache storage implementations
///
/// # Thread Safety
///
/// All methods must be safe to call concurrently from multiple tasks.
///
/// # Read Semantics
///
/// `read` distinguishes three situations so the cache store can react
/// differently to each:
///
/// - `Ok(Some(cache))`: A cache was found and parsed
/// - `Ok(None)`: Nothing has been persisted yet (cold start)
/// - `Err(Error::MalformedCache { .. })`: Something exists but cannot be parsed
///
/// Any other `Err` is an I/O failure.
#[async_trait]
pub trait CacheStorage: Send + Sync {
    /// Read the persisted cache
    async fn read(&self) -> Result<Option<RecordCache>, crate::Error>;

    /// Replace the persisted cache
    ///
    /// Must be atomic with respect to concurrent `read` calls.
    async fn write(&self, cache: &RecordCache) -> Result<(), crate::Error>;

    /// Human-readable location (for logging)
    fn location(&self) -> String;
}
