// # zonewatch-core
//
// Core library for the zonewatch dynamic DNS updater.
//
// ## Architecture Overview
//
// zonewatch keeps a set of DNS address records pointed at the host's public
// IP address:
// - **IpOracle**: Trait for discovering the current public IP
// - **DnsBackend**: Trait for enumerating zones/records and upserting records
// - **CacheStorage**: Trait for persisting the address → domain-name cache
// - **RecordCacheStore**: Loads, queries and rebuilds the record cache
// - **Reconciler**: Detects IP changes and repoints affected records
// - **Refresher**: Periodically rebuilds the cache from the backend
// - **Supervisor**: Runs the reconciler and refresher concurrently
//
// ## Design Principles
//
// 1. **Injected collaborators**: Oracle, backend and storage are passed in,
//    never global, so every component can run against test doubles
// 2. **File hand-off**: The two tasks share nothing in memory; the
//    atomically replaced cache is their only contract
// 3. **Never abort the loop**: Oracle, cache and backend failures are
//    logged, reported as typed outcomes, and absorbed until the next cycle
// 4. **Deterministic shutdown**: Every loop honors a shutdown signal

pub mod traits;
pub mod cache;
pub mod engine;
pub mod config;
pub mod error;
pub mod storage;

// Re-export core types for convenience
pub use traits::{CacheStorage, DnsBackend, IpOracle};
pub use cache::{DomainRecord, RecordCache, RecordCacheStore};
pub use engine::{Reconciler, Refresher, Supervisor, ZonewatchEvent};
pub use config::{BackendConfig, OracleConfig, ZonewatchConfig};
pub use error::{Error, Result};
pub use storage::{FileCacheStorage, MemoryCacheStorage};
