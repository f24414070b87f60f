//! Core traits for zonewatch
//!
//! This module defines the abstract interfaces at the edges of the system.
//!
//! - [`IpOracle`]: Discover the host's public IP address
//! - [`DnsBackend`]: Enumerate zones/records and upsert address records
//! - [`CacheStorage`]: Persist the record cache

pub mod ip_oracle;
pub mod dns_backend;
pub mod cache_storage;

pub use ip_oracle::{IpOracle, IpVersion};
pub use dns_backend::{
    DnsBackend, RecordType, ResourceRecord, UpsertOutcome, UpsertRequest, Zone, DEFAULT_TTL,
};
pub use cache_storage::CacheStorage;
