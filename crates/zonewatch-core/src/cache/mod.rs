//! Record cache
//!
//! The record cache answers "which domain names currently point at address
//! X?" without a live API call. It is rebuilt from the DNS backend by a
//! [snapshot](snapshot::snapshot) and persisted through a
//! [`CacheStorage`](crate::traits::CacheStorage).
//!
//! ## File Format
//!
//! The persisted form is a JSON array, one object per resource record set:
//!
//! ```json
//! [
//!   { "RecordName": "a.example.com", "IP": ["1.1.1.1"] },
//!   { "RecordName": "b.example.com", "IP": ["1.1.1.1", "2.2.2.2"] }
//! ]
//! ```

pub mod snapshot;
pub mod store;

pub use snapshot::snapshot;
pub use store::RecordCacheStore;

use serde::{Deserialize, Serialize};
use std::net::IpAddr;

/// Observed state of one resource record set at snapshot time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainRecord {
    /// Fully-qualified record name
    #[serde(rename = "RecordName")]
    pub record_name: String,

    /// Address values bound to the name
    #[serde(rename = "IP", default)]
    pub addresses: Vec<String>,
}

impl DomainRecord {
    /// Create a domain record
    pub fn new<I, S>(record_name: impl Into<String>, addresses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            record_name: record_name.into(),
            addresses: addresses.into_iter().map(Into::into).collect(),
        }
    }

    /// Whether `address` is bound to this record (exact string match)
    pub fn contains(&self, address: &str) -> bool {
        self.addresses.iter().any(|a| a == address)
    }
}

/// Ordered collection of domain records
///
/// Record names are not required to be unique; every entry is matched
/// independently. A cache is always replaced as a whole, never merged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordCache {
    records: Vec<DomainRecord>,
}

impl RecordCache {
    /// Create a cache from records
    pub fn new(records: Vec<DomainRecord>) -> Self {
        Self { records }
    }

    /// Create an empty cache
    pub fn empty() -> Self {
        Self::default()
    }

    /// Records in cache order
    pub fn records(&self) -> &[DomainRecord] {
        &self.records
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the cache holds no records
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Every record name bound to `ip`
    ///
    /// Linear scan with exact string equality on the textual address; no
    /// CIDR or normalization logic. Each name appears once, in cache order.
    /// Returns an empty list when nothing matches.
    pub fn lookup(&self, ip: &IpAddr) -> Vec<String> {
        self.lookup_address(&ip.to_string())
    }

    /// Every record name bound to the textual `address`
    pub fn lookup_address(&self, address: &str) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for record in self.records.iter().filter(|r| r.contains(address)) {
            if !names.contains(&record.record_name) {
                names.push(record.record_name.clone());
            }
        }
        names
    }
}

impl FromIterator<DomainRecord> for RecordCache {
    fn from_iter<T: IntoIterator<Item = DomainRecord>>(iter: T) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
