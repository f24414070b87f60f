// # DNS Backend Trait
//
// Defines the interface to the managed DNS provider.
//
// ## Implementations
//
// - Cloudflare: `zonewatch-provider-cloudflare` crate
//
// ## Usage
//
// ```rust,ignore
// use zonewatch_core::traits::{DnsBackend, UpsertRequest};
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let backend = /* DnsBackend implementation */;
//
//     // Repoint one record
//     let request = UpsertRequest::new("home.example.com", "203.0.113.7".parse()?);
//     backend.upsert(&request).await?;
//
//     // Enumerate everything the backend knows about
//     for zone in backend.list_zones().await? {
//         let records = backend.list_records(&zone.id).await?;
//         println!("{}: {} records", zone.name, records.len());
//     }
//
//     Ok(())
// }
// ```

use async_trait::async_trait;
use std::fmt;
use std::net::IpAddr;

/// Default TTL for upserted address records
pub const DEFAULT_TTL: u32 = 60;

/// DNS record type
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RecordType {
    /// IPv4 address record
    A,
    /// IPv6 address record
    Aaaa,
    /// Any other record type, kept verbatim
    Other(String),
}

impl RecordType {
    /// Address record type matching the given IP version
    pub fn for_ip(ip: &IpAddr) -> Self {
        match ip {
            IpAddr::V4(_) => RecordType::A,
            IpAddr::V6(_) => RecordType::Aaaa,
        }
    }

    /// Whether this record type carries an address value
    pub fn is_address(&self) -> bool {
        matches!(self, RecordType::A | RecordType::Aaaa)
    }

    /// Parse a provider record type string
    pub fn parse(value: &str) -> Self {
        match value.to_ascii_uppercase().as_str() {
            "A" => RecordType::A,
            "AAAA" => RecordType::Aaaa,
            other => RecordType::Other(other.to_string()),
        }
    }

    /// Wire name of the record type
    pub fn as_str(&self) -> &str {
        match self {
            RecordType::A => "A",
            RecordType::Aaaa => "AAAA",
            RecordType::Other(name) => name,
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A zone known to the DNS backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Zone {
    /// Provider-specific zone identifier
    pub id: String,
    /// Zone apex name (e.g. "example.com")
    pub name: String,
}

/// A resource record set as reported by the backend
///
/// `values` holds every value bound to `(name, record_type)`. Records
/// without values (alias-only or metadata records) have an empty list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceRecord {
    /// Fully-qualified record name
    pub name: String,
    /// Record type
    pub record_type: RecordType,
    /// Record values in provider order
    pub values: Vec<String>,
    /// Advertised TTL, when the provider reports one
    pub ttl: Option<u32>,
}

/// A single create-or-replace change for one address record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpsertRequest {
    /// Fully-qualified record name
    pub record_name: String,
    /// Address the record must resolve to afterwards
    pub new_address: IpAddr,
    /// TTL to advertise
    pub ttl: u32,
    /// Record type, derived from `new_address`
    pub record_type: RecordType,
}

impl UpsertRequest {
    /// Build a request with the default TTL
    pub fn new(record_name: impl Into<String>, new_address: IpAddr) -> Self {
        Self {
            record_name: record_name.into(),
            new_address,
            ttl: DEFAULT_TTL,
            record_type: RecordType::for_ip(&new_address),
        }
    }

    /// Override the TTL
    pub fn with_ttl(mut self, ttl: u32) -> Self {
        self.ttl = ttl;
        self
    }
}

/// Result of an upsert
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// The record did not exist and was created
    Created,
    /// The record existed with a different value and was replaced
    Updated {
        /// Values bound before the change
        previous: Vec<String>,
    },
    /// The record already had exactly this value and TTL (no-op)
    Unchanged,
}

/// Trait for DNS backend implementations
///
/// The backend is a thin, stateless client for the provider API. It exposes
/// exactly what the updater needs: enumerate zones, enumerate the records of
/// a zone, and upsert a single address record in the configured zone.
///
/// # Single-shot
///
/// Each method performs the API calls for one logical operation and returns.
/// Backends never retry, sleep, spawn tasks or cache results; scheduling is
/// owned by the reconciler and the refresher.
///
/// # Idempotency
///
/// `upsert` must be idempotent: issuing the same request twice leaves the
/// zone in the same state as issuing it once (one record, same value).
#[async_trait]
pub trait DnsBackend: Send + Sync {
    /// List every zone visible to the configured credentials
    async fn list_zones(&self) -> Result<Vec<Zone>, crate::Error>;

    /// List every resource record in a zone
    ///
    /// # Parameters
    ///
    /// - `zone_id`: Identifier returned by [`DnsBackend::list_zones`]
    async fn list_records(&self, zone_id: &str) -> Result<Vec<ResourceRecord>, crate::Error>;

    /// Create or replace one address record in the configured zone
    ///
    /// # Returns
    ///
    /// - `Ok(UpsertOutcome)`: What the backend did
    /// - `Err(Error)`: Auth failure, rate limit, malformed name, unavailability
    async fn upsert(&self, request: &UpsertRequest) -> Result<UpsertOutcome, crate::Error>;

    /// Provider name (for logging/debugging)
    fn provider_name(&self) -> &'static str;
}
