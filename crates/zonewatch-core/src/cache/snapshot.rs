//! Zone snapshot
//!
//! Rebuilds a [`RecordCache`] from the backend's authoritative record set.

use tracing::{debug, info};

use super::{DomainRecord, RecordCache};
use crate::error::Result;
use crate::traits::DnsBackend;

/// Take a full snapshot of every zone known to the backend
///
/// Every address record (A/AAAA) carrying at least one value becomes a
/// [`DomainRecord`]. Records without values and non-address records are
/// skipped. Any failing list call aborts the whole snapshot so a partial
/// view is never mistaken for the authoritative state.
pub async fn snapshot(backend: &dyn DnsBackend) -> Result<RecordCache> {
    let zones = backend.list_zones().await?;
    debug!(
        "Snapshotting {} zone(s) from {}",
        zones.len(),
        backend.provider_name()
    );

    let mut records = Vec::new();
    for zone in &zones {
        let zone_records = backend.list_records(&zone.id).await?;
        let before = records.len();

        records.extend(
            zone_records
                .into_iter()
                .filter(|r| r.record_type.is_address() && !r.values.is_empty())
                .map(|r| DomainRecord::new(r.name, r.values)),
        );

        debug!(
            "Zone {} ({}): {} address record(s)",
            zone.name,
            zone.id,
            records.len() - before
        );
    }

    info!(
        "Snapshot complete: {} record(s) across {} zone(s)",
        records.len(),
        zones.len()
    );
    Ok(RecordCache::new(records))
}
