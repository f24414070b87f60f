//! Test doubles and common utilities for contract tests
//!
//! These doubles stand in for the IP oracle, the DNS backend and the cache
//! storage so the engine can be driven deterministically.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::net::IpAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use zonewatch_core::cache::{DomainRecord, RecordCache, RecordCacheStore};
use zonewatch_core::config::{ReconcilerConfig, RefresherConfig};
use zonewatch_core::engine::{EventSink, Reconciler};
use zonewatch_core::error::{Error, Result};
use zonewatch_core::storage::MemoryCacheStorage;
use zonewatch_core::traits::{
    DnsBackend, IpOracle, RecordType, ResourceRecord, UpsertOutcome, UpsertRequest, Zone,
};

pub fn ip(s: &str) -> IpAddr {
    s.parse().expect("valid test address")
}

/// An oracle that replays a script of probe results
///
/// Once the script is exhausted the last entry repeats forever.
pub struct ScriptedOracle {
    script: Mutex<VecDeque<Option<IpAddr>>>,
    last: Mutex<Option<IpAddr>>,
    probe_count: Arc<AtomicUsize>,
}

impl ScriptedOracle {
    /// `None` entries are probe failures
    pub fn new(script: Vec<Option<IpAddr>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            last: Mutex::new(None),
            probe_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn probe_count(&self) -> usize {
        self.probe_count.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl IpOracle for ScriptedOracle {
    async fn probe(&self) -> Result<IpAddr> {
        self.probe_count.fetch_add(1, Ordering::SeqCst);

        let next = self.script.lock().unwrap().pop_front();
        let result = match next {
            Some(entry) => {
                *self.last.lock().unwrap() = entry;
                entry
            }
            None => *self.last.lock().unwrap(),
        };

        result.ok_or_else(|| Error::ip_oracle("scripted probe failure"))
    }

    fn oracle_name(&self) -> &'static str {
        "scripted"
    }
}

/// An in-memory DNS backend that records every call
///
/// Zone contents are kept as `(zone_id, name, type) -> values`, so an
/// upsert replaces the value set in place like a real provider would.
#[derive(Default)]
pub struct RecordingBackend {
    zones: Mutex<Vec<Zone>>,
    records: Mutex<HashMap<(String, String, String), Vec<String>>>,
    upserts: Mutex<Vec<UpsertRequest>>,
    failing: Mutex<HashSet<String>>,
    list_zone_calls: AtomicUsize,
    fail_listing: Mutex<bool>,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// A backend with one zone "z1" holding the given A records
    pub fn with_a_records(records: &[(&str, &[&str])]) -> Self {
        let backend = Self::new();
        backend.add_zone("z1", "example.com");
        for (name, values) in records {
            backend.put_record("z1", name, RecordType::A, values);
        }
        backend
    }

    pub fn add_zone(&self, id: &str, name: &str) {
        self.zones.lock().unwrap().push(Zone {
            id: id.to_string(),
            name: name.to_string(),
        });
    }

    pub fn put_record(&self, zone_id: &str, name: &str, record_type: RecordType, values: &[&str]) {
        self.records.lock().unwrap().insert(
            (
                zone_id.to_string(),
                name.to_string(),
                record_type.as_str().to_string(),
            ),
            values.iter().map(|v| v.to_string()).collect(),
        );
    }

    pub fn remove_record(&self, zone_id: &str, name: &str, record_type: RecordType) {
        self.records.lock().unwrap().remove(&(
            zone_id.to_string(),
            name.to_string(),
            record_type.as_str().to_string(),
        ));
    }

    /// Make every upsert for `record_name` fail
    pub fn fail_upserts_for(&self, record_name: &str) {
        self.failing.lock().unwrap().insert(record_name.to_string());
    }

    /// Make list calls fail
    pub fn fail_listing(&self, fail: bool) {
        *self.fail_listing.lock().unwrap() = fail;
    }

    pub fn upserts(&self) -> Vec<UpsertRequest> {
        self.upserts.lock().unwrap().clone()
    }

    pub fn upsert_count(&self) -> usize {
        self.upserts.lock().unwrap().len()
    }

    pub fn list_zone_calls(&self) -> usize {
        self.list_zone_calls.load(Ordering::SeqCst)
    }

    /// Values currently bound to `(name, type)` in any zone
    pub fn values_of(&self, name: &str, record_type: RecordType) -> Option<Vec<String>> {
        self.records
            .lock()
            .unwrap()
            .iter()
            .find(|((_, n, t), _)| n == name && t == record_type.as_str())
            .map(|(_, v)| v.clone())
    }

    pub fn record_count(&self) -> usize {
        self.records.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl DnsBackend for RecordingBackend {
    async fn list_zones(&self) -> Result<Vec<Zone>> {
        self.list_zone_calls.fetch_add(1, Ordering::SeqCst);
        if *self.fail_listing.lock().unwrap() {
            return Err(Error::dns_backend("listing unavailable"));
        }
        Ok(self.zones.lock().unwrap().clone())
    }

    async fn list_records(&self, zone_id: &str) -> Result<Vec<ResourceRecord>> {
        if *self.fail_listing.lock().unwrap() {
            return Err(Error::dns_backend("listing unavailable"));
        }
        let mut records: Vec<ResourceRecord> = self
            .records
            .lock()
            .unwrap()
            .iter()
            .filter(|((zone, _, _), _)| zone == zone_id)
            .map(|((_, name, record_type), values)| ResourceRecord {
                name: name.clone(),
                record_type: RecordType::parse(record_type),
                values: values.clone(),
                ttl: Some(60),
            })
            .collect();
        records.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(records)
    }

    async fn upsert(&self, request: &UpsertRequest) -> Result<UpsertOutcome> {
        self.upserts.lock().unwrap().push(request.clone());

        if self.failing.lock().unwrap().contains(&request.record_name) {
            return Err(Error::rate_limited(format!(
                "injected failure for {}",
                request.record_name
            )));
        }

        let key = (
            "z1".to_string(),
            request.record_name.clone(),
            request.record_type.as_str().to_string(),
        );
        let value = vec![request.new_address.to_string()];

        let mut records = self.records.lock().unwrap();
        let outcome = match records.get(&key) {
            None => UpsertOutcome::Created,
            Some(existing) if *existing == value => UpsertOutcome::Unchanged,
            Some(existing) => UpsertOutcome::Updated {
                previous: existing.clone(),
            },
        };
        records.insert(key, value);
        Ok(outcome)
    }

    fn provider_name(&self) -> &'static str {
        "recording"
    }
}

/// Cache containing the given `(name, addresses)` pairs
pub fn cache_of(records: &[(&str, &[&str])]) -> RecordCache {
    records
        .iter()
        .map(|(name, addresses)| DomainRecord::new(*name, addresses.iter().copied()))
        .collect()
}

/// Reconciler config with fast polling for tests
pub fn fast_reconciler_config() -> ReconcilerConfig {
    ReconcilerConfig {
        poll_interval_secs: 30,
        ttl: 60,
        change_confirmations: 1,
        event_channel_capacity: 100,
    }
}

pub fn refresher_config(interval_secs: u64, refresh_on_start: bool) -> RefresherConfig {
    RefresherConfig {
        interval_secs,
        refresh_on_start,
    }
}

/// Build a reconciler over a pre-populated in-memory cache
pub fn reconciler_with_cache(
    oracle: Arc<ScriptedOracle>,
    backend: Arc<RecordingBackend>,
    cache: &RecordCache,
    config: &ReconcilerConfig,
) -> Reconciler {
    let storage = Arc::new(MemoryCacheStorage::with_cache(cache).expect("serializable cache"));
    let store = RecordCacheStore::new(storage, backend.clone());
    Reconciler::new(oracle, backend, store, config, EventSink::disabled())
}
