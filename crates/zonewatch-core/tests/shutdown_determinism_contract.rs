//! Contract Test: Shutdown Determinism
//!
//! Verifies that both engine tasks honor the shutdown signal promptly,
//! including while sleeping, and that the supervisor stops everything when
//! one task dies.

mod common;

use common::*;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use zonewatch_core::cache::RecordCacheStore;
use zonewatch_core::config::ZonewatchConfig;
use zonewatch_core::engine::{event_channel, EventSink, Refresher, Supervisor, ZonewatchEvent};
use zonewatch_core::error::{Error, Result};
use zonewatch_core::storage::MemoryCacheStorage;
use zonewatch_core::traits::{CacheStorage, IpOracle};

#[tokio::test(start_paused = true)]
async fn reconciler_stops_while_sleeping() {
    let oracle = Arc::new(ScriptedOracle::new(vec![Some(ip("1.1.1.1"))]));
    let backend = Arc::new(RecordingBackend::new());
    let reconciler =
        reconciler_with_cache(oracle.clone(), backend, &cache_of(&[]), &fast_reconciler_config());

    let (tx, rx) = watch::channel(false);
    let handle = tokio::spawn(reconciler.run_with_shutdown(rx));

    // INIT plus the first steady probe, then a 30s sleep
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(oracle.probe_count(), 2);

    let start = Instant::now();
    tx.send(true).unwrap();
    handle.await.unwrap().unwrap();

    assert!(start.elapsed() < Duration::from_secs(1));
    assert_eq!(oracle.probe_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn reconciler_polls_on_interval() {
    let oracle = Arc::new(ScriptedOracle::new(vec![Some(ip("1.1.1.1"))]));
    let backend = Arc::new(RecordingBackend::new());
    let reconciler =
        reconciler_with_cache(oracle.clone(), backend, &cache_of(&[]), &fast_reconciler_config());

    let (tx, rx) = watch::channel(false);
    let handle = tokio::spawn(reconciler.run_with_shutdown(rx));

    tokio::time::sleep(Duration::from_secs(65)).await;
    // t=0 (INIT), t=0, t=30, t=60
    assert_eq!(oracle.probe_count(), 4);

    tx.send(true).unwrap();
    handle.await.unwrap().unwrap();
}

#[tokio::test(start_paused = true)]
async fn refresher_on_start_writes_cache_then_stops() {
    let backend = Arc::new(RecordingBackend::with_a_records(&[(
        "a.example.com",
        &["1.1.1.1"],
    )]));
    let storage = Arc::new(MemoryCacheStorage::new());
    let store = RecordCacheStore::new(storage.clone(), backend.clone());
    let refresher = Refresher::new(store, &refresher_config(3600, true), EventSink::disabled());

    let (tx, rx) = watch::channel(false);
    let handle = tokio::spawn(refresher.run_with_shutdown(rx));

    tokio::time::sleep(Duration::from_secs(1)).await;
    let cache = storage.read().await.unwrap().expect("refreshed on start");
    assert_eq!(cache.lookup(&ip("1.1.1.1")), vec!["a.example.com"]);

    tx.send(true).unwrap();
    handle.await.unwrap().unwrap();
    assert_eq!(backend.list_zone_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn refresher_waits_one_interval_by_default() {
    let backend = Arc::new(RecordingBackend::with_a_records(&[(
        "a.example.com",
        &["1.1.1.1"],
    )]));
    let storage = Arc::new(MemoryCacheStorage::new());
    let store = RecordCacheStore::new(storage.clone(), backend.clone());
    let refresher = Refresher::new(store, &refresher_config(3600, false), EventSink::disabled());

    let (tx, rx) = watch::channel(false);
    let handle = tokio::spawn(refresher.run_with_shutdown(rx));

    tokio::time::sleep(Duration::from_secs(3599)).await;
    assert_eq!(backend.list_zone_calls(), 0);

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(backend.list_zone_calls(), 1);

    tx.send(true).unwrap();
    handle.await.unwrap().unwrap();
}

#[tokio::test(start_paused = true)]
async fn supervisor_stops_both_tasks_on_shutdown() {
    let oracle = Arc::new(ScriptedOracle::new(vec![Some(ip("1.1.1.1"))]));
    let backend = Arc::new(RecordingBackend::new());
    let storage = Arc::new(MemoryCacheStorage::new());
    let (supervisor, mut events) =
        Supervisor::new(oracle, backend, storage, &ZonewatchConfig::default()).unwrap();

    let (tx, rx) = watch::channel(false);
    let handle = tokio::spawn(supervisor.run_with_shutdown(rx));

    tokio::time::sleep(Duration::from_secs(10)).await;
    let start = Instant::now();
    tx.send(true).unwrap();
    handle.await.unwrap().unwrap();
    assert!(start.elapsed() < Duration::from_secs(1));

    let mut stopped = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let ZonewatchEvent::Stopped { task, .. } = event {
            stopped.push(task);
        }
    }
    stopped.sort();
    assert_eq!(stopped, vec!["reconciler", "refresher"]);
}

#[tokio::test(start_paused = true)]
async fn dropped_shutdown_sender_stops_supervisor() {
    let oracle = Arc::new(ScriptedOracle::new(vec![Some(ip("1.1.1.1"))]));
    let backend = Arc::new(RecordingBackend::new());
    let storage = Arc::new(MemoryCacheStorage::new());
    let (supervisor, _events) =
        Supervisor::new(oracle, backend, storage, &ZonewatchConfig::default()).unwrap();

    let (tx, rx) = watch::channel(false);
    let handle = tokio::spawn(supervisor.run_with_shutdown(rx));

    tokio::time::sleep(Duration::from_secs(1)).await;
    drop(tx);
    handle.await.unwrap().unwrap();
}

struct PanickingOracle;

#[async_trait::async_trait]
impl IpOracle for PanickingOracle {
    async fn probe(&self) -> Result<IpAddr> {
        panic!("oracle exploded");
    }

    fn oracle_name(&self) -> &'static str {
        "panicking"
    }
}

#[tokio::test(start_paused = true)]
async fn crashed_task_stops_supervisor_with_error() {
    let backend = Arc::new(RecordingBackend::new());
    let storage = Arc::new(MemoryCacheStorage::new());
    let (supervisor, mut events) = Supervisor::new(
        Arc::new(PanickingOracle),
        backend,
        storage,
        &ZonewatchConfig::default(),
    )
    .unwrap();

    let (_tx, rx) = watch::channel(false);
    let result = supervisor.run_with_shutdown(rx).await;

    match result {
        Err(Error::Task { task, .. }) => assert_eq!(task, "reconciler"),
        other => panic!("expected reconciler task failure, got {other:?}"),
    }

    // The surviving refresher was stopped, not restarted
    let mut stopped = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let ZonewatchEvent::Stopped { task, .. } = event {
            stopped.push(task);
        }
    }
    assert_eq!(stopped, vec!["refresher"]);
}

#[tokio::test]
async fn event_channel_reports_cycle_outcomes() {
    let oracle = Arc::new(ScriptedOracle::new(vec![
        Some(ip("1.1.1.1")),
        Some(ip("5.5.5.5")),
    ]));
    let backend = Arc::new(RecordingBackend::new());
    let storage = Arc::new(
        MemoryCacheStorage::with_cache(&cache_of(&[("a.example.com", &["1.1.1.1"])])).unwrap(),
    );
    let store = RecordCacheStore::new(storage, backend.clone());
    let (sink, mut events) = event_channel(16);
    let mut reconciler = zonewatch_core::engine::Reconciler::new(
        oracle,
        backend,
        store,
        &fast_reconciler_config(),
        sink,
    );

    reconciler.initialize().await;
    reconciler.cycle().await;

    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        seen.push(event);
    }
    assert_eq!(seen[0], ZonewatchEvent::BaselineSet { ip: ip("1.1.1.1") });
    assert_eq!(
        seen[1],
        ZonewatchEvent::ChangeDetected {
            old_ip: ip("1.1.1.1"),
            new_ip: ip("5.5.5.5"),
            domains: 1,
        }
    );
    assert!(matches!(
        &seen[2],
        ZonewatchEvent::UpsertSucceeded { record_name, .. } if record_name == "a.example.com"
    ));
}
