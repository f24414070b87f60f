//! IP-change reconciler
//!
//! The reconciler is the control loop of the updater. Each cycle it probes
//! the IP oracle, compares the answer with the last known address and, when
//! the address has changed, repoints every record the cache binds to the old
//! address.
//!
//! ## State Machine
//!
//! ```text
//!   INIT ── first probe ──▶ STEADY ──┐
//!                             ▲      │ probe, compare, maybe repoint, sleep
//!                             └──────┘
//! ```
//!
//! - INIT: the first probe becomes the baseline. If it fails, the baseline
//!   stays absent.
//! - STEADY: a failed probe changes nothing. With no baseline, the first
//!   successful probe only sets it. An equal address is a no-op. A
//!   different address (confirmed on `change_confirmations` consecutive
//!   probes) triggers one upsert per record bound to the old address, then
//!   the baseline advances regardless of individual upsert outcomes.

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use super::{shutdown_requested, sleep_or_shutdown, EventSink, ZonewatchEvent};
use crate::cache::RecordCacheStore;
use crate::config::ReconcilerConfig;
use crate::error::Result;
use crate::traits::{DnsBackend, IpOracle, UpsertOutcome, UpsertRequest};

/// Reconciler phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// No probe has been made yet
    Init,
    /// Regular polling
    Steady,
}

/// A new address seen on fewer probes than required
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PendingChange {
    candidate: IpAddr,
    seen: u32,
}

/// Outcome of one reconciliation cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The oracle could not be queried; state untouched
    ProbeFailed,
    /// The probe established the baseline; nothing was upserted
    Baseline(IpAddr),
    /// The probe returned the current address
    Unchanged(IpAddr),
    /// A new address awaits further confirmation
    Pending {
        candidate: IpAddr,
        seen: u32,
        required: u32,
    },
    /// The address changed and records were repointed
    Changed(ChangeReport),
}

/// What happened while repointing records after an address change
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeReport {
    /// Address the records were bound to
    pub old_ip: IpAddr,
    /// Address the records were repointed to
    pub new_ip: IpAddr,
    /// When the change was confirmed
    pub detected_at: DateTime<Utc>,
    /// Records upserted successfully, with the backend's outcome
    pub succeeded: Vec<(String, UpsertOutcome)>,
    /// Records whose upsert failed, with the error message
    pub failed: Vec<(String, String)>,
}

impl ChangeReport {
    /// Number of upserts issued
    pub fn attempted(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }

    /// Number of failed upserts
    pub fn failure_count(&self) -> usize {
        self.failed.len()
    }
}

/// IP-change reconciler
///
/// Owns the only copy of the last known address. Nothing else mutates it
/// and it is never persisted: a restarted process begins in INIT again.
pub struct Reconciler {
    oracle: Arc<dyn IpOracle>,
    backend: Arc<dyn DnsBackend>,
    cache: RecordCacheStore,
    poll_interval: Duration,
    ttl: u32,
    change_confirmations: u32,
    events: EventSink,

    phase: Phase,
    current_ip: Option<IpAddr>,
    pending: Option<PendingChange>,
}

impl Reconciler {
    /// Create a reconciler
    ///
    /// # Parameters
    ///
    /// - `oracle`: Source of the public address
    /// - `backend`: Receives the upserts
    /// - `cache`: Resolves an old address to the records bound to it
    /// - `config`: Poll interval, TTL and confirmation count
    /// - `events`: Where cycle events are published
    pub fn new(
        oracle: Arc<dyn IpOracle>,
        backend: Arc<dyn DnsBackend>,
        cache: RecordCacheStore,
        config: &ReconcilerConfig,
        events: EventSink,
    ) -> Self {
        Self {
            oracle,
            backend,
            cache,
            poll_interval: Duration::from_secs(config.poll_interval_secs),
            ttl: config.ttl,
            change_confirmations: config.change_confirmations.max(1),
            events,
            phase: Phase::Init,
            current_ip: None,
            pending: None,
        }
    }

    /// Current phase
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Last known public address
    pub fn current_ip(&self) -> Option<IpAddr> {
        self.current_ip
    }

    /// Run the INIT step: probe once and record the baseline
    pub async fn initialize(&mut self) -> CycleOutcome {
        info!("Checking external IP (initial probe)...");
        self.phase = Phase::Steady;

        match self.oracle.probe().await {
            Ok(ip) => self.set_baseline(ip),
            Err(e) => {
                warn!(
                    "Initial probe via {} failed, starting without baseline: {}",
                    self.oracle.oracle_name(),
                    e
                );
                self.events.emit(ZonewatchEvent::ProbeFailed {
                    error: e.to_string(),
                });
                CycleOutcome::ProbeFailed
            }
        }
    }

    /// Run one STEADY cycle (without the trailing sleep)
    ///
    /// Runs the INIT step instead when called before [`Reconciler::initialize`].
    pub async fn cycle(&mut self) -> CycleOutcome {
        if self.phase == Phase::Init {
            return self.initialize().await;
        }

        info!("Checking external IP...");
        let new_ip = match self.oracle.probe().await {
            Ok(ip) => ip,
            Err(e) => {
                warn!(
                    "Failed to get external IP from {}: {}",
                    self.oracle.oracle_name(),
                    e
                );
                self.events.emit(ZonewatchEvent::ProbeFailed {
                    error: e.to_string(),
                });
                return CycleOutcome::ProbeFailed;
            }
        };

        let Some(old_ip) = self.current_ip else {
            return self.set_baseline(new_ip);
        };

        if new_ip == old_ip {
            if let Some(pending) = self.pending.take() {
                debug!(
                    "Candidate {} not confirmed, back to {}",
                    pending.candidate, old_ip
                );
            }
            info!("No change in IP. Current IP: {}", old_ip);
            self.events.emit(ZonewatchEvent::Unchanged { ip: old_ip });
            return CycleOutcome::Unchanged(old_ip);
        }

        let seen = match self.pending {
            Some(pending) if pending.candidate == new_ip => pending.seen + 1,
            _ => 1,
        };
        if seen < self.change_confirmations {
            info!(
                "External IP candidate {} (seen {}/{}), current IP: {}",
                new_ip, seen, self.change_confirmations, old_ip
            );
            self.pending = Some(PendingChange {
                candidate: new_ip,
                seen,
            });
            self.events.emit(ZonewatchEvent::ChangePending {
                candidate: new_ip,
                seen,
                required: self.change_confirmations,
            });
            return CycleOutcome::Pending {
                candidate: new_ip,
                seen,
                required: self.change_confirmations,
            };
        }

        self.pending = None;
        info!("External IP changed: {} -> {}", old_ip, new_ip);
        let report = self.repoint(old_ip, new_ip).await;

        // Advance even if some upserts failed
        self.current_ip = Some(new_ip);
        CycleOutcome::Changed(report)
    }

    /// Upsert every record bound to `old_ip` with `new_ip`
    async fn repoint(&self, old_ip: IpAddr, new_ip: IpAddr) -> ChangeReport {
        let cache = self.cache.load().await;
        let domains = RecordCacheStore::lookup(&cache, &old_ip);

        if domains.is_empty() {
            warn!("No cached records point at {}, nothing to update", old_ip);
        }
        self.events.emit(ZonewatchEvent::ChangeDetected {
            old_ip,
            new_ip,
            domains: domains.len(),
        });

        let mut report = ChangeReport {
            old_ip,
            new_ip,
            detected_at: Utc::now(),
            succeeded: Vec::new(),
            failed: Vec::new(),
        };

        for record_name in domains {
            let request = UpsertRequest::new(record_name.clone(), new_ip).with_ttl(self.ttl);

            match self.backend.upsert(&request).await {
                Ok(outcome) => {
                    info!(
                        "Updated {} record {} -> {} via {} ({:?})",
                        request.record_type,
                        record_name,
                        new_ip,
                        self.backend.provider_name(),
                        outcome
                    );
                    self.events.emit(ZonewatchEvent::UpsertSucceeded {
                        record_name: record_name.clone(),
                        new_ip,
                        outcome: outcome.clone(),
                    });
                    report.succeeded.push((record_name, outcome));
                }
                Err(e) => {
                    error!(
                        "Failed to update {} record {} -> {} (ttl {}) via {}: {}",
                        request.record_type,
                        record_name,
                        new_ip,
                        request.ttl,
                        self.backend.provider_name(),
                        e
                    );
                    self.events.emit(ZonewatchEvent::UpsertFailed {
                        record_name: record_name.clone(),
                        new_ip,
                        error: e.to_string(),
                    });
                    report.failed.push((record_name, e.to_string()));
                }
            }
        }

        if report.failure_count() > 0 {
            warn!(
                "{} of {} record update(s) failed for {} -> {}",
                report.failure_count(),
                report.attempted(),
                old_ip,
                new_ip
            );
        }
        report
    }

    fn set_baseline(&mut self, ip: IpAddr) -> CycleOutcome {
        info!("Baseline external IP: {}", ip);
        self.current_ip = Some(ip);
        self.pending = None;
        self.events.emit(ZonewatchEvent::BaselineSet { ip });
        CycleOutcome::Baseline(ip)
    }

    /// Run until shutdown is requested
    ///
    /// Shutdown is honored between cycles, during the sleep, and while a
    /// probe or upsert is in flight.
    pub async fn run_with_shutdown(mut self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        info!(
            "Reconciler started (poll interval {:?}, ttl {}, confirmations {})",
            self.poll_interval, self.ttl, self.change_confirmations
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            let initializing = self.phase == Phase::Init;
            tokio::select! {
                _ = self.cycle() => {}
                _ = shutdown_requested(&mut shutdown) => break,
            }

            // INIT flows straight into the first STEADY probe
            if initializing {
                continue;
            }

            if sleep_or_shutdown(&mut shutdown, self.poll_interval).await {
                break;
            }
        }

        info!("Reconciler stopped");
        self.events.emit(ZonewatchEvent::Stopped {
            task: "reconciler",
            reason: "Shutdown signal".to_string(),
        });
        Ok(())
    }
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("oracle", &self.oracle.oracle_name())
            .field("backend", &self.backend.provider_name())
            .field("poll_interval", &self.poll_interval)
            .field("phase", &self.phase)
            .field("current_ip", &self.current_ip)
            .finish()
    }
}
