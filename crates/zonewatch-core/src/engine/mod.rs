//! Core zonewatch engine
//!
//! Two long-lived tasks, started together by the [`Supervisor`]:
//!
//! - [`Reconciler`]: polls the IP oracle and repoints every record bound to
//!   the old address when the public address changes
//! - [`Refresher`]: periodically rebuilds the record cache from the backend
//!
//! ## Architecture
//!
//! ```text
//!                  ┌──────────────┐
//!                  │  Supervisor  │
//!                  └──────────────┘
//!                   │            │
//!          spawn    ▼            ▼    spawn
//!        ┌──────────────┐    ┌──────────────┐
//!        │  Reconciler  │    │  Refresher   │
//!        └──────────────┘    └──────────────┘
//!          │    │      ▲            │      │
//!   probe  │    │ read │            │write │ snapshot
//!          ▼    │   ┌──────────────────┐   ▼
//! ┌──────────┐  │   │  CacheStorage    │  ┌──────────────┐
//! │ IpOracle │  │   │  (cache file)    │  │  DnsBackend  │
//! └──────────┘  │   └──────────────────┘  └──────────────┘
//!               │ upsert                         ▲
//!               └────────────────────────────────┘
//! ```
//!
//! The tasks share no in-memory state. Their only hand-off is the cache
//! storage, which is replaced atomically on every refresh.
//!
//! ## Shutdown
//!
//! Both tasks take a `watch::Receiver<bool>`. Setting it to `true` (or
//! dropping the sender) stops them at the next sleep or blocking call.

pub mod reconciler;
pub mod refresher;
pub mod supervisor;

pub use reconciler::{ChangeReport, CycleOutcome, Phase, Reconciler};
pub use refresher::Refresher;
pub use supervisor::Supervisor;

use crate::traits::UpsertOutcome;
use std::net::IpAddr;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::warn;

/// Events emitted by the engine tasks
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ZonewatchEvent {
    /// The IP oracle could not be queried
    ProbeFailed { error: String },

    /// First successful probe recorded as the baseline
    BaselineSet { ip: IpAddr },

    /// Probe returned the current address
    Unchanged { ip: IpAddr },

    /// A new address was seen but is not yet confirmed
    ChangePending {
        candidate: IpAddr,
        seen: u32,
        required: u32,
    },

    /// Confirmed address change; `domains` records will be repointed
    ChangeDetected {
        old_ip: IpAddr,
        new_ip: IpAddr,
        domains: usize,
    },

    /// One record was upserted
    UpsertSucceeded {
        record_name: String,
        new_ip: IpAddr,
        outcome: UpsertOutcome,
    },

    /// One record could not be upserted
    UpsertFailed {
        record_name: String,
        new_ip: IpAddr,
        error: String,
    },

    /// The record cache was rebuilt and persisted
    CacheRefreshed { records: usize },

    /// A refresh failed; the persisted cache is unchanged
    RefreshFailed { error: String },

    /// A task stopped
    Stopped { task: &'static str, reason: String },
}

/// Sending half of the event channel
///
/// Events are dropped (with a warning) when the channel is full, so a slow
/// consumer never blocks the engine.
#[derive(Debug, Clone, Default)]
pub struct EventSink {
    tx: Option<mpsc::Sender<ZonewatchEvent>>,
}

impl EventSink {
    /// Sink that discards every event
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    /// Emit an event
    pub(crate) fn emit(&self, event: ZonewatchEvent) {
        if let Some(tx) = &self.tx {
            if let Err(mpsc::error::TrySendError::Full(_)) = tx.try_send(event) {
                warn!(
                    "Event channel full, dropping event. Consider increasing event_channel_capacity."
                );
            }
        }
    }
}

/// Create a bounded event channel
pub fn event_channel(capacity: usize) -> (EventSink, mpsc::Receiver<ZonewatchEvent>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (EventSink { tx: Some(tx) }, rx)
}

/// Resolves once shutdown is requested or the sender is gone
pub(crate) async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stop| *stop).await.map(|_| ());
}

/// Sleep for `period` unless shutdown is requested first
///
/// Returns `true` when the caller should stop.
pub(crate) async fn sleep_or_shutdown(
    shutdown: &mut watch::Receiver<bool>,
    period: Duration,
) -> bool {
    if *shutdown.borrow() {
        return true;
    }
    tokio::select! {
        _ = tokio::time::sleep(period) => false,
        _ = shutdown_requested(shutdown) => true,
    }
}
