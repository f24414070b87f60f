//! Zone snapshot refresher
//!
//! Rebuilds the record cache from the DNS backend on a fixed period. Each
//! run fully replaces the persisted cache, so a record deleted upstream
//! disappears from the cache at the next run. A failed run leaves the
//! previous cache in place.

use std::time::Duration;

use tokio::sync::watch;
use tracing::{error, info};

use super::{shutdown_requested, sleep_or_shutdown, EventSink, ZonewatchEvent};
use crate::cache::{RecordCache, RecordCacheStore};
use crate::config::RefresherConfig;
use crate::error::Result;

/// Periodic cache refresher
#[derive(Debug)]
pub struct Refresher {
    cache: RecordCacheStore,
    interval: Duration,
    refresh_on_start: bool,
    events: EventSink,
}

impl Refresher {
    /// Create a refresher
    pub fn new(cache: RecordCacheStore, config: &RefresherConfig, events: EventSink) -> Self {
        Self {
            cache,
            interval: Duration::from_secs(config.interval_secs),
            refresh_on_start: config.refresh_on_start,
            events,
        }
    }

    /// Snapshot the backend and replace the persisted cache once
    pub async fn refresh_once(&self) -> Result<RecordCache> {
        match self.cache.rebuild().await {
            Ok(cache) => {
                info!("Record cache refreshed: {} record(s)", cache.len());
                self.events.emit(ZonewatchEvent::CacheRefreshed {
                    records: cache.len(),
                });
                Ok(cache)
            }
            Err(e) => {
                error!("Record cache refresh failed, keeping previous cache: {}", e);
                self.events.emit(ZonewatchEvent::RefreshFailed {
                    error: e.to_string(),
                });
                Err(e)
            }
        }
    }

    /// Run until shutdown is requested
    ///
    /// The first refresh happens one interval after start unless
    /// `refresh_on_start` is set. Failures are absorbed until the next run.
    pub async fn run_with_shutdown(self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        info!("Refresher started (interval {:?})", self.interval);

        let mut due = self.refresh_on_start;
        loop {
            if due {
                tokio::select! {
                    _ = self.refresh_once() => {}
                    _ = shutdown_requested(&mut shutdown) => break,
                }
            }
            due = true;

            if sleep_or_shutdown(&mut shutdown, self.interval).await {
                break;
            }
        }

        info!("Refresher stopped");
        self.events.emit(ZonewatchEvent::Stopped {
            task: "refresher",
            reason: "Shutdown signal".to_string(),
        });
        Ok(())
    }
}
