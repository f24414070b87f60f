//! Concurrency supervisor
//!
//! Starts the reconciler and the refresher as two independent tasks and
//! waits for them. Under normal operation neither finishes; the supervisor
//! returns only after a shutdown request or when a task fails.
//!
//! There is no restart-on-crash: if either task errors or panics, the other
//! is asked to stop and the failure is returned to the caller.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::{JoinError, JoinHandle};
use tracing::{error, info, warn};

use super::{event_channel, shutdown_requested, Reconciler, Refresher, ZonewatchEvent};
use crate::cache::RecordCacheStore;
use crate::config::ZonewatchConfig;
use crate::error::{Error, Result};
use crate::traits::{CacheStorage, DnsBackend, IpOracle};

/// How long stopped tasks get to finish before they are aborted
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

type TaskHandle = JoinHandle<Result<()>>;

/// Runs the reconciler and the refresher side by side
#[derive(Debug)]
pub struct Supervisor {
    reconciler: Reconciler,
    refresher: Refresher,
}

impl Supervisor {
    /// Wire both tasks from configuration
    ///
    /// # Returns
    ///
    /// A tuple of (supervisor, event_receiver) where event_receiver yields
    /// events from both tasks
    pub fn new(
        oracle: Arc<dyn IpOracle>,
        backend: Arc<dyn DnsBackend>,
        storage: Arc<dyn CacheStorage>,
        config: &ZonewatchConfig,
    ) -> Result<(Self, mpsc::Receiver<ZonewatchEvent>)> {
        config.reconciler.validate()?;
        config.refresher.validate()?;

        let (events, rx) = event_channel(config.reconciler.event_channel_capacity);
        let cache = RecordCacheStore::new(storage, backend.clone());

        let reconciler = Reconciler::new(
            oracle,
            backend,
            cache.clone(),
            &config.reconciler,
            events.clone(),
        );
        let refresher = Refresher::new(cache, &config.refresher, events);

        Ok((Self::from_parts(reconciler, refresher), rx))
    }

    /// Build from already constructed tasks
    pub fn from_parts(reconciler: Reconciler, refresher: Refresher) -> Self {
        Self {
            reconciler,
            refresher,
        }
    }

    /// Run until SIGINT/SIGTERM
    pub async fn run(self) -> Result<()> {
        let (tx, rx) = watch::channel(false);

        let signals = tokio::spawn(async move {
            let signal = wait_for_signal().await;
            info!("Received shutdown signal: {}", signal);
            let _ = tx.send(true);
        });

        let result = self.run_with_shutdown(rx).await;
        signals.abort();
        result
    }

    /// Run until `shutdown` becomes `true` (or its sender is dropped)
    pub async fn run_with_shutdown(self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        let (stop_tx, stop_rx) = watch::channel(false);

        let mut reconciler: TaskHandle =
            tokio::spawn(self.reconciler.run_with_shutdown(stop_rx.clone()));
        let mut refresher: TaskHandle = tokio::spawn(self.refresher.run_with_shutdown(stop_rx));
        info!("Supervisor started reconciler and refresher");

        // Whichever finishes first decides the outcome
        let (first, remaining) = tokio::select! {
            _ = shutdown_requested(&mut shutdown) => {
                info!("Shutdown requested, stopping tasks");
                (None, vec![("reconciler", reconciler), ("refresher", refresher)])
            }
            res = &mut reconciler => (Some(task_result("reconciler", res)), vec![("refresher", refresher)]),
            res = &mut refresher => (Some(task_result("refresher", res)), vec![("reconciler", reconciler)]),
        };

        let _ = stop_tx.send(true);

        let mut outcome = match first {
            None => Ok(()),
            // Tasks only return on shutdown, so any return here is abnormal
            Some(Ok(())) => Err(Error::task("supervisor", "task exited unexpectedly")),
            Some(Err(e)) => Err(e),
        };
        if let Err(e) = &outcome {
            error!("Supervised task failed: {}", e);
        }

        for (name, handle) in remaining {
            let abort = handle.abort_handle();
            match tokio::time::timeout(SHUTDOWN_GRACE, handle).await {
                Ok(res) => {
                    if let Err(e) = task_result(name, res) {
                        error!("Task {} failed during shutdown: {}", name, e);
                        if outcome.is_ok() {
                            outcome = Err(e);
                        }
                    }
                }
                Err(_) => {
                    warn!("Task {} did not stop within {:?}, aborting", name, SHUTDOWN_GRACE);
                    abort.abort();
                }
            }
        }

        info!("Supervisor stopped");
        outcome
    }
}

fn task_result(
    name: &'static str,
    res: std::result::Result<Result<()>, JoinError>,
) -> Result<()> {
    match res {
        Ok(inner) => inner,
        Err(e) if e.is_panic() => Err(Error::task(name, "panicked")),
        Err(e) => Err(Error::task(name, e.to_string())),
    }
}

/// Wait for SIGTERM or SIGINT
#[cfg(unix)]
async fn wait_for_signal() -> &'static str {
    use tokio::signal::unix::{signal, SignalKind};

    let (mut sigterm, mut sigint) = match (
        signal(SignalKind::terminate()),
        signal(SignalKind::interrupt()),
    ) {
        (Ok(term), Ok(int)) => (term, int),
        (Err(e), _) | (_, Err(e)) => {
            warn!("Failed to install signal handlers ({}), falling back to CTRL-C", e);
            return wait_for_ctrl_c().await;
        }
    };

    tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    }
}

/// Wait for CTRL-C
///
/// Fallback for non-Unix platforms.
#[cfg(not(unix))]
async fn wait_for_signal() -> &'static str {
    wait_for_ctrl_c().await
}

async fn wait_for_ctrl_c() -> &'static str {
    match tokio::signal::ctrl_c().await {
        Ok(()) => "SIGINT",
        Err(e) => {
            // Without any signal source, only process termination stops us
            error!("Failed to wait for CTRL-C: {}", e);
            std::future::pending::<&'static str>().await
        }
    }
}
