/*!
 * Index Scheduler
 * Owned periodic sweep with an explicit start/stop lifecycle
 */

use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{error, info};

use super::Indexer;

/// Periodic full-sweep driver
///
/// Owns the background task: `start` runs one immediate sweep then
/// ticks on the interval, `stop` ends the loop, and `tick` runs a
/// single sweep synchronously for deterministic tests. Sweep failures
/// are logged; the loop never dies.
pub struct IndexScheduler {
    indexer: Indexer,
    handle: Option<JoinHandle<()>>,
    shutdown: Option<watch::Sender<bool>>,
}

impl IndexScheduler {
    pub fn new(indexer: Indexer) -> Self {
        Self {
            indexer,
            handle: None,
            shutdown: None,
        }
    }

    /// Run a single sweep on the calling thread
    pub fn tick(&self) {
        if let Err(e) = self.indexer.index_all_roots() {
            error!(error = %e, "index sweep failed");
        }
    }

    /// Start the periodic sweep: one immediate pass, then every
    /// `interval` for the lifetime of the task
    pub fn start(&mut self, interval: Duration) {
        if self.handle.is_some() {
            return;
        }
        // tokio::time::interval panics on a zero period
        let interval = interval.max(Duration::from_secs(1));
        let (tx, mut rx) = watch::channel(false);
        let indexer = self.indexer.clone();
        info!(interval_secs = interval.as_secs(), "index scheduler started");

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let sweep = indexer.clone();
                        match tokio::task::spawn_blocking(move || sweep.index_all_roots()).await {
                            Ok(Err(e)) => error!(error = %e, "index sweep failed"),
                            Err(e) => error!(error = %e, "index sweep panicked"),
                            Ok(Ok(_)) => {}
                        }
                    }
                    _ = rx.changed() => {
                        info!("index scheduler stopped");
                        break;
                    }
                }
            }
        });
        self.handle = Some(handle);
        self.shutdown = Some(tx);
    }

    /// Stop the periodic sweep; an in-flight pass runs to completion
    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(true);
        }
        self.handle = None;
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }
}

impl Drop for IndexScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}
