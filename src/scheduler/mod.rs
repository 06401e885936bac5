//! Background sweeps: scheduled-message delivery plus the maintenance
//! sweeps (upload cleanup, usage digest, health snapshot).
//!
//! Every sweep is an explicit interval ticker over the store — there is no
//! in-memory job queue, so a restart between sweeps loses nothing.

pub mod maintenance;

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;

use crate::channels::Channel;
use crate::config::BotConfig;
use crate::error::StoreError;
use crate::store::Store;

pub use maintenance::HealthSnapshot;

/// Outcome of one delivery sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub delivered: usize,
    pub failed: usize,
}

/// Drives the periodic sweeps against the store and channel.
pub struct Scheduler {
    config: Arc<BotConfig>,
    store: Arc<dyn Store>,
    channel: Arc<dyn Channel>,
    health_tx: broadcast::Sender<HealthSnapshot>,
    started_at: Instant,
    /// Serializes overlapping sweep invocations so a row is never picked up
    /// by two sweeps at once.
    sweep_lock: Mutex<()>,
}

impl Scheduler {
    pub fn new(config: Arc<BotConfig>, store: Arc<dyn Store>, channel: Arc<dyn Channel>) -> Self {
        let (health_tx, _) = broadcast::channel(16);
        Self {
            config,
            store,
            channel,
            health_tx,
            started_at: Instant::now(),
            sweep_lock: Mutex::new(()),
        }
    }

    /// Subscribe to health snapshots published by the health sweep.
    pub fn subscribe_health(&self) -> broadcast::Receiver<HealthSnapshot> {
        self.health_tx.subscribe()
    }

    /// Deliver every pending scheduled message whose time has passed.
    ///
    /// Sends are concurrent with a per-recipient timeout; one failing row
    /// never blocks the others. A row only transitions to sent after its
    /// send succeeded, so a crash mid-sweep re-delivers rather than drops.
    pub async fn run_delivery_sweep(
        &self,
        now: DateTime<Utc>,
    ) -> Result<SweepReport, StoreError> {
        let _guard = self.sweep_lock.lock().await;

        let due = self.store.list_due_pending(now).await?;
        if due.is_empty() {
            return Ok(SweepReport::default());
        }
        tracing::info!(count = due.len(), "Delivering due scheduled messages");

        let timeout = self.config.send_timeout;
        let attempts = due.into_iter().map(|row| {
            let channel = Arc::clone(&self.channel);
            let store = Arc::clone(&self.store);
            async move {
                let sent =
                    tokio::time::timeout(timeout, channel.send(&row.conversation_id, &row.message))
                        .await;
                match sent {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => {
                        tracing::warn!(id = row.id, "Scheduled send failed: {e}");
                        return false;
                    }
                    Err(_) => {
                        tracing::warn!(id = row.id, "Scheduled send timed out");
                        return false;
                    }
                }

                match store.mark_delivered(row.id).await {
                    // false means another invocation marked it first; the
                    // message went out either way.
                    Ok(_) => true,
                    Err(e) => {
                        tracing::error!(id = row.id, "Failed to mark delivered: {e}");
                        false
                    }
                }
            }
        });

        let results = futures::future::join_all(attempts).await;
        let delivered = results.iter().filter(|ok| **ok).count();
        let report = SweepReport {
            delivered,
            failed: results.len() - delivered,
        };

        if report.failed > 0 {
            tracing::warn!(
                delivered = report.delivered,
                failed = report.failed,
                "Delivery sweep finished with failures"
            );
        } else {
            tracing::info!(delivered = report.delivered, "Delivery sweep finished");
        }
        Ok(report)
    }
}

/// Handles for the spawned sweep tasks.
pub struct SweepHandles {
    handles: Vec<JoinHandle<()>>,
}

impl SweepHandles {
    /// Abort all sweep tasks.
    pub fn shutdown(self) {
        for handle in self.handles {
            handle.abort();
        }
    }
}

/// Spawn all four sweep tickers at their configured intervals.
pub fn spawn_all(scheduler: Arc<Scheduler>) -> SweepHandles {
    let config = Arc::clone(&scheduler.config);
    SweepHandles {
        handles: vec![
            spawn_ticker(Arc::clone(&scheduler), config.sweep_interval, |s| async move {
                if let Err(e) = s.run_delivery_sweep(Utc::now()).await {
                    tracing::error!("Delivery sweep failed: {e}");
                }
            }),
            spawn_ticker(Arc::clone(&scheduler), config.cleanup_interval, |s| async move {
                s.run_cleanup_sweep().await;
            }),
            spawn_ticker(Arc::clone(&scheduler), config.digest_interval, |s| async move {
                s.run_digest_sweep().await;
            }),
            spawn_ticker(scheduler, config.health_interval, |s| async move {
                s.run_health_sweep().await;
            }),
        ],
    }
}

/// Spawn one interval ticker running `sweep` on each tick.
fn spawn_ticker<F, Fut>(scheduler: Arc<Scheduler>, interval: Duration, sweep: F) -> JoinHandle<()>
where
    F: Fn(Arc<Scheduler>) -> Fut + Send + 'static,
    Fut: std::future::Future<Output = ()> + Send,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // Skip immediate first tick
        ticker.tick().await;

        loop {
            ticker.tick().await;
            sweep(Arc::clone(&scheduler)).await;
        }
    })
}
