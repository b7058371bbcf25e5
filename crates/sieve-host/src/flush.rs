//! Periodic persistence of the blocked-request count

use std::sync::Arc;
use std::time::Duration;

use sieve_core::CountStore;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

use crate::engine::FilterEngine;

/// Running flusher. Dropping the handle without [`FlusherHandle::shutdown`]
/// leaves the task running until the runtime stops.
pub struct FlusherHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl FlusherHandle {
    /// Stop the task after one final flush.
    pub async fn shutdown(self) {
        // The task may already be gone; nothing left to signal then
        let _ = self.shutdown.send(true);
        if let Err(err) = self.task.await {
            log::error!("count flusher task failed: {err}");
        }
    }
}

/// Flush the engine's pending blocks to `store` every `period`, and once more
/// on shutdown.
pub fn spawn_count_flusher(
    engine: Arc<FilterEngine>,
    store: Arc<dyn CountStore>,
    period: Duration,
) -> FlusherHandle {
    let (shutdown, mut shutdown_rx) = watch::channel(false);

    let task = tokio::spawn(async move {
        let mut tick = time::interval(period);
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first tick completes immediately
        tick.tick().await;

        loop {
            tokio::select! {
                _ = tick.tick() => flush(&engine, store.as_ref()),
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        log::debug!("count flusher shutting down");
                        flush(&engine, store.as_ref());
                        break;
                    }
                }
            }
        }
    });

    FlusherHandle { shutdown, task }
}

fn flush(engine: &FilterEngine, store: &dyn CountStore) {
    if let Err(err) = engine.flush_count(store) {
        log::error!("failed to persist blocked-request count: {err}");
    }
}
