use std::sync::Arc;
use std::time::Duration;

use gateway_std::time::GetNow;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::cache::TokenCache;

pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

const MIN_SWEEP_INTERVAL: Duration = Duration::from_millis(1);
const MAX_SWEEP_INTERVAL: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Owns the background sweep task.
///
/// [`shutdown`](Self::shutdown) stops it and waits for it to finish. Dropping
/// the handle also stops the task, without waiting.
pub struct SweeperHandle {
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl SweeperHandle {
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(());
        if let Err(e) = self.task.await {
            tracing::warn!(error = %e, "Cache sweeper task ended abnormally");
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

/// Spawns a task that calls [`TokenCache::sweep`] every `interval`.
///
/// The first sweep happens one full interval after spawning. The interval is
/// clamped to between one millisecond and one year. Must be called from
/// within a tokio runtime.
pub fn spawn_sweeper<C: GetNow>(cache: Arc<TokenCache<C>>, interval: Duration) -> SweeperHandle {
    let (shutdown, mut shutdown_rx) = oneshot::channel::<()>();
    let period = interval.clamp(MIN_SWEEP_INTERVAL, MAX_SWEEP_INTERVAL);

    let task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(interval_ms = period.as_millis() as u64, "Cache sweeper started");

        loop {
            tokio::select! {
                _ = &mut shutdown_rx => break,
                _ = ticker.tick() => {
                    let removed = cache.sweep();
                    if removed > 0 {
                        debug!(removed, remaining = cache.len(), "Swept expired cache entries");
                    }
                }
            }
        }

        info!("Cache sweeper stopped");
    });

    SweeperHandle { shutdown, task }
}
