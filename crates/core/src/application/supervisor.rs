// Worker Loop Supervisor
// Restarts loops whose tick chain has stopped (e.g. a panic inside a tick)

use crate::application::worker::constants::DEFAULT_SUPERVISOR_INTERVAL;
use crate::application::worker::{ShutdownToken, WorkerLoop};
use crate::port::TimeProvider;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    pub check_interval: Duration,
    /// Fixed stall threshold; when `None` it is derived per loop as
    /// longest reschedule delay + lock timeout + check interval
    pub stall_threshold: Option<Duration>,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            check_interval: DEFAULT_SUPERVISOR_INTERVAL,
            stall_threshold: None,
        }
    }
}

/// Watches worker heartbeats.
///
/// A loop that is not inside a tick and has not finished one within its
/// stall threshold has lost its chain; it is restarted with a new generation.
pub struct Supervisor {
    loops: Vec<Arc<WorkerLoop>>,
    time_provider: Arc<dyn TimeProvider>,
    config: SupervisorConfig,
}

impl Supervisor {
    pub fn new(
        loops: Vec<Arc<WorkerLoop>>,
        time_provider: Arc<dyn TimeProvider>,
        config: SupervisorConfig,
    ) -> Self {
        Self {
            loops,
            time_provider,
            config,
        }
    }

    pub fn loops(&self) -> &[Arc<WorkerLoop>] {
        &self.loops
    }

    /// Start every loop's first tick
    pub fn start_all(&self) {
        for worker in &self.loops {
            worker.start();
        }
        info!(loops = self.loops.len(), "Worker loops started");
    }

    fn stall_threshold(&self, worker: &WorkerLoop) -> Duration {
        self.config.stall_threshold.unwrap_or_else(|| {
            worker.policy().max_delay() + worker.queue().lock_timeout + self.config.check_interval
        })
    }

    /// Restart stalled loops. Returns how many were restarted.
    pub fn check_once(&self) -> usize {
        let now = self.time_provider.now_millis();
        let mut restarted = 0;

        for worker in &self.loops {
            if worker.is_in_tick() {
                continue;
            }

            let silent_ms = now.saturating_sub(worker.last_tick_at());
            let threshold = self.stall_threshold(worker);
            if silent_ms > threshold.as_millis() as i64 {
                warn!(
                    worker_id = %worker.worker_id(),
                    queue = %worker.queue().name,
                    silent_ms,
                    threshold_ms = threshold.as_millis() as u64,
                    "Worker loop stalled, restarting"
                );
                worker.start();
                restarted += 1;
            }
        }

        if restarted == 0 {
            debug!(loops = self.loops.len(), "All worker loops healthy");
        }
        restarted
    }

    /// Check on an interval until shutdown
    pub async fn run(self, mut shutdown: ShutdownToken) {
        info!(
            interval_ms = self.config.check_interval.as_millis() as u64,
            "Supervisor started"
        );
        let mut tick = interval(self.config.check_interval);
        // The first tick completes immediately; loops were just started
        tick.tick().await;

        loop {
            tokio::select! {
                _ = tick.tick() => {
                    self.check_once();
                }
                _ = shutdown.wait() => {
                    info!("Supervisor stopping");
                    break;
                }
            }
        }
    }
}
