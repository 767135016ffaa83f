// Tokio-backed TaskScheduler

use super::shutdown::ShutdownToken;
use crate::port::{ScheduledTask, TaskScheduler};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tracing::debug;

/// Spawns each task on the tokio runtime after its delay.
///
/// After shutdown, new tasks are dropped and sleeping ones are abandoned;
/// a task that already started runs to completion (see `wait_idle`).
#[derive(Clone)]
pub struct TokioTaskScheduler {
    shutdown: ShutdownToken,
    in_flight: Arc<AtomicUsize>,
    idle: Arc<Notify>,
}

impl TokioTaskScheduler {
    pub fn new(shutdown: ShutdownToken) -> Self {
        Self {
            shutdown,
            in_flight: Arc::new(AtomicUsize::new(0)),
            idle: Arc::new(Notify::new()),
        }
    }

    /// Tasks spawned and not yet finished (sleeping or running)
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Resolve once no task is in flight
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.idle.notified();
            if self.in_flight() == 0 {
                return;
            }
            notified.await;
        }
    }
}

/// Decrements the in-flight count on drop, including on unwind
struct InFlightGuard {
    in_flight: Arc<AtomicUsize>,
    idle: Arc<Notify>,
}

impl InFlightGuard {
    fn enter(in_flight: Arc<AtomicUsize>, idle: Arc<Notify>) -> Self {
        in_flight.fetch_add(1, Ordering::SeqCst);
        Self { in_flight, idle }
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if self.in_flight.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.idle.notify_waiters();
        }
    }
}

impl TaskScheduler for TokioTaskScheduler {
    fn schedule(&self, delay: Duration, task: ScheduledTask) {
        if self.shutdown.is_shutdown() {
            debug!("Scheduler shut down, dropping task");
            return;
        }

        let mut shutdown = self.shutdown.clone();
        let guard = InFlightGuard::enter(self.in_flight.clone(), self.idle.clone());

        tokio::spawn(async move {
            let _guard = guard;
            if !delay.is_zero() {
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {},
                    _ = shutdown.wait() => return,
                }
            }
            if shutdown.is_shutdown() {
                return;
            }
            task.await;
        });
    }
}
