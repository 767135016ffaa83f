// Worker - cooperative per-queue processing loop

pub mod constants;
mod panic_guard;
mod policy;
mod scheduler;
mod shutdown;

pub use panic_guard::{execute_guarded_async, PanicGuardResult};
pub use policy::ReschedulePolicy;
pub use scheduler::TokioTaskScheduler;
pub use shutdown::{shutdown_channel, ShutdownSender, ShutdownToken};

use crate::application::{BatchClaimer, DeadLetterRouter};
use crate::domain::{QueueDescriptor, QueueItem};
use crate::port::{HandlerError, ItemHandler, ScheduledTask, TaskScheduler, TimeProvider};
use futures::FutureExt;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU32, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// What a loop is doing right now
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WorkerState {
    Idle = 0,
    Claiming = 1,
    Processing = 2,
    Rescheduling = 3,
}

impl WorkerState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => WorkerState::Claiming,
            2 => WorkerState::Processing,
            3 => WorkerState::Rescheduling,
            _ => WorkerState::Idle,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            WorkerState::Idle => "idle",
            WorkerState::Claiming => "claiming",
            WorkerState::Processing => "processing",
            WorkerState::Rescheduling => "rescheduling",
        }
    }
}

/// Result of one tick
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// A non-empty batch was processed (items may have failed individually)
    Processed { handled: usize, dead_lettered: usize },
    /// Nothing to claim
    Empty,
    /// The tick itself failed (store or lease error)
    Failed(String),
}

/// Per-queue worker loop.
///
/// Each tick claims one batch, hands each item to the handler, routes
/// failures to the dead-letter store, then schedules the next tick through
/// the `TaskScheduler`. There is no blocking sleep: between ticks the loop
/// is just a pending task.
///
/// A failed item never fails the tick, and a failed tick never stops the
/// loop: every tick ends with exactly one reschedule.
pub struct WorkerLoop {
    worker_id: String,
    queue: QueueDescriptor,
    claimer: Arc<BatchClaimer>,
    handler: Arc<dyn ItemHandler>,
    dead_letters: Arc<DeadLetterRouter>,
    scheduler: Arc<dyn TaskScheduler>,
    time_provider: Arc<dyn TimeProvider>,
    policy: ReschedulePolicy,
    state: AtomicU8,
    consecutive_errors: AtomicU32,
    last_tick_at: AtomicI64,
    in_tick: AtomicBool,
    generation: AtomicU64,
}

impl WorkerLoop {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        worker_id: impl Into<String>,
        queue: QueueDescriptor,
        claimer: Arc<BatchClaimer>,
        handler: Arc<dyn ItemHandler>,
        dead_letters: Arc<DeadLetterRouter>,
        scheduler: Arc<dyn TaskScheduler>,
        time_provider: Arc<dyn TimeProvider>,
        policy: ReschedulePolicy,
    ) -> Self {
        let now = time_provider.now_millis();
        Self {
            worker_id: worker_id.into(),
            queue,
            claimer,
            handler,
            dead_letters,
            scheduler,
            time_provider,
            policy,
            state: AtomicU8::new(WorkerState::Idle as u8),
            consecutive_errors: AtomicU32::new(0),
            last_tick_at: AtomicI64::new(now),
            in_tick: AtomicBool::new(false),
            generation: AtomicU64::new(0),
        }
    }

    pub fn worker_id(&self) -> &str {
        &self.worker_id
    }

    pub fn queue(&self) -> &QueueDescriptor {
        &self.queue
    }

    pub fn policy(&self) -> &ReschedulePolicy {
        &self.policy
    }

    pub fn state(&self) -> WorkerState {
        WorkerState::from_u8(self.state.load(Ordering::SeqCst))
    }

    pub fn consecutive_errors(&self) -> u32 {
        self.consecutive_errors.load(Ordering::SeqCst)
    }

    /// Heartbeat: when the last tick finished (or the loop was created)
    pub fn last_tick_at(&self) -> i64 {
        self.last_tick_at.load(Ordering::SeqCst)
    }

    pub fn is_in_tick(&self) -> bool {
        self.in_tick.load(Ordering::SeqCst)
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Start a new tick chain with zero delay and return its generation.
    ///
    /// Any previous chain retires at its next tick, so a restart never
    /// leaves two chains running the same loop.
    pub fn start(self: &Arc<Self>) -> u64 {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.last_tick_at
            .store(self.time_provider.now_millis(), Ordering::SeqCst);
        info!(
            worker_id = %self.worker_id,
            queue = %self.queue.name,
            generation,
            "Worker loop started"
        );
        self.scheduler
            .schedule(Duration::ZERO, Arc::clone(self).chain(generation));
        generation
    }

    fn chain(self: Arc<Self>, generation: u64) -> ScheduledTask {
        async move {
            if self.generation() != generation {
                debug!(
                    worker_id = %self.worker_id,
                    generation,
                    "Retired tick chain stopping"
                );
                return;
            }

            let (_, delay) = self.tick().await;

            self.set_state(WorkerState::Idle);
            let next = Arc::clone(&self).chain(generation);
            self.scheduler.schedule(delay, next);
        }
        .boxed()
    }

    /// Run one tick and return its outcome with the delay before the next.
    pub async fn tick(&self) -> (TickOutcome, Duration) {
        let _guard = TickGuard::enter(&self.in_tick);

        self.set_state(WorkerState::Claiming);
        let outcome = match self
            .claimer
            .claim_batch(&self.queue.name, self.queue.batch_size, &self.worker_id)
            .await
        {
            // Head was consumed but nothing decoded; more may be waiting
            Ok(claimed) if claimed.items.is_empty() && claimed.dropped > 0 => {
                TickOutcome::Processed {
                    handled: 0,
                    dead_lettered: 0,
                }
            }
            Ok(claimed) if claimed.items.is_empty() => TickOutcome::Empty,
            Ok(claimed) => {
                self.set_state(WorkerState::Processing);
                self.process_batch(claimed.items).await
            }
            Err(e) => {
                error!(
                    worker_id = %self.worker_id,
                    queue = %self.queue.name,
                    error = %e,
                    "Worker tick failed"
                );
                TickOutcome::Failed(e.to_string())
            }
        };

        self.set_state(WorkerState::Rescheduling);
        let errors = match &outcome {
            TickOutcome::Failed(_) => self.consecutive_errors.fetch_add(1, Ordering::SeqCst) + 1,
            _ => {
                self.consecutive_errors.store(0, Ordering::SeqCst);
                0
            }
        };
        let delay = self.policy.next_delay(&outcome, errors);

        if errors >= self.policy.escalation_threshold {
            warn!(
                worker_id = %self.worker_id,
                queue = %self.queue.name,
                consecutive_errors = errors,
                delay_ms = delay.as_millis() as u64,
                "Worker backing off after repeated failures"
            );
        }

        self.last_tick_at
            .store(self.time_provider.now_millis(), Ordering::SeqCst);
        (outcome, delay)
    }

    async fn process_batch(&self, batch: Vec<QueueItem>) -> TickOutcome {
        let mut handled = 0;
        let mut dead_lettered = 0;

        for item in &batch {
            let failure = match execute_guarded_async(self.handler.handle(item)).await {
                PanicGuardResult::Success(Ok(())) => None,
                PanicGuardResult::Success(Err(e)) => Some(e),
                PanicGuardResult::Panicked(msg) => {
                    Some(HandlerError::new(format!("handler panicked: {}", msg)))
                }
            };

            match failure {
                None => handled += 1,
                Some(err) => {
                    if self
                        .dead_letters
                        .route_failure(&self.queue.name, item, &err)
                        .await
                    {
                        dead_lettered += 1;
                    }
                }
            }
        }

        debug!(
            worker_id = %self.worker_id,
            queue = %self.queue.name,
            handled,
            dead_lettered,
            "Batch processed"
        );
        TickOutcome::Processed {
            handled,
            dead_lettered,
        }
    }

    fn set_state(&self, state: WorkerState) {
        self.state.store(state as u8, Ordering::SeqCst);
    }
}

/// Clears the in-tick flag on drop, so a panicking tick is not seen as busy forever
struct TickGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> TickGuard<'a> {
    fn enter(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::SeqCst);
        Self { flag }
    }
}

impl Drop for TickGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}
