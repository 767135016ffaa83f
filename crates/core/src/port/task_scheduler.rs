// Task Scheduler Port
// "Run this future after this delay" - the only way a worker loop continues

use futures::future::BoxFuture;
use std::time::Duration;

/// A unit of deferred work
pub type ScheduledTask = BoxFuture<'static, ()>;

/// Delayed task submission
///
/// `schedule` must return immediately; the task runs later on the host's
/// executor. Implementations may drop tasks after shutdown.
pub trait TaskScheduler: Send + Sync {
    fn schedule(&self, delay: Duration, task: ScheduledTask);
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Records scheduled tasks; tests step through them by hand
    #[derive(Default)]
    pub struct ManualScheduler {
        queue: Mutex<VecDeque<(Duration, ScheduledTask)>>,
        history: Mutex<Vec<Duration>>,
    }

    impl ManualScheduler {
        pub fn new() -> Self {
            Self::default()
        }

        /// Number of tasks waiting to run
        pub fn pending(&self) -> usize {
            self.queue.lock().unwrap().len()
        }

        /// Every delay ever requested, in order
        pub fn delays(&self) -> Vec<Duration> {
            self.history.lock().unwrap().clone()
        }

        pub fn last_delay(&self) -> Option<Duration> {
            self.history.lock().unwrap().last().copied()
        }

        /// Run the oldest pending task (ignoring its delay).
        /// Returns the delay it was scheduled with.
        pub async fn run_next(&self) -> Option<Duration> {
            let next = self.queue.lock().unwrap().pop_front();
            match next {
                Some((delay, task)) => {
                    task.await;
                    Some(delay)
                }
                None => None,
            }
        }

        /// Drop every pending task
        pub fn clear(&self) {
            self.queue.lock().unwrap().clear();
        }
    }

    impl TaskScheduler for ManualScheduler {
        fn schedule(&self, delay: Duration, task: ScheduledTask) {
            self.history.lock().unwrap().push(delay);
            self.queue.lock().unwrap().push_back((delay, task));
        }
    }
}
