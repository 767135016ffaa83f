// Port Layer - Interfaces for external dependencies

pub mod dead_letter_store;
pub mod id_provider; // For deterministic testing
pub mod item_handler;
pub mod lease_store;
pub mod maintenance;
pub mod queue_store;
pub mod task_scheduler;
pub mod time_provider;

// Re-exports
pub use dead_letter_store::DeadLetterStore;
pub use id_provider::IdProvider;
pub use item_handler::{FnHandler, HandlerError, ItemHandler};
pub use lease_store::LeaseStore;
pub use maintenance::{Maintenance, MaintenanceConfig, MaintenanceStats, SweepReport};
pub use queue_store::{EnqueueOutcome, QueueStore};
pub use task_scheduler::{ScheduledTask, TaskScheduler};
pub use time_provider::TimeProvider;
