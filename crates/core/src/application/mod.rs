// Application Layer - Queue use cases

pub mod admission;
pub mod claim;
pub mod dead_letter;
pub mod maintenance;
pub mod replay;
pub mod supervisor;
pub mod worker;

// Re-exports
pub use admission::{Admitted, AdmissionController};
pub use claim::{BatchClaimer, ClaimedBatch};
pub use dead_letter::DeadLetterRouter;
pub use maintenance::MaintenanceScheduler;
pub use replay::{DeadLetterReplayer, ReplayReport};
pub use supervisor::{Supervisor, SupervisorConfig};
pub use worker::{
    shutdown_channel, ReschedulePolicy, ShutdownSender, ShutdownToken, TickOutcome,
    TokioTaskScheduler, WorkerLoop, WorkerState,
};
