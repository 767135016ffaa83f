// Domain Layer - Queue entities and invariants

pub mod dead_letter;
pub mod error;
pub mod item;
pub mod lease;
pub mod queue;

// Re-exports
pub use dead_letter::{DeadLetterEntry, DeadLetterId, MAX_CONTEXT_FRAMES, MAX_FRAME_LEN};
pub use error::DomainError;
pub use item::{ItemId, QueueItem, RawItem};
pub use lease::ProcessingLease;
pub use queue::{QueueDescriptor, QueueName, QueueRegistry};
