// Hookline Infrastructure - SQLite Adapter
// Implements: QueueStore, LeaseStore, DeadLetterStore, Maintenance

mod connection;
mod dead_letter_store;
mod error;
mod lease_store;
mod maintenance_impl;
mod migration;
mod queue_store;

pub use connection::{create_pool, database_url};
pub use dead_letter_store::SqliteDeadLetterStore;
pub use lease_store::SqliteLeaseStore;
pub use maintenance_impl::SqliteMaintenance;
pub use migration::run_migrations;
pub use queue_store::SqliteQueueStore;

// sqlx::Error -> AppError conversion lives in `error::map_sqlx_error`
// (orphan rules forbid `impl From<sqlx::Error> for AppError` here)
