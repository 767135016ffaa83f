//! JSON-RPC API Layer
//!
//! Operator and ingestion surface over the queue core: admission,
//! queue inspection, dead-letter listing and replay, stats, maintenance.

pub mod error;
pub mod handler;
pub mod rate_limiter;
pub mod server;
pub mod types;

pub use handler::{RpcHandler, RpcServices};
pub use server::{RpcServer, RpcServerConfig};
