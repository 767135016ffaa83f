//! RPC Request/Response Types
//!
//! JSON-RPC method parameters and results.

use hookline_core::domain::{DeadLetterEntry, QueueItem};
use serde::{Deserialize, Serialize};

/// ingest.admit.v1 - Admit a payload into a queue
#[derive(Debug, Deserialize)]
pub struct AdmitRequest {
    pub queue: String,
    #[serde(default = "default_source")]
    pub source: String,
    pub payload: serde_json::Value,
}

fn default_source() -> String {
    "rpc".to_string()
}

#[derive(Debug, Clone, Serialize)]
pub struct AdmitResponse {
    pub item_id: String,
    pub queue: String,
    pub depth: u64,
}

/// queue.depth.v1 / queue.peek.v1 / queue.flush.v1
#[derive(Debug, Deserialize)]
pub struct QueueRequest {
    pub queue: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct DepthResponse {
    pub queue: String,
    pub depth: u64,
    pub max_depth: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PeekResponse {
    pub queue: String,
    pub head: Option<QueueItem>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FlushResponse {
    pub queue: String,
    pub removed: u64,
}

/// deadletter.list.v1 - List dead-letter entries, oldest first
#[derive(Debug, Deserialize)]
pub struct DeadLetterListRequest {
    #[serde(default)]
    pub queue: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    50
}

#[derive(Debug, Clone, Serialize)]
pub struct DeadLetterListResponse {
    /// Unexpired entries matching the filter (not just this page)
    pub total: u64,
    pub entries: Vec<DeadLetterEntry>,
}

/// deadletter.replay.v1 - Replay one entry, or a queue's oldest entries
#[derive(Debug, Deserialize)]
pub struct DeadLetterReplayRequest {
    #[serde(default)]
    pub entry_id: Option<String>,
    #[serde(default)]
    pub queue: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeadLetterReplayResponse {
    pub replayed: Vec<String>,
    pub stopped_on_backpressure: bool,
}

/// admin.stats.v1 - Queue and storage statistics
#[derive(Debug, Default, Deserialize)]
pub struct StatsRequest {
    // No parameters needed
}

#[derive(Debug, Clone, Serialize)]
pub struct QueueStats {
    pub name: String,
    pub depth: u64,
    pub max_depth: u64,
    pub batch_size: usize,
    pub dead_letters: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    pub queues: Vec<QueueStats>,
    pub stored_items: i64,
    pub dead_letters: i64,
    pub active_leases: i64,
    pub db_size_bytes: i64,
    pub uptime_seconds: u64,
}

/// admin.maintenance.v1 - Run manual maintenance
#[derive(Debug, Default, Deserialize)]
pub struct MaintenanceRequest {
    #[serde(default)]
    pub force_vacuum: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct MaintenanceResponse {
    pub vacuum_run: bool,
    pub expired_items: u64,
    pub expired_dead_letters: u64,
    pub expired_leases: u64,
    pub db_size_before: i64,
    pub db_size_after: i64,
}
