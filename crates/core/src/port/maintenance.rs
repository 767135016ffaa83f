// Store Maintenance port
use crate::error::Result;
use async_trait::async_trait;

/// Storage statistics
#[derive(Debug, Clone, Default)]
pub struct MaintenanceStats {
    pub db_size_mb: f64,
    pub db_size_bytes: i64,
    /// Items across all queues, including expired-but-unswept ones
    pub stored_items: i64,
    pub dead_letters: i64,
    pub active_leases: i64,
}

/// Maintenance configuration
#[derive(Debug, Clone)]
pub struct MaintenanceConfig {
    /// DB size above which VACUUM runs (MB)
    pub max_db_size_mb: f64,
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            max_db_size_mb: 512.0,
        }
    }
}

/// What one sweep removed
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SweepReport {
    pub expired_items: u64,
    pub expired_dead_letters: u64,
    pub expired_leases: u64,
    pub vacuumed: bool,
    pub reclaimed_mb: f64,
}

/// Expiry sweeps and storage upkeep
#[async_trait]
pub trait Maintenance: Send + Sync {
    /// Reclaim space. Returns MB reclaimed.
    async fn vacuum(&self) -> Result<f64>;

    /// Delete items of queues whose TTL has passed
    async fn purge_expired_items(&self) -> Result<u64>;

    /// Delete dead-letter entries past their expiry
    async fn purge_expired_dead_letters(&self) -> Result<u64>;

    /// Delete leases left behind by crashed holders
    async fn purge_expired_leases(&self) -> Result<u64>;

    async fn get_stats(&self) -> Result<MaintenanceStats>;

    /// Purge everything expired, then VACUUM if the DB is over its ceiling
    async fn run_full_maintenance(&self, config: &MaintenanceConfig) -> Result<SweepReport> {
        let expired_items = self.purge_expired_items().await?;
        let expired_dead_letters = self.purge_expired_dead_letters().await?;
        let expired_leases = self.purge_expired_leases().await?;

        let stats = self.get_stats().await?;
        let vacuumed = stats.db_size_mb > config.max_db_size_mb;
        let reclaimed_mb = if vacuumed { self.vacuum().await? } else { 0.0 };

        tracing::info!(
            expired_items,
            expired_dead_letters,
            expired_leases,
            reclaimed_mb,
            "Maintenance sweep completed"
        );

        Ok(SweepReport {
            expired_items,
            expired_dead_letters,
            expired_leases,
            vacuumed,
            reclaimed_mb,
        })
    }
}
