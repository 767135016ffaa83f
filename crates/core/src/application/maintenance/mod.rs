// Maintenance Service
// Periodic expiry sweeps and VACUUM

use crate::application::worker::ShutdownToken;
use crate::error::Result;
use crate::port::{Maintenance, MaintenanceConfig, SweepReport};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;
use tracing::{error, info};

/// Runs `Maintenance::run_full_maintenance` in the background
pub struct MaintenanceScheduler {
    maintenance: Arc<dyn Maintenance>,
    config: MaintenanceConfig,
    interval: Duration,
}

impl MaintenanceScheduler {
    /// # Arguments
    /// * `maintenance` - Maintenance implementation
    /// * `config` - Maintenance configuration
    /// * `interval_minutes` - How often to sweep
    pub fn new(
        maintenance: Arc<dyn Maintenance>,
        config: MaintenanceConfig,
        interval_minutes: u64,
    ) -> Self {
        Self {
            maintenance,
            config,
            interval: Duration::from_secs(interval_minutes.max(1) * 60),
        }
    }

    /// Sweep every interval until shutdown. The first sweep runs immediately.
    pub async fn run(self, mut shutdown: ShutdownToken) {
        info!(
            interval_secs = self.interval.as_secs(),
            max_db_size_mb = self.config.max_db_size_mb,
            "Maintenance scheduler started"
        );

        let mut tick = interval(self.interval);

        loop {
            tokio::select! {
                _ = tick.tick() => {}
                _ = shutdown.wait() => {
                    info!("Maintenance scheduler stopping");
                    break;
                }
            }

            if let Err(e) = self.maintenance.run_full_maintenance(&self.config).await {
                error!(error = ?e, "Scheduled maintenance failed");
            }
        }
    }

    /// Run maintenance immediately (manual trigger)
    pub async fn run_now(&self) -> Result<SweepReport> {
        info!("Running manual maintenance...");
        let report = self.maintenance.run_full_maintenance(&self.config).await?;
        info!(
            expired_items = report.expired_items,
            expired_dead_letters = report.expired_dead_letters,
            "Manual maintenance completed"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::MaintenanceStats;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingMaintenance {
        sweeps: AtomicUsize,
        vacuums: AtomicUsize,
        db_size_mb: f64,
    }

    #[async_trait]
    impl Maintenance for CountingMaintenance {
        async fn vacuum(&self) -> Result<f64> {
            self.vacuums.fetch_add(1, Ordering::SeqCst);
            Ok(1.5)
        }

        async fn purge_expired_items(&self) -> Result<u64> {
            self.sweeps.fetch_add(1, Ordering::SeqCst);
            Ok(4)
        }

        async fn purge_expired_dead_letters(&self) -> Result<u64> {
            Ok(2)
        }

        async fn purge_expired_leases(&self) -> Result<u64> {
            Ok(1)
        }

        async fn get_stats(&self) -> Result<MaintenanceStats> {
            Ok(MaintenanceStats {
                db_size_mb: self.db_size_mb,
                ..Default::default()
            })
        }
    }

    #[tokio::test]
    async fn test_run_now_reports_sweep() {
        let maintenance = Arc::new(CountingMaintenance::default());
        let scheduler =
            MaintenanceScheduler::new(maintenance.clone(), MaintenanceConfig::default(), 60);

        let report = scheduler.run_now().await.unwrap();
        assert_eq!(
            report,
            SweepReport {
                expired_items: 4,
                expired_dead_letters: 2,
                expired_leases: 1,
                vacuumed: false,
                reclaimed_mb: 0.0,
            }
        );
        assert_eq!(maintenance.vacuums.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_vacuum_only_over_ceiling() {
        let maintenance = Arc::new(CountingMaintenance {
            db_size_mb: 600.0,
            ..Default::default()
        });
        let scheduler =
            MaintenanceScheduler::new(maintenance.clone(), MaintenanceConfig::default(), 60);

        let report = scheduler.run_now().await.unwrap();
        assert!(report.vacuumed);
        assert_eq!(report.reclaimed_mb, 1.5);
        assert_eq!(maintenance.vacuums.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_run_sweeps_then_stops_on_shutdown() {
        let maintenance = Arc::new(CountingMaintenance::default());
        let scheduler =
            MaintenanceScheduler::new(maintenance.clone(), MaintenanceConfig::default(), 60);
        let (tx, token) = crate::application::worker::shutdown_channel();

        let handle = tokio::spawn(scheduler.run(token));
        tokio::time::sleep(Duration::from_millis(50)).await;
        tx.shutdown();
        handle.await.unwrap();

        assert_eq!(maintenance.sweeps.load(Ordering::SeqCst), 1);
    }
}
