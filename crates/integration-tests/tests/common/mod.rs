//! Shared fixture: a temp-file SQLite database with every adapter and use
//! case wired the way the daemon wires them.

#![allow(dead_code)]

use hookline_core::application::{
    AdmissionController, BatchClaimer, DeadLetterReplayer, DeadLetterRouter,
};
use hookline_core::domain::{QueueDescriptor, QueueItem, QueueRegistry};
use hookline_core::port::id_provider::UuidProvider;
use hookline_core::port::time_provider::mocks::ManualTimeProvider;
use hookline_core::port::{DeadLetterStore, HandlerError, LeaseStore, QueueStore, TimeProvider};
use hookline_infra_sqlite::{
    create_pool, database_url, run_migrations, SqliteDeadLetterStore, SqliteLeaseStore,
    SqliteMaintenance, SqliteQueueStore,
};
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

pub const START_MILLIS: i64 = 1_700_000_000_000;

/// Fresh database file under the temp dir, removed on drop
pub struct TestDb {
    pub pool: SqlitePool,
    path: PathBuf,
}

impl TestDb {
    pub async fn new() -> Self {
        let path = std::env::temp_dir().join(format!("hookline-it-{}.db", uuid::Uuid::new_v4()));
        let pool = create_pool(&database_url(&path)).await.unwrap();
        run_migrations(&pool).await.unwrap();
        Self { pool, path }
    }
}

impl Drop for TestDb {
    fn drop(&mut self) {
        for suffix in ["", "-wal", "-shm"] {
            let mut file = self.path.clone().into_os_string();
            file.push(suffix);
            let _ = std::fs::remove_file(file);
        }
    }
}

pub fn descriptor(name: &str, max_depth: u64, batch_size: usize) -> QueueDescriptor {
    QueueDescriptor::new(
        name,
        max_depth,
        batch_size,
        Duration::from_secs(3600),
        Duration::from_secs(5),
    )
}

pub struct Harness {
    pub db: TestDb,
    pub clock: Arc<ManualTimeProvider>,
    pub registry: Arc<QueueRegistry>,
    pub queues: Arc<SqliteQueueStore>,
    pub leases: Arc<SqliteLeaseStore>,
    pub dead_letters: Arc<SqliteDeadLetterStore>,
    pub maintenance: Arc<SqliteMaintenance>,
    pub admission: Arc<AdmissionController>,
    pub claimer: Arc<BatchClaimer>,
    pub router: Arc<DeadLetterRouter>,
    pub replayer: Arc<DeadLetterReplayer>,
}

impl Harness {
    pub async fn new(descriptors: Vec<QueueDescriptor>) -> Self {
        let db = TestDb::new().await;
        let clock = Arc::new(ManualTimeProvider::new(START_MILLIS));
        let registry = Arc::new(QueueRegistry::new(descriptors).unwrap());

        let queues = Arc::new(SqliteQueueStore::new(db.pool.clone(), clock.clone()));
        let leases = Arc::new(SqliteLeaseStore::new(db.pool.clone(), clock.clone()));
        let dead_letters = Arc::new(SqliteDeadLetterStore::new(db.pool.clone(), clock.clone()));
        let maintenance = Arc::new(SqliteMaintenance::new(db.pool.clone(), clock.clone()));

        let admission = Arc::new(AdmissionController::new(
            registry.clone(),
            queues.clone() as Arc<dyn QueueStore>,
            Arc::new(UuidProvider),
            clock.clone(),
        ));
        let claimer = Arc::new(BatchClaimer::new(
            registry.clone(),
            queues.clone() as Arc<dyn QueueStore>,
            leases.clone() as Arc<dyn LeaseStore>,
        ));
        let router = Arc::new(DeadLetterRouter::new(
            dead_letters.clone() as Arc<dyn DeadLetterStore>,
            Arc::new(UuidProvider),
            clock.clone(),
            Duration::from_secs(7 * 24 * 3600),
        ));
        let replayer = Arc::new(DeadLetterReplayer::new(
            dead_letters.clone() as Arc<dyn DeadLetterStore>,
            admission.clone(),
        ));

        Self {
            db,
            clock,
            registry,
            queues,
            leases,
            dead_letters,
            maintenance,
            admission,
            claimer,
            router,
            replayer,
        }
    }

    /// Admit a JSON payload, panicking on rejection
    pub async fn admit(&self, queue: &str, payload: serde_json::Value) {
        self.admission
            .admit_payload(queue, "test", &payload)
            .await
            .unwrap();
    }
}

impl Harness {
    /// Record a dead-letter entry the way a failing worker tick would
    pub async fn dead_letter(&self, queue: &str, payload: serde_json::Value, message: &str) {
        let item = QueueItem::new(
            uuid::Uuid::new_v4().to_string(),
            self.clock.now_millis(),
            "test",
            payload,
        );
        assert!(
            self.router
                .route_failure(queue, &item, &HandlerError::new(message))
                .await
        );
    }
}

/// Poll `check` until it holds or `timeout` passes
pub async fn eventually<F, Fut>(timeout: Duration, mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if check().await {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}
