//! Hookline daemon - Main Entry Point
//! Composition root: config, logging, SQLite adapters, worker loops,
//! supervisor, maintenance and the JSON-RPC surface.

mod config;
mod handler;
mod telemetry;

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use config::{DaemonConfig, LogFormat};
use handler::LoggingHandler;
use hookline_api_rpc::{RpcServer, RpcServices};
use hookline_core::application::{
    shutdown_channel, AdmissionController, BatchClaimer, DeadLetterReplayer, DeadLetterRouter,
    MaintenanceScheduler, Supervisor, SupervisorConfig, TokioTaskScheduler, WorkerLoop,
};
use hookline_core::domain::QueueRegistry;
use hookline_core::port::id_provider::UuidProvider;
use hookline_core::port::time_provider::SystemTimeProvider;
use hookline_core::port::{
    DeadLetterStore, IdProvider, ItemHandler, LeaseStore, Maintenance, MaintenanceConfig,
    QueueStore, TaskScheduler, TimeProvider,
};
use hookline_infra_sqlite::{
    create_pool, database_url, run_migrations, SqliteDeadLetterStore, SqliteLeaseStore,
    SqliteMaintenance, SqliteQueueStore,
};

const VERSION: &str = env!("CARGO_PKG_VERSION");
const DEFAULT_LOG_FILTER: &str = "hookline=info";
/// How long in-flight ticks get to finish after the shutdown signal
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Configuration (logging depends on it)
    let config = DaemonConfig::load()?;
    init_logging(&config)?;

    info!("Hookline daemon v{} starting...", VERSION);

    let registry = Arc::new(config.registry()?);
    for queue in registry.iter() {
        info!(
            queue = %queue.name,
            max_depth = queue.max_depth,
            batch_size = queue.batch_size,
            ttl_secs = queue.ttl.as_secs(),
            "Queue configured"
        );
    }

    // 2. Database
    let db_path = config.database_path();
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    info!(db_path = %db_path.display(), "Initializing database...");

    let pool = create_pool(&database_url(&db_path))
        .await
        .map_err(|e| anyhow::anyhow!("DB pool creation failed: {}", e))?;
    run_migrations(&pool)
        .await
        .map_err(|e| anyhow::anyhow!("Migration failed: {}", e))?;

    // 3. Adapters (DI wiring)
    let time_provider: Arc<dyn TimeProvider> = Arc::new(SystemTimeProvider);
    let id_provider: Arc<dyn IdProvider> = Arc::new(UuidProvider);
    let queues: Arc<dyn QueueStore> =
        Arc::new(SqliteQueueStore::new(pool.clone(), time_provider.clone()));
    let leases: Arc<dyn LeaseStore> =
        Arc::new(SqliteLeaseStore::new(pool.clone(), time_provider.clone()));
    let dead_letters: Arc<dyn DeadLetterStore> =
        Arc::new(SqliteDeadLetterStore::new(pool.clone(), time_provider.clone()));
    let maintenance: Arc<dyn Maintenance> =
        Arc::new(SqliteMaintenance::new(pool.clone(), time_provider.clone()));

    // 4. Use cases
    let admission = Arc::new(AdmissionController::new(
        registry.clone(),
        queues.clone(),
        id_provider.clone(),
        time_provider.clone(),
    ));
    let claimer = Arc::new(BatchClaimer::new(registry.clone(), queues.clone(), leases));
    let router = Arc::new(DeadLetterRouter::new(
        dead_letters.clone(),
        id_provider,
        time_provider.clone(),
        Duration::from_secs(config.dead_letter.ttl_secs),
    ));
    let replayer = Arc::new(DeadLetterReplayer::new(
        dead_letters.clone(),
        admission.clone(),
    ));

    // 5. Worker loops + supervisor
    let (shutdown_tx, shutdown_token) = shutdown_channel();
    let task_scheduler = Arc::new(TokioTaskScheduler::new(shutdown_token.clone()));
    let handler: Arc<dyn ItemHandler> = Arc::new(LoggingHandler);

    let loops = build_worker_loops(
        &config,
        &registry,
        claimer,
        handler,
        router,
        task_scheduler.clone(),
        time_provider.clone(),
    );
    info!(workers = loops.len(), "Starting worker loops...");

    let supervisor = Supervisor::new(
        loops,
        time_provider.clone(),
        SupervisorConfig {
            check_interval: Duration::from_millis(config.worker.supervisor_interval_ms),
            ..Default::default()
        },
    );
    supervisor.start_all();
    let supervisor_handle = tokio::spawn(supervisor.run(shutdown_token.clone()));

    // 6. Maintenance
    let maintenance_config = MaintenanceConfig {
        max_db_size_mb: config.maintenance.max_db_size_mb,
    };
    let maintenance_scheduler = MaintenanceScheduler::new(
        maintenance.clone(),
        maintenance_config.clone(),
        config.maintenance.interval_minutes,
    );
    let maintenance_handle = tokio::spawn(maintenance_scheduler.run(shutdown_token));

    // 7. JSON-RPC server
    info!("Starting JSON-RPC server...");
    let rpc_server = RpcServer::new(
        config.rpc_server_config(),
        RpcServices {
            admission,
            queues,
            dead_letters,
            replayer,
            maintenance,
            maintenance_config,
        },
        time_provider,
    );
    let (rpc_handle, rpc_addr) = rpc_server
        .start()
        .await
        .map_err(|e| anyhow::anyhow!("RPC server start failed: {}", e))?;

    info!(rpc = %rpc_addr, "System ready. Press Ctrl+C to shutdown");

    // 8. Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received. Exiting gracefully...");

    // 9. Graceful shutdown: stop intake, stop scheduling, drain in-flight ticks
    rpc_handle
        .stop()
        .map_err(|e| anyhow::anyhow!("RPC server stop failed: {}", e))?;
    rpc_handle.stopped().await;

    shutdown_tx.shutdown();
    let _ = supervisor_handle.await;
    let _ = maintenance_handle.await;

    if tokio::time::timeout(SHUTDOWN_GRACE, task_scheduler.wait_idle())
        .await
        .is_err()
    {
        tracing::warn!(
            in_flight = task_scheduler.in_flight(),
            "Worker ticks still running at shutdown deadline"
        );
    }

    pool.close().await;
    telemetry::shutdown();
    info!("Shutdown complete.");

    Ok(())
}

fn init_logging(config: &DaemonConfig) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(DEFAULT_LOG_FILTER))?;

    let telemetry_layer = telemetry::layer(&config.telemetry)?;
    let fmt_layer = match config.log_format {
        // Production: JSON structured logging
        LogFormat::Json => fmt::layer().json().boxed(),
        // Development: Pretty formatting with colors
        LogFormat::Pretty => fmt::layer().pretty().boxed(),
    };

    tracing_subscriber::registry()
        .with(telemetry_layer)
        .with(fmt_layer)
        .with(env_filter)
        .try_init()?;
    Ok(())
}

/// `loops_per_queue` loops per configured queue; ids are unique per process
fn build_worker_loops(
    config: &DaemonConfig,
    registry: &QueueRegistry,
    claimer: Arc<BatchClaimer>,
    handler: Arc<dyn ItemHandler>,
    router: Arc<DeadLetterRouter>,
    scheduler: Arc<dyn TaskScheduler>,
    time_provider: Arc<dyn TimeProvider>,
) -> Vec<Arc<WorkerLoop>> {
    let instance = uuid::Uuid::new_v4().simple().to_string();
    let instance = &instance[..8];
    let policy = config.reschedule_policy();

    registry
        .iter()
        .flat_map(|queue| {
            (0..config.worker.loops_per_queue).map(move |n| (queue, n))
        })
        .map(|(queue, n)| {
            Arc::new(WorkerLoop::new(
                format!("{}-{}-{}", queue.name, instance, n),
                queue.clone(),
                claimer.clone(),
                handler.clone(),
                router.clone(),
                scheduler.clone(),
                time_provider.clone(),
                policy.clone(),
            ))
        })
        .collect()
}
