//! RPC Method Handlers
//!
//! Implements the business logic for each JSON-RPC method.

use crate::error::{throttled, to_rpc_error, to_rpc_error_with_retry};
use crate::rate_limiter::RateLimiter;
use crate::types::{
    AdmitRequest, AdmitResponse, DeadLetterListRequest, DeadLetterListResponse,
    DeadLetterReplayRequest, DeadLetterReplayResponse, DepthResponse, FlushResponse,
    MaintenanceRequest, MaintenanceResponse, PeekResponse, QueueRequest, QueueStats,
    StatsRequest, StatsResponse,
};
use hookline_core::application::{AdmissionController, DeadLetterReplayer};
use hookline_core::domain::QueueRegistry;
use hookline_core::error::AppError;
use hookline_core::port::{DeadLetterStore, Maintenance, MaintenanceConfig, QueueStore};
use jsonrpsee::types::ErrorObjectOwned;
use std::sync::Arc;
use tracing::{info, warn};

/// Core services the RPC surface calls into
#[derive(Clone)]
pub struct RpcServices {
    pub admission: Arc<AdmissionController>,
    pub queues: Arc<dyn QueueStore>,
    pub dead_letters: Arc<dyn DeadLetterStore>,
    pub replayer: Arc<DeadLetterReplayer>,
    pub maintenance: Arc<dyn Maintenance>,
    pub maintenance_config: MaintenanceConfig,
}

/// RPC Handler with injected dependencies
pub struct RpcHandler {
    services: RpcServices,
    rate_limiter: RateLimiter,
    retry_after_ms: u64,
    start_time: std::time::Instant,
}

type RpcResult<T> = Result<T, ErrorObjectOwned>;

impl RpcHandler {
    pub fn new(services: RpcServices, rate_limiter: RateLimiter, retry_after_ms: u64) -> Self {
        Self {
            services,
            rate_limiter,
            retry_after_ms,
            start_time: std::time::Instant::now(),
        }
    }

    fn registry(&self) -> &QueueRegistry {
        self.services.admission.registry()
    }

    fn throttle(&self) -> RpcResult<()> {
        if self.rate_limiter.check() {
            Ok(())
        } else {
            warn!("RPC rate limit exceeded");
            Err(throttled())
        }
    }

    /// Reject unknown queues before touching storage
    fn known_queue(&self, queue: &str) -> RpcResult<()> {
        self.registry()
            .get(queue)
            .map(|_| ())
            .map_err(|e| to_rpc_error(AppError::from(e)))
    }

    /// ingest.admit.v1
    pub async fn admit(&self, params: AdmitRequest) -> RpcResult<AdmitResponse> {
        self.throttle()?;

        let admitted = self
            .services
            .admission
            .admit_payload(&params.queue, &params.source, &params.payload)
            .await
            .map_err(|e| to_rpc_error_with_retry(e, self.retry_after_ms))?;

        Ok(AdmitResponse {
            item_id: admitted.item_id,
            queue: params.queue,
            depth: admitted.depth,
        })
    }

    /// queue.depth.v1
    pub async fn depth(&self, params: QueueRequest) -> RpcResult<DepthResponse> {
        let descriptor = self
            .registry()
            .get(&params.queue)
            .map_err(|e| to_rpc_error(AppError::from(e)))?;
        let depth = self
            .services
            .queues
            .depth(&params.queue)
            .await
            .map_err(to_rpc_error)?;

        Ok(DepthResponse {
            max_depth: descriptor.max_depth,
            queue: params.queue,
            depth,
        })
    }

    /// queue.peek.v1
    pub async fn peek(&self, params: QueueRequest) -> RpcResult<PeekResponse> {
        self.known_queue(&params.queue)?;
        let head = self
            .services
            .queues
            .peek(&params.queue)
            .await
            .map_err(to_rpc_error)?;

        Ok(PeekResponse {
            queue: params.queue,
            head,
        })
    }

    /// queue.flush.v1
    pub async fn flush(&self, params: QueueRequest) -> RpcResult<FlushResponse> {
        self.throttle()?;
        self.known_queue(&params.queue)?;

        let removed = self
            .services
            .queues
            .flush(&params.queue)
            .await
            .map_err(to_rpc_error)?;
        warn!(queue = %params.queue, removed, "Queue flushed by operator");

        Ok(FlushResponse {
            queue: params.queue,
            removed,
        })
    }

    /// deadletter.list.v1
    pub async fn list_dead_letters(
        &self,
        params: DeadLetterListRequest,
    ) -> RpcResult<DeadLetterListResponse> {
        let queue = params.queue.as_deref();
        let entries = self
            .services
            .dead_letters
            .list(queue, params.limit)
            .await
            .map_err(to_rpc_error)?;
        let total = self
            .services
            .dead_letters
            .count(queue)
            .await
            .map_err(to_rpc_error)?;

        Ok(DeadLetterListResponse { total, entries })
    }

    /// deadletter.replay.v1
    pub async fn replay_dead_letters(
        &self,
        params: DeadLetterReplayRequest,
    ) -> RpcResult<DeadLetterReplayResponse> {
        self.throttle()?;

        match (params.entry_id, params.queue) {
            (Some(entry_id), _) => {
                self.services
                    .replayer
                    .replay(&entry_id)
                    .await
                    .map_err(|e| to_rpc_error_with_retry(e, self.retry_after_ms))?;
                Ok(DeadLetterReplayResponse {
                    replayed: vec![entry_id],
                    stopped_on_backpressure: false,
                })
            }
            (None, Some(queue)) => {
                let report = self
                    .services
                    .replayer
                    .replay_queue(&queue, params.limit)
                    .await
                    .map_err(to_rpc_error)?;
                Ok(DeadLetterReplayResponse {
                    replayed: report.replayed,
                    stopped_on_backpressure: report.stopped_on_backpressure,
                })
            }
            (None, None) => Err(to_rpc_error(AppError::Validation(
                "either entry_id or queue is required".to_string(),
            ))),
        }
    }

    /// admin.stats.v1
    pub async fn stats(&self, _params: StatsRequest) -> RpcResult<StatsResponse> {
        let mut queues = Vec::with_capacity(self.registry().len());
        for descriptor in self.registry().iter() {
            let depth = self
                .services
                .queues
                .depth(&descriptor.name)
                .await
                .map_err(to_rpc_error)?;
            let dead_letters = self
                .services
                .dead_letters
                .count(Some(&descriptor.name))
                .await
                .map_err(to_rpc_error)?;
            queues.push(QueueStats {
                name: descriptor.name.clone(),
                depth,
                max_depth: descriptor.max_depth,
                batch_size: descriptor.batch_size,
                dead_letters,
            });
        }

        let storage = self
            .services
            .maintenance
            .get_stats()
            .await
            .map_err(to_rpc_error)?;

        Ok(StatsResponse {
            queues,
            stored_items: storage.stored_items,
            dead_letters: storage.dead_letters,
            active_leases: storage.active_leases,
            db_size_bytes: storage.db_size_bytes,
            uptime_seconds: self.start_time.elapsed().as_secs(),
        })
    }

    /// admin.maintenance.v1
    pub async fn maintenance(&self, params: MaintenanceRequest) -> RpcResult<MaintenanceResponse> {
        self.throttle()?;
        let maintenance = &self.services.maintenance;

        let before = maintenance.get_stats().await.map_err(to_rpc_error)?;
        let report = maintenance
            .run_full_maintenance(&self.services.maintenance_config)
            .await
            .map_err(to_rpc_error)?;

        let mut vacuum_run = report.vacuumed;
        if params.force_vacuum && !vacuum_run {
            maintenance.vacuum().await.map_err(to_rpc_error)?;
            vacuum_run = true;
        }

        let after = maintenance.get_stats().await.map_err(to_rpc_error)?;
        info!(
            vacuum_run,
            expired_items = report.expired_items,
            "Manual maintenance completed"
        );

        Ok(MaintenanceResponse {
            vacuum_run,
            expired_items: report.expired_items,
            expired_dead_letters: report.expired_dead_letters,
            expired_leases: report.expired_leases,
            db_size_before: before.db_size_bytes,
            db_size_after: after.db_size_bytes,
        })
    }
}
