//! JSON-RPC Server
//!
//! JSON-RPC 2.0 over HTTP on a localhost TCP port.

use crate::error::DEFAULT_RETRY_AFTER_MS;
use crate::handler::{RpcHandler, RpcServices};
use crate::rate_limiter::RateLimiter;
use crate::types::{
    AdmitRequest, DeadLetterListRequest, DeadLetterReplayRequest, MaintenanceRequest,
    QueueRequest, StatsRequest,
};
use hookline_core::error::{AppError, Result};
use hookline_core::port::TimeProvider;
use jsonrpsee::server::{Server, ServerHandle};
use jsonrpsee::types::error::INVALID_PARAMS_CODE;
use jsonrpsee::types::{ErrorObjectOwned, Params};
use jsonrpsee::RpcModule;
use serde::de::DeserializeOwned;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

const DEFAULT_RPC_HOST: &str = "127.0.0.1";
const DEFAULT_RPC_PORT: u16 = 9631;

/// RPC Server Configuration
#[derive(Debug, Clone)]
pub struct RpcServerConfig {
    pub host: String,
    /// 0 picks a free port (see `RpcServer::start`'s returned address)
    pub port: u16,
    pub rate_limit_burst: u32,
    pub rate_limit_per_sec: u32,
    /// Hint returned with RETRY_LATER errors
    pub retry_after_ms: u64,
}

impl Default for RpcServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_RPC_HOST.to_string(),
            port: DEFAULT_RPC_PORT,
            rate_limit_burst: 200,
            rate_limit_per_sec: 100,
            retry_after_ms: DEFAULT_RETRY_AFTER_MS,
        }
    }
}

/// RPC Server
pub struct RpcServer {
    config: RpcServerConfig,
    handler: Arc<RpcHandler>,
}

/// Parse method params; omitted or `null` params read as `{}`
fn parse_params<T: DeserializeOwned>(params: &Params<'_>) -> std::result::Result<T, ErrorObjectOwned> {
    match params.parse::<Option<T>>()? {
        Some(req) => Ok(req),
        None => serde_json::from_value(serde_json::Value::Object(Default::default()))
            .map_err(|e| ErrorObjectOwned::owned(INVALID_PARAMS_CODE, e.to_string(), None::<()>)),
    }
}

/// Register an async method whose params deserialize into `$req`
macro_rules! register {
    ($module:expr, $handler:expr, $name:literal, $req:ty, $method:ident) => {{
        let handler = $handler.clone();
        $module
            .register_async_method($name, move |params, _, _| {
                let handler = handler.clone();
                async move {
                    let req: $req = parse_params(&params)?;
                    handler.$method(req).await
                }
            })
            .map_err(|e| AppError::Internal(e.to_string()))?;
    }};
}

impl RpcServer {
    pub fn new(
        config: RpcServerConfig,
        services: RpcServices,
        time_provider: Arc<dyn TimeProvider>,
    ) -> Self {
        let rate_limiter = RateLimiter::new(
            config.rate_limit_burst,
            config.rate_limit_per_sec,
            time_provider,
        );
        let handler = Arc::new(RpcHandler::new(
            services,
            rate_limiter,
            config.retry_after_ms,
        ));
        Self { config, handler }
    }

    /// Start the JSON-RPC server and return its handle and bound address
    pub async fn start(self) -> Result<(ServerHandle, SocketAddr)> {
        let addr = format!("{}:{}", self.config.host, self.config.port);

        let server = Server::builder()
            .build(&addr)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to build server on {}: {}", addr, e)))?;
        let local_addr = server
            .local_addr()
            .map_err(|e| AppError::Internal(format!("Failed to read bound address: {}", e)))?;

        let mut module = RpcModule::new(());
        let handler = &self.handler;

        register!(module, handler, "ingest.admit.v1", AdmitRequest, admit);
        register!(module, handler, "queue.depth.v1", QueueRequest, depth);
        register!(module, handler, "queue.peek.v1", QueueRequest, peek);
        register!(module, handler, "queue.flush.v1", QueueRequest, flush);
        register!(module, handler, "deadletter.list.v1", DeadLetterListRequest, list_dead_letters);
        register!(module, handler, "deadletter.replay.v1", DeadLetterReplayRequest, replay_dead_letters);
        register!(module, handler, "admin.stats.v1", StatsRequest, stats);
        register!(module, handler, "admin.maintenance.v1", MaintenanceRequest, maintenance);

        info!(address = %local_addr, "JSON-RPC server started");

        Ok((server.start(module), local_addr))
    }
}
