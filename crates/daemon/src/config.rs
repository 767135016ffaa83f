//! Daemon configuration
//!
//! Layered with the `config` crate: built-in defaults, then an optional TOML
//! file, then `HOOKLINE__*` environment variables
//! (e.g. `HOOKLINE__RPC__PORT=9700`, `HOOKLINE__WORKER__IDLE_DELAY_MS=1000`).

use anyhow::{Context, Result};
use config::{Config, Environment, File, FileFormat};
use hookline_core::application::worker::constants::{
    DEFAULT_DEAD_LETTER_TTL, DEFAULT_ERROR_BACKOFF, DEFAULT_ESCALATED_BACKOFF,
    DEFAULT_ESCALATION_THRESHOLD, DEFAULT_IDLE_DELAY, DEFAULT_LOCK_TIMEOUT,
    DEFAULT_SUPERVISOR_INTERVAL,
};
use hookline_core::application::ReschedulePolicy;
use hookline_core::domain::{QueueDescriptor, QueueRegistry};
use hookline_api_rpc::RpcServerConfig;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Env var naming the config file
pub const CONFIG_PATH_ENV: &str = "HOOKLINE_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "~/.hookline/hookline.toml";
const DEFAULT_DB_PATH: &str = "~/.hookline/hookline.db";
const ENV_PREFIX: &str = "HOOKLINE";
const ENV_SEPARATOR: &str = "__";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    pub database_path: String,
    pub log_format: LogFormat,
    pub rpc: RpcSection,
    pub worker: WorkerSection,
    pub dead_letter: DeadLetterSection,
    pub maintenance: MaintenanceSection,
    pub telemetry: TelemetrySection,
    pub queues: Vec<QueueSection>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RpcSection {
    pub host: String,
    pub port: u16,
    pub rate_limit_burst: u32,
    pub rate_limit_per_sec: u32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WorkerSection {
    pub idle_delay_ms: u64,
    pub error_backoff_ms: u64,
    pub escalated_backoff_ms: u64,
    pub escalation_threshold: u32,
    /// Concurrent loops per queue (they share the queue's lease)
    pub loops_per_queue: usize,
    pub supervisor_interval_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DeadLetterSection {
    pub ttl_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MaintenanceSection {
    pub interval_minutes: u64,
    pub max_db_size_mb: f64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TelemetrySection {
    /// OTLP gRPC endpoint; telemetry is off when unset
    pub otlp_endpoint: Option<String>,
    pub service_name: String,
}

/// One `[[queues]]` table
#[derive(Debug, Clone, Deserialize)]
pub struct QueueSection {
    pub name: String,
    #[serde(default = "default_max_depth")]
    pub max_depth: u64,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,
}

fn default_max_depth() -> u64 {
    10_000
}

fn default_batch_size() -> usize {
    25
}

fn default_ttl_secs() -> u64 {
    24 * 3600
}

fn default_lock_timeout_ms() -> u64 {
    DEFAULT_LOCK_TIMEOUT.as_millis() as u64
}

impl QueueSection {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            max_depth: default_max_depth(),
            batch_size: default_batch_size(),
            ttl_secs: default_ttl_secs(),
            lock_timeout_ms: default_lock_timeout_ms(),
        }
    }

    fn descriptor(&self) -> QueueDescriptor {
        QueueDescriptor::new(
            self.name.clone(),
            self.max_depth,
            self.batch_size,
            Duration::from_secs(self.ttl_secs),
            Duration::from_millis(self.lock_timeout_ms),
        )
    }
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            database_path: DEFAULT_DB_PATH.to_string(),
            log_format: LogFormat::Pretty,
            rpc: RpcSection::default(),
            worker: WorkerSection::default(),
            dead_letter: DeadLetterSection::default(),
            maintenance: MaintenanceSection::default(),
            telemetry: TelemetrySection {
                otlp_endpoint: None,
                service_name: "hookline".to_string(),
            },
            queues: vec![QueueSection::named("ingest")],
        }
    }
}

impl Default for RpcSection {
    fn default() -> Self {
        let rpc = RpcServerConfig::default();
        Self {
            host: rpc.host,
            port: rpc.port,
            rate_limit_burst: rpc.rate_limit_burst,
            rate_limit_per_sec: rpc.rate_limit_per_sec,
        }
    }
}

impl Default for WorkerSection {
    fn default() -> Self {
        Self {
            idle_delay_ms: DEFAULT_IDLE_DELAY.as_millis() as u64,
            error_backoff_ms: DEFAULT_ERROR_BACKOFF.as_millis() as u64,
            escalated_backoff_ms: DEFAULT_ESCALATED_BACKOFF.as_millis() as u64,
            escalation_threshold: DEFAULT_ESCALATION_THRESHOLD,
            loops_per_queue: 1,
            supervisor_interval_ms: DEFAULT_SUPERVISOR_INTERVAL.as_millis() as u64,
        }
    }
}

impl Default for DeadLetterSection {
    fn default() -> Self {
        Self {
            ttl_secs: DEFAULT_DEAD_LETTER_TTL.as_secs(),
        }
    }
}

impl Default for MaintenanceSection {
    fn default() -> Self {
        Self {
            interval_minutes: 60,
            max_db_size_mb: 512.0,
        }
    }
}

impl DaemonConfig {
    /// Load from `$HOOKLINE_CONFIG` (or the default path) and the environment
    pub fn load() -> Result<Self> {
        let path = std::env::var(CONFIG_PATH_ENV)
            .unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::from_sources(Some(expand(&path)), environment())
    }

    /// Build from an optional TOML file plus an environment source
    pub fn from_sources(file: Option<PathBuf>, env: Environment) -> Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = &file {
            builder = builder.add_source(File::from(path.as_path()).format(FileFormat::Toml).required(false));
        }

        let config: DaemonConfig = builder
            .add_source(env)
            .build()
            .context("Failed to read configuration")?
            .try_deserialize()
            .context("Invalid configuration")?;

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.worker.loops_per_queue == 0 {
            anyhow::bail!("worker.loops_per_queue must be at least 1");
        }
        if self.worker.escalation_threshold == 0 {
            anyhow::bail!("worker.escalation_threshold must be at least 1");
        }
        if self.rpc.rate_limit_burst == 0 {
            anyhow::bail!("rpc.rate_limit_burst must be at least 1");
        }
        self.registry()?;
        Ok(())
    }

    /// Validated, immutable queue table
    pub fn registry(&self) -> Result<QueueRegistry> {
        if self.queues.is_empty() {
            anyhow::bail!("at least one [[queues]] entry is required");
        }
        QueueRegistry::new(self.queues.iter().map(QueueSection::descriptor))
            .context("Invalid queue configuration")
    }

    pub fn database_path(&self) -> PathBuf {
        expand(&self.database_path)
    }

    pub fn reschedule_policy(&self) -> ReschedulePolicy {
        ReschedulePolicy {
            idle_delay: Duration::from_millis(self.worker.idle_delay_ms),
            error_backoff: Duration::from_millis(self.worker.error_backoff_ms),
            escalated_backoff: Duration::from_millis(self.worker.escalated_backoff_ms),
            escalation_threshold: self.worker.escalation_threshold,
        }
    }

    pub fn rpc_server_config(&self) -> RpcServerConfig {
        RpcServerConfig {
            host: self.rpc.host.clone(),
            port: self.rpc.port,
            rate_limit_burst: self.rpc.rate_limit_burst,
            rate_limit_per_sec: self.rpc.rate_limit_per_sec,
            // A full queue frees up no sooner than the next worker tick
            retry_after_ms: self.worker.idle_delay_ms.max(1),
        }
    }
}

fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator(ENV_SEPARATOR)
        .separator(ENV_SEPARATOR)
        .try_parsing(true)
}

fn expand(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).into_owned())
}
