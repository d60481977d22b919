//! The driver contract and the values that cross it.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::application::CancellationToken;
use crate::domain::{EnvironmentStatus, EnvironmentUrls, StagingConfig, StagingEnvironmentRecord};
use crate::error::StagingResult;

/// Port for infrastructure backends (docker compose, a PaaS, a VM...).
///
/// The orchestrator never touches infrastructure itself. Every lifecycle
/// call goes through this trait, and drivers own their retry policy.
///
/// Implemented by:
/// - `staging_adapters::drivers::DockerComposeDriver`
/// - `staging_adapters::drivers::MemoryDriver` (testing)
#[cfg_attr(test, mockall::automock)]
pub trait StagingDriver: Send + Sync {
    /// Registry key, also written to each record's `driver` field.
    fn name(&self) -> &'static str;

    /// Verify local tooling before any lifecycle call.
    fn check_prerequisites(&self) -> StagingResult<PrerequisiteReport>;

    /// Create or update the environment's infrastructure. Must be idempotent.
    fn up(&self, env: &StagingEnvironmentRecord, ctx: &DriverContext) -> StagingResult<Deployment>;

    /// Tear down. Must succeed when infrastructure is already partly or fully gone.
    fn down(&self, env: &StagingEnvironmentRecord, ctx: &DriverContext) -> StagingResult<()>;

    fn health(&self, env: &StagingEnvironmentRecord, ctx: &DriverContext)
    -> StagingResult<HealthReport>;

    /// Bounded read, or a cancellable stream into `options.sink` when `follow` is set.
    fn logs(
        &self,
        env: &StagingEnvironmentRecord,
        ctx: &DriverContext,
        options: &LogOptions,
    ) -> StagingResult<LogOutput>;

    /// Environments the driver itself knows about, for reconciliation.
    fn list(&self, ctx: &DriverContext) -> StagingResult<Vec<DiscoveredEnvironment>>;
}

/// Everything a driver needs besides the record itself.
#[derive(Debug, Clone, PartialEq)]
pub struct DriverContext {
    pub project_root: PathBuf,
    pub config: StagingConfig,
}

impl DriverContext {
    pub fn new(project_root: impl Into<PathBuf>, config: StagingConfig) -> Self {
        Self {
            project_root: project_root.into(),
            config,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrerequisiteReport {
    pub met: bool,
    pub missing: Vec<String>,
}

impl PrerequisiteReport {
    pub fn satisfied() -> Self {
        Self {
            met: true,
            missing: Vec::new(),
        }
    }

    /// `met` is derived from whether anything is missing.
    pub fn from_missing(missing: Vec<String>) -> Self {
        Self {
            met: missing.is_empty(),
            missing,
        }
    }
}

/// Result of a successful `up`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Deployment {
    pub urls: EnvironmentUrls,
    /// Merged into the record's `driverMeta`.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub meta: Map<String, Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceStatus {
    /// Answered with a success status.
    Up,
    /// Answered, but with an error status.
    Down,
    /// No answer at all.
    Unreachable,
}

impl fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Up => write!(f, "up"),
            Self::Down => write!(f, "down"),
            Self::Unreachable => write!(f, "unreachable"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceHealth {
    pub status: ServiceStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_status: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthReport {
    pub healthy: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api: Option<ServiceHealth>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app: Option<ServiceHealth>,
}

impl HealthReport {
    /// Healthy iff at least one service was probed and every probed one is up.
    pub fn from_services(api: Option<ServiceHealth>, app: Option<ServiceHealth>) -> Self {
        let probed: Vec<_> = api.iter().chain(app.iter()).collect();
        let healthy = !probed.is_empty() && probed.iter().all(|s| s.status == ServiceStatus::Up);
        Self { healthy, api, app }
    }
}

/// Receives streamed log lines in follow mode.
pub trait LogSink: Send + Sync {
    fn line(&self, service: &str, line: &str);
}

#[derive(Clone, Default)]
pub struct LogOptions {
    pub service: Option<String>,
    pub tail: Option<usize>,
    pub follow: bool,
    pub cancel: CancellationToken,
    /// Required for `follow`; bounded reads collect into [`LogOutput::lines`].
    pub sink: Option<Arc<dyn LogSink>>,
}

impl fmt::Debug for LogOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogOptions")
            .field("service", &self.service)
            .field("tail", &self.tail)
            .field("follow", &self.follow)
            .field("cancelled", &self.cancel.is_cancelled())
            .field("sink", &self.sink.is_some())
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogOutput {
    pub lines: Vec<String>,
    /// The service the lines belong to, `"all"` when unfiltered.
    pub service: String,
}

/// An environment as seen from the driver's side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveredEnvironment {
    pub slug: String,
    pub status: EnvironmentStatus,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub meta: Map<String, Value>,
}
