//! In-process driver. Deploys nothing; useful for dry runs and tests.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, RwLock};

use serde_json::{Map, json};

use staging_core::{
    application::{
        ApplicationError,
        ports::{
            Deployment, DiscoveredEnvironment, DriverContext, HealthReport, LogOptions,
            LogOutput, PrerequisiteReport, ServiceHealth, ServiceStatus, StagingDriver,
        },
    },
    domain::{EnvironmentStatus, EnvironmentUrls, StagingEnvironmentRecord},
    error::StagingResult,
};

pub const NAME: &str = "memory";

#[derive(Default)]
struct Inner {
    deployed: BTreeMap<String, DiscoveredEnvironment>,
    logs: BTreeMap<String, Vec<String>>,
    unhealthy: BTreeSet<String>,
    failing: BTreeSet<&'static str>,
    missing: Vec<String>,
}

/// Keeps "deployed" environments in a map. Clones share state.
///
/// Health follows the record: everything is up unless
/// [`mark_unhealthy`](Self::mark_unhealthy) was called for the slug.
#[derive(Clone, Default)]
pub struct MemoryDriver {
    inner: Arc<RwLock<Inner>>,
}

impl MemoryDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report `tools` as missing from `check_prerequisites`.
    pub fn with_missing(self, tools: Vec<String>) -> Self {
        if let Ok(mut inner) = self.inner.write() {
            inner.missing = tools;
        }
        self
    }

    /// Make every later call to `operation` (`"up"`, `"down"`, ...) fail.
    pub fn fail_on(&self, operation: &'static str) {
        if let Ok(mut inner) = self.inner.write() {
            inner.failing.insert(operation);
        }
    }

    pub fn mark_unhealthy(&self, slug: &str) {
        if let Ok(mut inner) = self.inner.write() {
            inner.unhealthy.insert(slug.to_string());
        }
    }

    pub fn is_deployed(&self, slug: &str) -> bool {
        self.inner
            .read()
            .map(|inner| inner.deployed.contains_key(slug))
            .unwrap_or(false)
    }

    fn check(&self, operation: &'static str) -> StagingResult<()> {
        let inner = self
            .inner
            .read()
            .map_err(|_| ApplicationError::StoreLockError)?;
        if inner.failing.contains(operation) {
            return Err(ApplicationError::driver(NAME, operation, "injected failure").into());
        }
        Ok(())
    }

    fn write(&self) -> StagingResult<std::sync::RwLockWriteGuard<'_, Inner>> {
        Ok(self
            .inner
            .write()
            .map_err(|_| ApplicationError::StoreLockError)?)
    }
}

impl StagingDriver for MemoryDriver {
    fn name(&self) -> &'static str {
        NAME
    }

    fn check_prerequisites(&self) -> StagingResult<PrerequisiteReport> {
        let inner = self
            .inner
            .read()
            .map_err(|_| ApplicationError::StoreLockError)?;
        Ok(PrerequisiteReport::from_missing(inner.missing.clone()))
    }

    fn up(&self, env: &StagingEnvironmentRecord, _ctx: &DriverContext) -> StagingResult<Deployment> {
        self.check("up")?;
        let slug = env.slug.to_string();
        let mut inner = self.write()?;
        inner.deployed.insert(
            slug.clone(),
            DiscoveredEnvironment {
                slug: slug.clone(),
                status: EnvironmentStatus::Running,
                meta: Map::new(),
            },
        );
        inner.unhealthy.remove(&slug);
        inner
            .logs
            .entry(slug.clone())
            .or_default()
            .push(format!("deployed {} from {}", slug, env.branch));

        let ports = env.ports.unwrap_or_default();
        let mut meta = Map::new();
        meta.insert("driver".into(), json!(NAME));
        Ok(Deployment {
            urls: EnvironmentUrls {
                api: ports.api.map(|p| format!("http://localhost:{p}")),
                app: ports.app.map(|p| format!("http://localhost:{p}")),
            },
            meta,
        })
    }

    fn down(&self, env: &StagingEnvironmentRecord, _ctx: &DriverContext) -> StagingResult<()> {
        self.check("down")?;
        let mut inner = self.write()?;
        inner.deployed.remove(env.slug.as_str());
        inner.logs.remove(env.slug.as_str());
        Ok(())
    }

    fn health(&self, env: &StagingEnvironmentRecord, _ctx: &DriverContext) -> StagingResult<HealthReport> {
        self.check("health")?;
        let inner = self
            .inner
            .read()
            .map_err(|_| ApplicationError::StoreLockError)?;
        let status = if inner.unhealthy.contains(env.slug.as_str()) {
            ServiceStatus::Down
        } else {
            ServiceStatus::Up
        };
        let service = ServiceHealth {
            status,
            http_status: Some(if status == ServiceStatus::Up { 200 } else { 503 }),
            latency_ms: Some(0),
        };
        Ok(HealthReport::from_services(Some(service.clone()), Some(service)))
    }

    fn logs(
        &self,
        env: &StagingEnvironmentRecord,
        _ctx: &DriverContext,
        options: &LogOptions,
    ) -> StagingResult<LogOutput> {
        self.check("logs")?;
        let inner = self
            .inner
            .read()
            .map_err(|_| ApplicationError::StoreLockError)?;
        let all = inner.logs.get(env.slug.as_str()).cloned().unwrap_or_default();
        let skip = options.tail.map_or(0, |n| all.len().saturating_sub(n));
        let lines: Vec<String> = all.into_iter().skip(skip).collect();
        let service = options.service.clone().unwrap_or_else(|| "all".into());

        match (&options.sink, options.follow) {
            (Some(sink), true) => {
                for line in &lines {
                    if options.cancel.is_cancelled() {
                        break;
                    }
                    sink.line(&service, line);
                }
                Ok(LogOutput {
                    lines: Vec::new(),
                    service,
                })
            }
            _ => Ok(LogOutput { lines, service }),
        }
    }

    fn list(&self, _ctx: &DriverContext) -> StagingResult<Vec<DiscoveredEnvironment>> {
        self.check("list")?;
        let inner = self
            .inner
            .read()
            .map_err(|_| ApplicationError::StoreLockError)?;
        Ok(inner.deployed.values().cloned().collect())
    }
}
