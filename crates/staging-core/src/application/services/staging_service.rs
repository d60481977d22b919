//! Staging Service - the environment orchestrator.
//!
//! Composes slug derivation, the state store, port allocation and the driver
//! registry into the user-facing lifecycle:
//! 1. `up`: derive slug, reserve ports, deploy, record
//! 2. `down`: tear down, forget
//! 3. `health` / `logs` / `list`: read-through
//!
//! The store is only locked for short load-modify-save sections; driver
//! calls (which may take minutes) always happen outside of them.

use std::collections::BTreeSet;

use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::{
    application::{
        ApplicationError, DriverRegistry,
        ports::{
            Deployment, DiscoveredEnvironment, DriverContext, HealthReport, LogOptions,
            LogOutput, StateStore,
        },
    },
    domain::{
        EnvironmentStatus, Slug, StagingConfig, StagingEnvironmentRecord, allocate_ports,
    },
    error::{StagingError, StagingResult},
};

/// Local state compared with what drivers report.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReconcileReport {
    /// Known to a driver, absent from `staging.json`.
    pub untracked: Vec<DiscoveredEnvironment>,
    /// Tracked locally, no longer reported by its driver.
    pub missing: Vec<StagingEnvironmentRecord>,
}

impl ReconcileReport {
    pub fn is_in_sync(&self) -> bool {
        self.untracked.is_empty() && self.missing.is_empty()
    }
}

/// Main orchestration service.
pub struct StagingService {
    store: Box<dyn StateStore>,
    registry: DriverRegistry,
    context: DriverContext,
}

impl StagingService {
    /// Create a new staging service with the given adapters.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// use staging_core::application::{StagingService, DriverRegistry, ports::*};
    ///
    /// let service = StagingService::new(
    ///     store,    // Box<dyn StateStore>
    ///     registry, // DriverRegistry
    ///     context,  // DriverContext
    /// );
    /// ```
    pub fn new(store: Box<dyn StateStore>, registry: DriverRegistry, context: DriverContext) -> Self {
        Self {
            store,
            registry,
            context,
        }
    }

    pub fn config(&self) -> &StagingConfig {
        &self.context.config
    }

    pub fn registry(&self) -> &DriverRegistry {
        &self.registry
    }

    /// Deploy `branch`, creating its environment or redeploying it.
    ///
    /// `driver` only applies to new environments; an existing environment
    /// stays with the driver that owns its infrastructure.
    #[instrument(skip_all, fields(branch = %branch))]
    pub fn up(&self, branch: &str, driver: Option<&str>) -> StagingResult<StagingEnvironmentRecord> {
        let slug = Slug::from_branch(branch)?;
        let existing = self.store.get_environment(&slug)?;

        let driver_name = match (&existing, driver) {
            (Some(record), Some(requested)) if record.driver != requested => {
                return Err(StagingError::Configuration {
                    message: format!(
                        "environment '{}' is managed by driver '{}'; run `staging down {}` before switching to '{}'",
                        slug, record.driver, slug, requested
                    ),
                });
            }
            (Some(record), _) => record.driver.clone(),
            (None, Some(requested)) => requested.to_string(),
            (None, None) => self.config().driver.clone(),
        };
        let driver = self.registry.get(&driver_name)?;

        if existing.is_none() {
            let report = driver.check_prerequisites()?;
            if !report.met {
                return Err(ApplicationError::PrerequisitesMissing {
                    driver: driver_name,
                    missing: report.missing,
                }
                .into());
            }
        }

        let (reserved, created) = self.reserve(&slug, branch, &driver_name)?;
        info!(
            slug = %slug,
            driver = %driver_name,
            created,
            ports = ?reserved.ports,
            "Deploying environment"
        );

        match driver.up(&reserved, &self.context) {
            Ok(deployment) => {
                let record = self.complete(&reserved, deployment)?;
                info!(slug = %slug, "Environment running");
                Ok(record)
            }
            Err(e) => {
                warn!(slug = %slug, error = %e, "Driver up failed");
                self.abandon(&slug, created);
                Err(e)
            }
        }
    }

    /// Tear down `slug`.
    ///
    /// Once the driver's `down` has run, the local record is removed even
    /// when it failed; the driver error is still returned. A record whose
    /// driver is not registered is kept and `UnknownDriver` is returned.
    /// Unknown slugs are a no-op (`Ok(None)`).
    #[instrument(skip_all, fields(slug = %slug))]
    pub fn down(&self, slug: &str) -> StagingResult<Option<StagingEnvironmentRecord>> {
        let slug = Slug::parse(slug)?;
        let Some(record) = self.store.get_environment(&slug)? else {
            info!("Environment not tracked, nothing to tear down");
            return Ok(None);
        };

        let driver = self.registry.get(&record.driver)?;
        let torn_down = driver.down(&record, &self.context);
        let removed = self.store.remove_environment(&slug);

        if let (Err(driver_err), Err(store_err)) = (&torn_down, &removed) {
            warn!(
                driver_error = %driver_err,
                store_error = %store_err,
                "Teardown and record removal both failed"
            );
        }
        torn_down?;
        removed?;

        let mut stopped = record;
        stopped.transition(EnvironmentStatus::Stopped)?;
        info!("Environment stopped and forgotten");
        Ok(Some(stopped))
    }

    /// Probe the environment through its driver.
    ///
    /// A `running` environment that reports unhealthy is moved to `error`.
    #[instrument(skip_all, fields(slug = %slug))]
    pub fn health(&self, slug: &str) -> StagingResult<HealthReport> {
        let record = self.get(slug)?;
        let driver = self.registry.get(&record.driver)?;
        let report = driver.health(&record, &self.context)?;

        if !report.healthy && record.status == EnvironmentStatus::Running {
            warn!("Environment unhealthy, marking as error");
            self.store.update(&mut |state| {
                if let Some(current) = state.get_mut(&record.slug) {
                    current.transition(EnvironmentStatus::Error)?;
                }
                Ok(())
            })?;
        }
        Ok(report)
    }

    /// Read (or follow) environment logs. No state is touched.
    #[instrument(skip_all, fields(slug = %slug, follow = options.follow))]
    pub fn logs(&self, slug: &str, options: &LogOptions) -> StagingResult<LogOutput> {
        let record = self.get(slug)?;
        let driver = self.registry.get(&record.driver)?;
        let output = driver.logs(&record, &self.context, options)?;
        if options.cancel.is_cancelled() {
            debug!("Log stream cancelled by caller");
        }
        Ok(output)
    }

    /// Every locally tracked environment, sorted by slug.
    pub fn list(&self) -> StagingResult<Vec<StagingEnvironmentRecord>> {
        self.store.list_environments()
    }

    /// The tracked record for `slug`, or `EnvironmentNotFound`.
    pub fn get(&self, slug: &str) -> StagingResult<StagingEnvironmentRecord> {
        let key = Slug::parse(slug)?;
        self.store.get_environment(&key)?.ok_or_else(|| {
            ApplicationError::EnvironmentNotFound {
                slug: slug.to_string(),
            }
            .into()
        })
    }

    /// Compare local records with what drivers report. Read-only.
    ///
    /// Without `driver`, queries the configured default driver and every
    /// driver that owns a tracked environment.
    #[instrument(skip_all)]
    pub fn reconcile(&self, driver: Option<&str>) -> StagingResult<ReconcileReport> {
        let records = self.store.list_environments()?;

        let names: BTreeSet<String> = match driver {
            Some(name) => BTreeSet::from([name.to_string()]),
            None => records
                .iter()
                .map(|r| r.driver.clone())
                .chain(std::iter::once(self.config().driver.clone()))
                .collect(),
        };

        let mut report = ReconcileReport::default();
        for name in names {
            let driver = self.registry.get(&name)?;
            let discovered = driver.list(&self.context)?;
            debug!(driver = %name, count = discovered.len(), "Driver listing");

            let known: BTreeSet<&str> = discovered.iter().map(|d| d.slug.as_str()).collect();
            report.missing.extend(
                records
                    .iter()
                    .filter(|r| r.driver == name && !known.contains(r.slug.as_str()))
                    .cloned(),
            );
            report.untracked.extend(
                discovered
                    .into_iter()
                    .filter(|d| !records.iter().any(|r| r.slug.as_str() == d.slug)),
            );
        }
        Ok(report)
    }

    // -------------------------------------------------------------------------
    // Internal Helpers
    // -------------------------------------------------------------------------

    /// Write a `creating` record before the driver runs.
    ///
    /// New environments get their ports allocated inside the same locked
    /// update, so a concurrent `up` sees them as taken. Returns the reserved
    /// record and whether it was newly created.
    fn reserve(
        &self,
        slug: &Slug,
        branch: &str,
        driver: &str,
    ) -> StagingResult<(StagingEnvironmentRecord, bool)> {
        let range = self.config().ports;
        let mut reserved = None;

        self.store.update(&mut |state| {
            let (record, created) = match state.get(slug) {
                Some(current) => {
                    let mut record = current.clone();
                    record.branch = branch.to_string();
                    record.transition(EnvironmentStatus::Creating)?;
                    (record, false)
                }
                None => {
                    let ports = allocate_ports(state, range)?;
                    debug!(%ports, "Allocated ports");
                    let record = StagingEnvironmentRecord::new(slug.clone(), branch, driver)
                        .with_ports(ports);
                    (record, true)
                }
            };
            state.upsert(record.clone());
            reserved = Some((record, created));
            Ok(())
        })?;

        reserved.ok_or_else(|| StagingError::Internal {
            message: "state update completed without a reservation".into(),
        })
    }

    /// Fold a successful deployment into the record and mark it running.
    fn complete(
        &self,
        reserved: &StagingEnvironmentRecord,
        deployment: Deployment,
    ) -> StagingResult<StagingEnvironmentRecord> {
        let mut finished = None;

        self.store.update(&mut |state| {
            let mut record = state
                .get(&reserved.slug)
                .cloned()
                .unwrap_or_else(|| reserved.clone());
            if !deployment.urls.is_empty() {
                record.urls = Some(deployment.urls.clone());
            }
            record
                .driver_meta
                .extend(deployment.meta.iter().map(|(k, v)| (k.clone(), v.clone())));
            record.transition(EnvironmentStatus::Running)?;
            state.upsert(record.clone());
            finished = Some(record);
            Ok(())
        })?;

        finished.ok_or_else(|| StagingError::Internal {
            message: "state update completed without a record".into(),
        })
    }

    /// Best-effort cleanup after a failed `up`.
    ///
    /// A fresh reservation is dropped (the environment never existed); a
    /// redeploy leaves the record in `error`.
    fn abandon(&self, slug: &Slug, created: bool) {
        let outcome = if created {
            self.store.remove_environment(slug).map(|_| ())
        } else {
            self.store.update(&mut |state| {
                if let Some(record) = state.get_mut(slug) {
                    record.transition(EnvironmentStatus::Error)?;
                }
                Ok(())
            })
        };

        if let Err(e) = outcome {
            warn!(error = %e, slug = %slug, "Rollback failed");
        } else {
            debug!(slug = %slug, created, "Rollback successful");
        }
    }
}
