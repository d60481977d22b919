//! Command handlers. One module per subcommand; each exposes `execute`.

pub mod completions;
pub mod config;
pub mod down;
pub mod health;
pub mod init;
pub mod list;
pub mod logs;
pub mod reconcile;
pub mod up;

use staging_adapters::{JsonFileStateStore, builtin_registry};
use staging_core::application::{StagingService, ports::DriverContext};
use staging_core::domain::StagingEnvironmentRecord;

use crate::{config::AppConfig, error::CliResult, output::OutputManager};

/// Wire the file-backed store and the built-in drivers for `config`.
pub(crate) fn build_service(config: &AppConfig) -> StagingService {
    StagingService::new(
        Box::new(JsonFileStateStore::new(&config.project_root)),
        builtin_registry(),
        DriverContext::new(&config.project_root, config.staging.clone()),
    )
}

/// Human rendering of a single record.
pub(crate) fn print_record(output: &OutputManager, record: &StagingEnvironmentRecord) -> CliResult<()> {
    output.field("slug", record.slug.as_str())?;
    output.field("branch", &record.branch)?;
    output.field("driver", &record.driver)?;
    output.field("status", &record.status.to_string())?;
    if let Some(ports) = record.ports {
        let fmt = |p: Option<u16>| p.map_or_else(|| "-".to_string(), |p| p.to_string());
        output.field(
            "ports",
            &format!(
                "api={} app={} db={}",
                fmt(ports.api),
                fmt(ports.app),
                fmt(ports.db)
            ),
        )?;
    }
    if let Some(urls) = &record.urls {
        if let Some(api) = &urls.api {
            output.field("api", api)?;
        }
        if let Some(app) = &urls.app {
            output.field("app", app)?;
        }
    }
    output.field("updated", &record.updated_at.to_rfc3339())?;
    Ok(())
}
