//! `staging reconcile`: report drift between `staging.json` and the drivers.
//!
//! Read-only: nothing is torn down or forgotten. The report tells the
//! operator which `staging down` calls to make.

use crate::{
    cli::ReconcileArgs,
    commands::build_service,
    config::AppConfig,
    error::CliResult,
    output::OutputManager,
};

pub fn execute(args: ReconcileArgs, config: AppConfig, output: OutputManager) -> CliResult<()> {
    let service = build_service(&config);

    let spinner = output.spinner("Querying drivers...");
    let result = service.reconcile(args.driver.as_deref());
    spinner.finish_and_clear();
    let report = result?;

    if output.is_json() {
        output.json(&report)?;
        return Ok(());
    }

    if report.is_in_sync() {
        output.success("Tracked environments match the drivers")?;
        return Ok(());
    }

    if !report.untracked.is_empty() {
        output.warning("Running but not tracked (orphans):")?;
        for env in &report.untracked {
            output.print(&format!("  {} ({})", env.slug, env.status))?;
        }
    }
    if !report.missing.is_empty() {
        output.warning("Tracked but unknown to their driver:")?;
        for record in &report.missing {
            output.print(&format!(
                "  {} ({} via {})",
                record.slug, record.status, record.driver
            ))?;
        }
        output.info("Run `staging down <slug>` to forget stale records")?;
    }
    Ok(())
}
