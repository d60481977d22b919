//! `staging health`: probe an environment.

use staging_core::application::ports::{HealthReport, ServiceHealth};

use crate::{
    cli::SlugArgs,
    commands::build_service,
    config::AppConfig,
    error::{CliError, CliResult},
    output::OutputManager,
};

/// Prints the report and fails with [`CliError::Unhealthy`] when any probed
/// service is not up.
pub fn execute(args: SlugArgs, config: AppConfig, output: OutputManager) -> CliResult<()> {
    let service = build_service(&config);

    let spinner = output.spinner(format!("Probing {}...", args.slug));
    let result = service.health(&args.slug);
    spinner.finish_and_clear();
    let report = result?;

    if output.is_json() {
        output.json(&report)?;
    } else {
        render(&output, &args.slug, &report)?;
    }

    if report.healthy {
        Ok(())
    } else {
        Err(CliError::Unhealthy { slug: args.slug })
    }
}

fn render(output: &OutputManager, slug: &str, report: &HealthReport) -> CliResult<()> {
    if report.healthy {
        output.success(&format!("'{slug}' is healthy"))?;
    } else {
        output.warning(&format!("'{slug}' is unhealthy"))?;
    }
    for (name, health) in [("api", &report.api), ("app", &report.app)] {
        if let Some(health) = health {
            output.field(name, &describe(health))?;
        }
    }
    Ok(())
}

fn describe(health: &ServiceHealth) -> String {
    let mut text = health.status.to_string();
    if let Some(code) = health.http_status {
        text.push_str(&format!(" (HTTP {code}"));
        if let Some(ms) = health.latency_ms {
            text.push_str(&format!(", {ms} ms"));
        }
        text.push(')');
    }
    text
}
