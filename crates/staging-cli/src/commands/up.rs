//! `staging up`: create or redeploy a branch environment.

use tracing::info;

use crate::{
    cli::UpArgs,
    commands::{build_service, print_record},
    config::AppConfig,
    error::CliResult,
    output::OutputManager,
};

pub fn execute(args: UpArgs, config: AppConfig, output: OutputManager) -> CliResult<()> {
    let service = build_service(&config);

    let spinner = output.spinner(format!("Deploying {}...", args.branch));
    let result = service.up(&args.branch, args.driver.as_deref());
    spinner.finish_and_clear();
    let record = result?;

    info!(slug = %record.slug, driver = %record.driver, "Environment up");

    if output.is_json() {
        output.json(&record)?;
        return Ok(());
    }

    output.success(&format!("Environment '{}' is running", record.slug))?;
    print_record(&output, &record)?;
    Ok(())
}
