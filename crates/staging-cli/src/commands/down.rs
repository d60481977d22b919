//! `staging down`: tear an environment down and forget it.

use std::io::IsTerminal;

use crate::{
    cli::DownArgs,
    commands::build_service,
    config::AppConfig,
    error::{CliError, CliResult},
    output::OutputManager,
};

pub fn execute(args: DownArgs, config: AppConfig, output: OutputManager) -> CliResult<()> {
    let service = build_service(&config);

    let record = match service.get(&args.slug) {
        Ok(record) => record,
        Err(e) if e.is_not_found() => {
            output.info(&format!("No environment named '{}'; nothing to do", args.slug))?;
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    if !args.yes {
        if !std::io::stdin().is_terminal() {
            return Err(CliError::InvalidInput {
                message: "refusing to tear down without confirmation; pass --yes".into(),
                source: None,
            });
        }
        let prompt = format!(
            "Tear down '{}' ({} via {})?",
            record.slug, record.branch, record.driver
        );
        if !confirm(&prompt)? {
            return Err(CliError::Cancelled);
        }
    }

    let spinner = output.spinner(format!("Tearing down {}...", record.slug));
    let result = service.down(&args.slug);
    spinner.finish_and_clear();

    match result? {
        Some(removed) if output.is_json() => output.json(&removed)?,
        Some(removed) => output.success(&format!("Environment '{}' removed", removed.slug))?,
        // Removed by someone else between the lookup and the teardown.
        None => output.info(&format!("No environment named '{}'; nothing to do", args.slug))?,
    }
    Ok(())
}

#[cfg(feature = "interactive")]
fn confirm(prompt: &str) -> CliResult<bool> {
    dialoguer::Confirm::new()
        .with_prompt(prompt)
        .default(false)
        .interact()
        .map_err(|e| CliError::IoError {
            message: "failed to read confirmation input".into(),
            source: std::io::Error::other(e),
        })
}

#[cfg(not(feature = "interactive"))]
fn confirm(prompt: &str) -> CliResult<bool> {
    use std::io::{self, Write};

    print!("{prompt} [y/N] ");
    io::stdout().flush().map_err(|e| CliError::IoError {
        message: "failed to flush stdout".into(),
        source: e,
    })?;

    let mut input = String::new();
    io::stdin()
        .read_line(&mut input)
        .map_err(|e| CliError::IoError {
            message: "failed to read confirmation input".into(),
            source: e,
        })?;

    let input = input.trim().to_ascii_lowercase();
    Ok(input == "y" || input == "yes")
}
