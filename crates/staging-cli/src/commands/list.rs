//! Implementation of the `staging list` command.

use chrono::{DateTime, Utc};

use staging_core::domain::StagingEnvironmentRecord;

use crate::{
    cli::{ListArgs, ListFormat},
    commands::build_service,
    config::AppConfig,
    error::CliResult,
    output::OutputManager,
};

pub fn execute(args: ListArgs, config: AppConfig, output: OutputManager) -> CliResult<()> {
    let service = build_service(&config);
    let records = service.list()?;

    let format = if output.is_json() {
        ListFormat::Json
    } else {
        args.format
    };

    match format {
        ListFormat::Table => {
            if records.is_empty() {
                output.info("No staging environments")?;
                return Ok(());
            }
            output.header(&format!(
                "{:<28} {:<10} {:<16} {:<17} {}",
                "SLUG", "STATUS", "DRIVER", "PORTS", "UPDATED"
            ))?;
            let now = Utc::now();
            for record in &records {
                output.print(&table_row(record, now))?;
            }
        }

        // JSON output must stay parseable in pipes, so it ignores quiet mode.
        ListFormat::Json => output.json(&records)?,

        ListFormat::List => {
            for record in &records {
                println!("{}", record.slug);
            }
        }
    }

    Ok(())
}

fn table_row(record: &StagingEnvironmentRecord, now: DateTime<Utc>) -> String {
    let ports = record
        .ports
        .and_then(|p| Some(format!("{}-{}", p.api?, p.db?)))
        .unwrap_or_else(|| "-".into());
    format!(
        "{:<28} {:<10} {:<16} {:<17} {}",
        record.slug.as_str(),
        record.status.to_string(),
        record.driver,
        ports,
        age(record.updated_at, now)
    )
}

/// Coarse "how long ago" for the table.
fn age(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let secs = (now - then).num_seconds().max(0);
    match secs {
        0..=59 => format!("{secs}s ago"),
        60..=3599 => format!("{}m ago", secs / 60),
        3600..=86_399 => format!("{}h ago", secs / 3600),
        _ => format!("{}d ago", secs / 86_400),
    }
}
