//! `staging logs`: print or follow environment logs.

use std::io::Write;
use std::sync::{Arc, Mutex};

use signal_hook::consts::SIGINT;
use tracing::debug;

use staging_core::application::{
    CancellationToken,
    ports::{LogOptions, LogSink},
};

use crate::{
    cli::LogsArgs,
    commands::build_service,
    config::AppConfig,
    error::{CliResult, IntoCli},
    output::OutputManager,
};

/// Writes streamed lines straight to stdout as they arrive.
struct StdoutSink {
    out: Mutex<std::io::Stdout>,
}

impl LogSink for StdoutSink {
    fn line(&self, _service: &str, line: &str) {
        if let Ok(mut out) = self.out.lock() {
            // A closed pipe ends the stream on the next cancel check.
            let _ = writeln!(out, "{line}");
        }
    }
}

pub fn execute(args: LogsArgs, config: AppConfig, output: OutputManager) -> CliResult<()> {
    let service = build_service(&config);
    let cancel = CancellationToken::new();

    let mut options = LogOptions {
        service: args.service,
        tail: args.tail,
        follow: args.follow,
        cancel: cancel.clone(),
        sink: None,
    };

    if args.follow {
        signal_hook::flag::register(SIGINT, cancel.flag())
            .with_cli_context(|| "failed to install Ctrl-C handler")?;
        options.sink = Some(Arc::new(StdoutSink {
            out: Mutex::new(std::io::stdout()),
        }));
        debug!(slug = %args.slug, "Following logs until interrupted");
    }

    let logs = service.logs(&args.slug, &options)?;

    if output.is_json() {
        output.json(&logs)?;
        return Ok(());
    }
    // Log lines are the result; they bypass quiet mode.
    let stdout = std::io::stdout();
    let mut lock = stdout.lock();
    for line in &logs.lines {
        writeln!(lock, "{line}")?;
    }
    Ok(())
}
