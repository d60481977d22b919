//! External process execution behind a trait, so drivers can be tested
//! without the real tools installed.

use std::io::{self, BufRead, BufReader};
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, trace};

use staging_core::application::CancellationToken;

const CANCEL_POLL: Duration = Duration::from_millis(100);

/// A fully described command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub envs: Vec<(String, String)>,
    pub cwd: Option<PathBuf>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            envs: Vec::new(),
            cwd: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    /// Shell-like rendering for logs and error messages.
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn to_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        cmd.envs(self.envs.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        if let Some(dir) = &self.cwd {
            cmd.current_dir(dir);
        }
        cmd
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommandOutput {
    pub success: bool,
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// Last non-empty stderr line, falling back to the exit code.
    pub fn failure_reason(&self) -> String {
        self.stderr
            .lines()
            .rev()
            .find(|l| !l.trim().is_empty())
            .map(|l| l.trim().to_string())
            .unwrap_or_else(|| match self.code {
                Some(code) => format!("exited with status {code}"),
                None => "terminated by signal".to_string(),
            })
    }
}

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("failed to start `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },

    #[error("I/O error while running `{command}`: {source}")]
    Io {
        command: String,
        #[source]
        source: io::Error,
    },
}

/// Process execution port used by CLI-backed drivers.
pub trait CommandRunner: Send + Sync {
    /// Run to completion and capture both streams.
    fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, CommandError>;

    /// Feed stdout lines to `on_line` until the process exits or `cancel`
    /// fires (the child is killed). Returns the exit code, `None` when
    /// cancelled or killed by a signal.
    fn stream(
        &self,
        spec: &CommandSpec,
        cancel: &CancellationToken,
        on_line: &mut dyn FnMut(&str),
    ) -> Result<Option<i32>, CommandError>;

    /// Resolve `program` on `PATH`.
    fn locate(&self, program: &str) -> Option<PathBuf>;
}

/// Runs real processes via `std::process`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, CommandError> {
        debug!(command = %spec.display(), "Running command");
        let output = spec
            .to_command()
            .stdin(Stdio::null())
            .output()
            .map_err(|source| CommandError::Spawn {
                command: spec.display(),
                source,
            })?;

        Ok(CommandOutput {
            success: output.status.success(),
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    fn stream(
        &self,
        spec: &CommandSpec,
        cancel: &CancellationToken,
        on_line: &mut dyn FnMut(&str),
    ) -> Result<Option<i32>, CommandError> {
        debug!(command = %spec.display(), "Streaming command");
        let mut child = spec
            .to_command()
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|source| CommandError::Spawn {
                command: spec.display(),
                source,
            })?;

        let Some(stdout) = child.stdout.take() else {
            kill(&mut child);
            return Err(CommandError::Io {
                command: spec.display(),
                source: io::Error::other("stdout was not captured"),
            });
        };

        // Reading blocks, so lines are forwarded from a helper thread and the
        // cancel flag is polled between them.
        let (tx, rx) = mpsc::channel::<io::Result<String>>();
        let reader = thread::spawn(move || {
            for line in BufReader::new(stdout).lines() {
                if tx.send(line).is_err() {
                    break;
                }
            }
        });

        let mut cancelled = false;
        loop {
            if cancel.is_cancelled() {
                trace!("Cancellation requested, killing child");
                kill(&mut child);
                cancelled = true;
                break;
            }
            match rx.recv_timeout(CANCEL_POLL) {
                Ok(Ok(line)) => on_line(&line),
                Ok(Err(source)) => {
                    kill(&mut child);
                    return Err(CommandError::Io {
                        command: spec.display(),
                        source,
                    });
                }
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        let status = child.wait().map_err(|source| CommandError::Io {
            command: spec.display(),
            source,
        })?;
        // A cancelled child may leave grandchildren holding the pipe open.
        if !cancelled {
            let _ = reader.join();
        }

        Ok(if cancelled { None } else { status.code() })
    }

    fn locate(&self, program: &str) -> Option<PathBuf> {
        which::which(program).ok()
    }
}

fn kill(child: &mut Child) {
    // Already-exited children make this fail, which is fine.
    let _ = child.kill();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_joins_program_and_args() {
        let spec = CommandSpec::new("docker")
            .args(["compose", "-p", "staging-a"])
            .arg("up");
        assert_eq!(spec.display(), "docker compose -p staging-a up");
    }

    #[test]
    fn failure_reason_prefers_last_stderr_line() {
        let output = CommandOutput {
            success: false,
            code: Some(1),
            stdout: String::new(),
            stderr: "warning: x\nerror: port is already allocated\n\n".into(),
        };
        assert_eq!(output.failure_reason(), "error: port is already allocated");

        let silent = CommandOutput {
            code: Some(17),
            ..Default::default()
        };
        assert_eq!(silent.failure_reason(), "exited with status 17");
    }

    #[cfg(unix)]
    #[test]
    fn system_runner_captures_output() {
        let output = SystemRunner
            .run(&CommandSpec::new("sh").args(["-c", "echo hi; echo oops >&2; exit 3"]))
            .unwrap();
        assert!(!output.success);
        assert_eq!(output.code, Some(3));
        assert_eq!(output.stdout.trim(), "hi");
        assert_eq!(output.stderr.trim(), "oops");
    }

    #[cfg(unix)]
    #[test]
    fn stream_forwards_lines() {
        let mut seen = Vec::new();
        let code = SystemRunner
            .stream(
                &CommandSpec::new("sh").args(["-c", "echo one; echo two"]),
                &CancellationToken::new(),
                &mut |line| seen.push(line.to_string()),
            )
            .unwrap();
        assert_eq!(code, Some(0));
        assert_eq!(seen, vec!["one", "two"]);
    }

    #[cfg(unix)]
    #[test]
    fn stream_stops_on_cancel() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let code = SystemRunner
            .stream(
                &CommandSpec::new("sh").args(["-c", "sleep 30"]),
                &cancel,
                &mut |_| {},
            )
            .unwrap();
        assert_eq!(code, None);
    }

    #[test]
    fn missing_program_is_a_spawn_error() {
        let err = SystemRunner
            .run(&CommandSpec::new("definitely-not-a-real-binary-4711"))
            .unwrap_err();
        assert!(matches!(err, CommandError::Spawn { .. }));
    }
}
