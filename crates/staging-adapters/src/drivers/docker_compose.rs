//! Docker Compose driver: one compose project per environment.
//!
//! The compose project is named `<project_prefix>-<slug>`; the allocated
//! ports reach the compose file as `API_PORT`, `APP_PORT` and `DB_PORT`.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Deserialize;
use serde_json::{Map, Value, json};
use tracing::{debug, info, instrument, warn};

use staging_core::{
    application::{
        ApplicationError,
        ports::{
            Deployment, DiscoveredEnvironment, DriverContext, HealthReport, LogOptions,
            LogOutput, PrerequisiteReport, ServiceHealth, ServiceStatus, StagingDriver,
        },
    },
    domain::{EnvironmentStatus, EnvironmentUrls, StagingEnvironmentRecord},
    error::{StagingError, StagingResult},
};

use super::command::{CommandError, CommandOutput, CommandRunner, CommandSpec, SystemRunner};

pub const NAME: &str = "docker-compose";

const DEFAULT_HOST: &str = "localhost";

pub struct DockerComposeDriver {
    runner: Arc<dyn CommandRunner>,
}

impl DockerComposeDriver {
    pub fn new() -> Self {
        Self::with_runner(Arc::new(SystemRunner))
    }

    pub fn with_runner(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }

    /// Compose project name for `slug`.
    pub fn project_name(ctx: &DriverContext, slug: &str) -> String {
        format!("{}-{}", ctx.config.project_prefix, slug)
    }

    fn compose_file(ctx: &DriverContext) -> PathBuf {
        let file = ctx
            .config
            .driver_option(NAME, "compose_file")
            .map(PathBuf::from)
            .unwrap_or_else(|| ctx.config.compose_file.clone());
        ctx.project_root.join(file)
    }

    fn host(ctx: &DriverContext) -> &str {
        ctx.config.driver_option(NAME, "host").unwrap_or(DEFAULT_HOST)
    }

    /// `docker compose -p <project> [-f <file>]`, run from the project root.
    ///
    /// The file is only passed when it exists so teardown still works after
    /// it was deleted or renamed.
    fn compose(&self, ctx: &DriverContext, env: &StagingEnvironmentRecord) -> CommandSpec {
        let mut spec = CommandSpec::new("docker")
            .args(["compose", "-p"])
            .arg(Self::project_name(ctx, env.slug.as_str()))
            .current_dir(&ctx.project_root);
        let file = Self::compose_file(ctx);
        if file.is_file() {
            spec = spec.arg("-f").arg(file.display().to_string());
        }
        spec
    }

    fn run_checked(&self, operation: &'static str, spec: &CommandSpec) -> StagingResult<CommandOutput> {
        let output = self
            .runner
            .run(spec)
            .map_err(|e| command_failed(operation, e))?;
        if !output.success {
            return Err(ApplicationError::driver(NAME, operation, output.failure_reason()).into());
        }
        Ok(output)
    }

    fn urls(ctx: &DriverContext, env: &StagingEnvironmentRecord) -> EnvironmentUrls {
        let host = Self::host(ctx);
        let ports = env.ports.unwrap_or_default();
        EnvironmentUrls {
            api: ports.api.map(|p| format!("http://{host}:{p}")),
            app: ports.app.map(|p| format!("http://{host}:{p}")),
        }
    }

    fn probe(agent: &ureq::Agent, url: &str) -> ServiceHealth {
        let started = Instant::now();
        let result = agent.get(url).call();
        let latency_ms = Some(started.elapsed().as_millis() as u64);

        match result {
            Ok(response) => ServiceHealth {
                status: ServiceStatus::Up,
                http_status: Some(response.status()),
                latency_ms,
            },
            Err(ureq::Error::Status(code, _)) => ServiceHealth {
                status: ServiceStatus::Down,
                http_status: Some(code),
                latency_ms,
            },
            Err(ureq::Error::Transport(e)) => {
                debug!(url, error = %e, "Health probe unreachable");
                ServiceHealth {
                    status: ServiceStatus::Unreachable,
                    http_status: None,
                    latency_ms: None,
                }
            }
        }
    }
}

impl Default for DockerComposeDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl StagingDriver for DockerComposeDriver {
    fn name(&self) -> &'static str {
        NAME
    }

    fn check_prerequisites(&self) -> StagingResult<PrerequisiteReport> {
        if self.runner.locate("docker").is_none() {
            return Ok(PrerequisiteReport::from_missing(vec!["docker".into()]));
        }

        let plugin = self
            .runner
            .run(&CommandSpec::new("docker").args(["compose", "version"]));
        let missing = match plugin {
            Ok(output) if output.success => Vec::new(),
            _ => vec!["docker compose plugin".to_string()],
        };
        Ok(PrerequisiteReport::from_missing(missing))
    }

    #[instrument(skip_all, fields(slug = %env.slug))]
    fn up(&self, env: &StagingEnvironmentRecord, ctx: &DriverContext) -> StagingResult<Deployment> {
        let file = Self::compose_file(ctx);
        if !file.is_file() {
            return Err(ApplicationError::driver(
                NAME,
                "up",
                format!("compose file not found: {}", file.display()),
            )
            .into());
        }

        let ports = env.ports.unwrap_or_default();
        let mut spec = self
            .compose(ctx, env)
            .args(["up", "-d", "--remove-orphans"])
            .env("STAGING_SLUG", env.slug.as_str())
            .env("STAGING_BRANCH", env.branch.as_str());
        for (key, port) in [
            ("API_PORT", ports.api),
            ("APP_PORT", ports.app),
            ("DB_PORT", ports.db),
        ] {
            if let Some(port) = port {
                spec = spec.env(key, port.to_string());
            }
        }

        self.run_checked("up", &spec)?;
        let project = Self::project_name(ctx, env.slug.as_str());
        info!(project = %project, "Compose project started");

        let mut meta = Map::new();
        meta.insert("composeProject".into(), json!(project));
        meta.insert("composeFile".into(), json!(file.display().to_string()));
        Ok(Deployment {
            urls: Self::urls(ctx, env),
            meta,
        })
    }

    #[instrument(skip_all, fields(slug = %env.slug))]
    fn down(&self, env: &StagingEnvironmentRecord, ctx: &DriverContext) -> StagingResult<()> {
        let spec = self
            .compose(ctx, env)
            .args(["down", "-v", "--remove-orphans"]);
        self.run_checked("down", &spec)?;
        Ok(())
    }

    #[instrument(skip_all, fields(slug = %env.slug))]
    fn health(&self, env: &StagingEnvironmentRecord, ctx: &DriverContext) -> StagingResult<HealthReport> {
        let urls = env
            .urls
            .clone()
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| Self::urls(ctx, env));
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_millis(ctx.config.health_timeout_ms))
            .build();

        let api = urls.api.as_deref().map(|base| {
            let url = format!("{}{}", base.trim_end_matches('/'), ctx.config.health_path);
            Self::probe(&agent, &url)
        });
        let app = urls.app.as_deref().map(|base| Self::probe(&agent, base));
        Ok(HealthReport::from_services(api, app))
    }

    #[instrument(skip_all, fields(slug = %env.slug, follow = options.follow))]
    fn logs(
        &self,
        env: &StagingEnvironmentRecord,
        ctx: &DriverContext,
        options: &LogOptions,
    ) -> StagingResult<LogOutput> {
        let mut spec = self.compose(ctx, env).args(["logs", "--no-color"]);
        if let Some(tail) = options.tail {
            spec = spec.arg("--tail").arg(tail.to_string());
        }
        if options.follow {
            spec = spec.arg("--follow");
        }
        if let Some(service) = &options.service {
            spec = spec.arg(service.as_str());
        }
        let label = options.service.clone().unwrap_or_else(|| "all".into());

        if !options.follow {
            let output = self.run_checked("logs", &spec)?;
            return Ok(LogOutput {
                lines: output.stdout.lines().map(str::to_string).collect(),
                service: label,
            });
        }

        let Some(sink) = options.sink.clone() else {
            return Err(StagingError::Internal {
                message: "log follow requested without a sink".into(),
            });
        };
        let code = self
            .runner
            .stream(&spec, &options.cancel, &mut |line| sink.line(&label, line))
            .map_err(|e| command_failed("logs", e))?;

        match code {
            Some(code) if code != 0 => Err(ApplicationError::driver(
                NAME,
                "logs",
                format!("exited with status {code}"),
            )
            .into()),
            _ => Ok(LogOutput {
                lines: Vec::new(),
                service: label,
            }),
        }
    }

    fn list(&self, ctx: &DriverContext) -> StagingResult<Vec<DiscoveredEnvironment>> {
        let spec = CommandSpec::new("docker")
            .args(["compose", "ls", "--all", "--format", "json"])
            .current_dir(&ctx.project_root);
        let output = self.run_checked("list", &spec)?;
        parse_projects(&output.stdout, &ctx.config.project_prefix)
    }
}

/// One row of `docker compose ls --format json`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ComposeProject {
    name: String,
    #[serde(default)]
    status: String,
    #[serde(default)]
    config_files: String,
}

fn parse_projects(stdout: &str, prefix: &str) -> StagingResult<Vec<DiscoveredEnvironment>> {
    let trimmed = stdout.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }
    let projects: Vec<ComposeProject> = serde_json::from_str(trimmed)
        .map_err(|e| ApplicationError::driver(NAME, "list", format!("unexpected output: {e}")))?;

    let owned = format!("{prefix}-");
    Ok(projects
        .into_iter()
        .filter_map(|p| {
            let slug = p.name.strip_prefix(&owned)?.to_string();
            let mut meta = Map::new();
            meta.insert("composeProject".into(), Value::String(p.name.clone()));
            if !p.config_files.is_empty() {
                meta.insert("composeFile".into(), Value::String(p.config_files.clone()));
            }
            Some(DiscoveredEnvironment {
                slug,
                status: compose_status(&p.status),
                meta,
            })
        })
        .collect())
}

/// `running(3)` / `exited(2)` / `restarting(1), running(2)` -> lifecycle status.
fn compose_status(status: &str) -> EnvironmentStatus {
    let status = status.to_ascii_lowercase();
    if status.starts_with("running") {
        EnvironmentStatus::Running
    } else if status.starts_with("exited") || status.starts_with("created") {
        EnvironmentStatus::Stopped
    } else {
        EnvironmentStatus::Error
    }
}

fn command_failed(operation: &'static str, e: CommandError) -> StagingError {
    warn!(operation, error = %e, "docker invocation failed");
    ApplicationError::driver(NAME, operation, e.to_string()).into()
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::path::Path;
    use std::sync::Mutex;

    use super::*;
    use staging_core::application::CancellationToken;
    use staging_core::domain::{PortTriple, Slug, StagingConfig};
    use tempfile::TempDir;

    /// Replays canned outputs and records every command line.
    #[derive(Default)]
    struct ScriptedRunner {
        outputs: Mutex<VecDeque<CommandOutput>>,
        seen: Mutex<Vec<CommandSpec>>,
        installed: bool,
    }

    impl ScriptedRunner {
        fn installed() -> Self {
            Self {
                installed: true,
                ..Default::default()
            }
        }

        fn respond(self, output: CommandOutput) -> Self {
            self.outputs.lock().unwrap().push_back(output);
            self
        }

        fn seen(&self) -> Vec<CommandSpec> {
            self.seen.lock().unwrap().clone()
        }
    }

    impl CommandRunner for ScriptedRunner {
        fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, CommandError> {
            self.seen.lock().unwrap().push(spec.clone());
            Ok(self.outputs.lock().unwrap().pop_front().unwrap_or(CommandOutput {
                success: true,
                code: Some(0),
                ..Default::default()
            }))
        }

        fn stream(
            &self,
            spec: &CommandSpec,
            _cancel: &CancellationToken,
            on_line: &mut dyn FnMut(&str),
        ) -> Result<Option<i32>, CommandError> {
            self.seen.lock().unwrap().push(spec.clone());
            on_line("api-1  | listening");
            Ok(Some(0))
        }

        fn locate(&self, program: &str) -> Option<PathBuf> {
            self.installed.then(|| PathBuf::from("/usr/bin").join(program))
        }
    }

    fn ok(stdout: &str) -> CommandOutput {
        CommandOutput {
            success: true,
            code: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    fn failed(stderr: &str) -> CommandOutput {
        CommandOutput {
            success: false,
            code: Some(1),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    fn project(dir: &Path, with_file: bool) -> DriverContext {
        let config = StagingConfig::default();
        if with_file {
            std::fs::write(dir.join(&config.compose_file), "services: {}\n").unwrap();
        }
        DriverContext::new(dir, config)
    }

    fn env() -> StagingEnvironmentRecord {
        StagingEnvironmentRecord::new(Slug::parse("feat-login").unwrap(), "feat/login", NAME)
            .with_ports(PortTriple::starting_at(4001))
    }

    fn driver(runner: ScriptedRunner) -> (DockerComposeDriver, Arc<ScriptedRunner>) {
        let runner = Arc::new(runner);
        (DockerComposeDriver::with_runner(runner.clone()), runner)
    }

    #[test]
    fn prerequisites_report_missing_docker() {
        let (driver, _) = driver(ScriptedRunner::default());
        let report = driver.check_prerequisites().unwrap();
        assert!(!report.met);
        assert_eq!(report.missing, vec!["docker"]);
    }

    #[test]
    fn prerequisites_report_missing_plugin() {
        let (driver, _) = driver(ScriptedRunner::installed().respond(failed("unknown command")));
        let report = driver.check_prerequisites().unwrap();
        assert_eq!(report.missing, vec!["docker compose plugin"]);
    }

    #[test]
    fn up_passes_project_file_and_ports() {
        let dir = TempDir::new().unwrap();
        let ctx = project(dir.path(), true);
        let (driver, runner) = driver(ScriptedRunner::installed());

        let deployment = driver.up(&env(), &ctx).unwrap();
        assert_eq!(deployment.urls.api.as_deref(), Some("http://localhost:4001"));
        assert_eq!(deployment.urls.app.as_deref(), Some("http://localhost:4002"));
        assert_eq!(deployment.meta["composeProject"], "staging-feat-login");

        let spec = &runner.seen()[0];
        assert!(spec.display().starts_with("docker compose -p staging-feat-login -f "));
        assert!(spec.display().ends_with("up -d --remove-orphans"));
        assert!(spec.envs.contains(&("API_PORT".into(), "4001".into())));
        assert!(spec.envs.contains(&("DB_PORT".into(), "4003".into())));
    }

    #[test]
    fn up_without_compose_file_fails_before_running_docker() {
        let dir = TempDir::new().unwrap();
        let ctx = project(dir.path(), false);
        let (driver, runner) = driver(ScriptedRunner::installed());

        let err = driver.up(&env(), &ctx).unwrap_err();
        assert!(err.to_string().contains("compose file not found"));
        assert!(runner.seen().is_empty());
    }

    #[test]
    fn failed_command_surfaces_stderr() {
        let dir = TempDir::new().unwrap();
        let ctx = project(dir.path(), true);
        let (driver, _) = driver(
            ScriptedRunner::installed().respond(failed("Bind for 0.0.0.0:4001 failed: port is already allocated")),
        );

        let err = driver.up(&env(), &ctx).unwrap_err();
        assert!(err.to_string().contains("port is already allocated"));
    }

    #[test]
    fn down_works_without_compose_file() {
        let dir = TempDir::new().unwrap();
        let ctx = project(dir.path(), false);
        let (driver, runner) = driver(ScriptedRunner::installed());

        driver.down(&env(), &ctx).unwrap();
        assert_eq!(
            runner.seen()[0].display(),
            "docker compose -p staging-feat-login down -v --remove-orphans"
        );
    }

    #[test]
    fn bounded_logs_collect_lines() {
        let dir = TempDir::new().unwrap();
        let ctx = project(dir.path(), false);
        let (driver, runner) = driver(ScriptedRunner::installed().respond(ok("a\nb\n")));

        let options = LogOptions {
            service: Some("api".into()),
            tail: Some(50),
            ..Default::default()
        };
        let output = driver.logs(&env(), &ctx, &options).unwrap();
        assert_eq!(output.lines, vec!["a", "b"]);
        assert_eq!(output.service, "api");
        assert!(runner.seen()[0].display().ends_with("logs --no-color --tail 50 api"));
    }

    #[test]
    fn followed_logs_go_to_the_sink() {
        struct Collect(Mutex<Vec<String>>);
        impl staging_core::application::ports::LogSink for Collect {
            fn line(&self, service: &str, line: &str) {
                self.0.lock().unwrap().push(format!("{service}: {line}"));
            }
        }

        let dir = TempDir::new().unwrap();
        let ctx = project(dir.path(), false);
        let (driver, _) = driver(ScriptedRunner::installed());
        let sink = Arc::new(Collect(Mutex::new(Vec::new())));

        let options = LogOptions {
            follow: true,
            sink: Some(sink.clone()),
            ..Default::default()
        };
        let output = driver.logs(&env(), &ctx, &options).unwrap();
        assert!(output.lines.is_empty());
        assert_eq!(*sink.0.lock().unwrap(), vec!["all: api-1  | listening"]);
    }

    #[test]
    fn list_keeps_only_prefixed_projects() {
        let stdout = r#"[
            {"Name":"staging-feat-a","Status":"running(3)","ConfigFiles":"/p/docker-compose.staging.yml"},
            {"Name":"staging-feat-b","Status":"exited(2)","ConfigFiles":""},
            {"Name":"unrelated","Status":"running(1)","ConfigFiles":""}
        ]"#;
        let found = parse_projects(stdout, "staging").unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].slug, "feat-a");
        assert_eq!(found[0].status, EnvironmentStatus::Running);
        assert_eq!(found[1].status, EnvironmentStatus::Stopped);
        assert!(parse_projects("", "staging").unwrap().is_empty());
    }

    #[test]
    fn health_probes_api_and_app() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        std::thread::spawn(move || {
            for stream in listener.incoming().take(2) {
                let mut stream = stream.unwrap();
                let mut buf = [0u8; 1024];
                let _ = stream.read(&mut buf);
                let _ = stream.write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 0\r\nConnection: close\r\n\r\n");
            }
        });

        let dir = TempDir::new().unwrap();
        let ctx = project(dir.path(), false);
        let mut record = env();
        record.urls = Some(EnvironmentUrls {
            api: Some(format!("http://127.0.0.1:{port}")),
            app: Some(format!("http://127.0.0.1:{port}")),
        });

        let (driver, _) = driver(ScriptedRunner::installed());
        let report = driver.health(&record, &ctx).unwrap();
        assert!(report.healthy);
        assert_eq!(report.api.unwrap().http_status, Some(200));
    }

    #[test]
    fn health_reports_unreachable_services() {
        // Bind and drop to get a port nothing listens on.
        let port = TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();

        let dir = TempDir::new().unwrap();
        let ctx = project(dir.path(), false);
        let mut record = env();
        record.urls = Some(EnvironmentUrls {
            api: Some(format!("http://127.0.0.1:{port}")),
            app: None,
        });

        let (driver, _) = driver(ScriptedRunner::installed());
        let report = driver.health(&record, &ctx).unwrap();
        assert!(!report.healthy);
        assert_eq!(report.api.unwrap().status, ServiceStatus::Unreachable);
    }
}
