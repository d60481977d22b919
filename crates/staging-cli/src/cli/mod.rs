//! CLI argument definitions using the clap derive API.
//!
//! This module is the *only* place that knows about argument names, aliases,
//! help text, and value enums.  No business logic lives here.

use clap::{Args, Parser, Subcommand, ValueEnum};

pub mod global;
pub use global::GlobalArgs;

// ── Top-level CLI ─────────────────────────────────────────────────────────────

/// Main CLI entry-point.
#[derive(Debug, Parser)]
#[command(
    name    = "staging",
    bin_name = "staging",
    version  = env!("CARGO_PKG_VERSION"),
    author   = env!("CARGO_PKG_AUTHORS"),
    about    = "Ephemeral per-branch staging environments",
    long_about = "staging deploys one isolated environment per git branch, \
                  allocates it a private port triple, and tracks it in \
                  .molecule/staging.json.",
    after_help = "EXAMPLES:\n\
        \x20 staging up feature/login\n\
        \x20 staging health feature-login\n\
        \x20 staging logs feature-login --service api --follow\n\
        \x20 staging down feature-login --yes\n\
        \x20 staging completions bash > /usr/share/bash-completion/completions/staging",
    arg_required_else_help = true,
    subcommand_required    = true,
)]
pub struct Cli {
    /// Flags available on every subcommand.
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

// ── Subcommands ───────────────────────────────────────────────────────────────

/// All available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Create or redeploy the environment for a branch.
    #[command(
        about = "Deploy a branch",
        after_help = "EXAMPLES:\n\
            \x20 staging up feature/login\n\
            \x20 staging up feature/login --driver memory"
    )]
    Up(UpArgs),

    /// Tear an environment down and forget it.
    #[command(
        visible_alias = "rm",
        about = "Tear down an environment",
        after_help = "EXAMPLES:\n\
            \x20 staging down feature-login\n\
            \x20 staging down feature-login --yes"
    )]
    Down(DownArgs),

    /// Probe an environment's services.
    #[command(about = "Check environment health")]
    Health(SlugArgs),

    /// Show or follow environment logs.
    #[command(
        about = "Show environment logs",
        after_help = "EXAMPLES:\n\
            \x20 staging logs feature-login --tail 100\n\
            \x20 staging logs feature-login --service api --follow"
    )]
    Logs(LogsArgs),

    /// List tracked environments.
    #[command(
        visible_alias = "ls",
        about = "List tracked environments",
        after_help = "EXAMPLES:\n\
            \x20 staging list\n\
            \x20 staging list --format json"
    )]
    List(ListArgs),

    /// Compare tracked environments with what the drivers report.
    #[command(about = "Find orphaned or vanished environments")]
    Reconcile(ReconcileArgs),

    /// Write a default `.molecule/staging.toml`.
    #[command(
        about = "Initialise configuration",
        after_help = "EXAMPLES:\n\
            \x20 staging init\n\
            \x20 staging init --force"
    )]
    Init(InitArgs),

    /// Generate shell completion scripts.
    #[command(
        about = "Generate shell completions",
        after_help = "EXAMPLES:\n\
            \x20 staging completions bash > ~/.local/share/bash-completion/completions/staging\n\
            \x20 staging completions zsh  > ~/.zfunc/_staging\n\
            \x20 staging completions fish > ~/.config/fish/completions/staging.fish"
    )]
    Completions(CompletionsArgs),

    /// Inspect the effective configuration.
    #[command(
        about = "Configuration management",
        subcommand,
        after_help = "EXAMPLES:\n\
            \x20 staging config show\n\
            \x20 staging config path"
    )]
    Config(ConfigCommands),
}

// ── up ────────────────────────────────────────────────────────────────────────

/// Arguments for `staging up`.
#[derive(Debug, Args)]
pub struct UpArgs {
    /// Git branch to deploy. Its slug becomes the environment name.
    #[arg(value_name = "BRANCH", help = "Git branch name")]
    pub branch: String,

    /// Driver for a new environment (existing ones keep theirs).
    #[arg(
        short = 'd',
        long = "driver",
        value_name = "NAME",
        help = "Driver to deploy with (default from config)"
    )]
    pub driver: Option<String>,
}

// ── down ──────────────────────────────────────────────────────────────────────

/// Arguments for `staging down`.
#[derive(Debug, Args)]
pub struct DownArgs {
    #[arg(value_name = "SLUG", help = "Environment slug")]
    pub slug: String,

    /// Skip the confirmation prompt.
    #[arg(short = 'y', long = "yes", help = "Skip confirmation")]
    pub yes: bool,
}

/// A single environment slug.
#[derive(Debug, Args)]
pub struct SlugArgs {
    #[arg(value_name = "SLUG", help = "Environment slug")]
    pub slug: String,
}

// ── logs ──────────────────────────────────────────────────────────────────────

/// Arguments for `staging logs`.
#[derive(Debug, Args)]
pub struct LogsArgs {
    #[arg(value_name = "SLUG", help = "Environment slug")]
    pub slug: String,

    /// Only this service's logs.
    #[arg(short = 's', long = "service", value_name = "SERVICE", help = "Service name (e.g. api)")]
    pub service: Option<String>,

    /// Number of trailing lines.
    #[arg(short = 'n', long = "tail", value_name = "N", help = "Show the last N lines")]
    pub tail: Option<usize>,

    /// Keep streaming until interrupted.
    #[arg(short = 'f', long = "follow", help = "Follow log output (Ctrl-C to stop)")]
    pub follow: bool,
}

// ── list ──────────────────────────────────────────────────────────────────────

/// Arguments for `staging list`.
#[derive(Debug, Args)]
pub struct ListArgs {
    /// Output format.
    #[arg(
        long = "format",
        value_enum,
        default_value = "table",
        help = "Output format"
    )]
    pub format: ListFormat,
}

/// Output format for the `list` command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ListFormat {
    /// Human-readable table.
    Table,
    /// One slug per line.
    List,
    /// JSON array.
    Json,
}

// ── reconcile ─────────────────────────────────────────────────────────────────

/// Arguments for `staging reconcile`.
#[derive(Debug, Args)]
pub struct ReconcileArgs {
    /// Only ask this driver.
    #[arg(short = 'd', long = "driver", value_name = "NAME", help = "Driver to query")]
    pub driver: Option<String>,
}

// ── init ──────────────────────────────────────────────────────────────────────

/// Arguments for `staging init`.
#[derive(Debug, Args)]
pub struct InitArgs {
    /// Overwrite an existing config file.
    #[arg(short = 'f', long = "force", help = "Overwrite existing configuration")]
    pub force: bool,
}

// ── completions ───────────────────────────────────────────────────────────────

/// Arguments for `staging completions`.
#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Target shell.
    #[arg(value_enum, help = "Shell to generate completions for")]
    pub shell: Shell,
}

/// Supported shells for completion generation.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Elvish,
}

// ── config subcommands ────────────────────────────────────────────────────────

/// Subcommands for `staging config`.
#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Print the effective configuration as TOML.
    Show,
    /// Print the path of the project configuration file.
    Path,
}

// ── tests ─────────────────────────────────────────────────────────────────────
