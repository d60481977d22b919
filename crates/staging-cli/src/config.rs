//! Application configuration.
//!
//! [`AppConfig`] is loaded once at startup and passed down by value.  The
//! core crate only ever sees the resolved [`StagingConfig`].
//!
//! # Resolution order (highest priority first)
//!
//! 1. CLI flags (handled at the call-site, not here)
//! 2. Environment variables: `MOLECULE_STAGING_<KEY>`, nested keys joined
//!    with `__` (`MOLECULE_STAGING_PORTS__START=5000`)
//! 3. Config file: `--config FILE`, else `<root>/.molecule/staging.toml`
//! 4. Built-in defaults (always present)

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::Context;
use config::{Config, Environment, File, FileFormat};
use tracing::debug;

use staging_adapters::state_store::STATE_DIR;
use staging_core::domain::StagingConfig;

pub const CONFIG_FILE: &str = "staging.toml";
pub const ENV_PREFIX: &str = "MOLECULE_STAGING";

/// Application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Resolved settings handed to the core.
    pub staging: StagingConfig,
    pub project_root: PathBuf,
    /// The file that contributed values, if any.
    pub source: Option<PathBuf>,
}

impl AppConfig {
    /// Load configuration for `project_root`.
    ///
    /// An explicit `config_file` must exist; the default location is optional.
    pub fn load(project_root: &Path, config_file: Option<&PathBuf>) -> anyhow::Result<Self> {
        Self::load_with_env(project_root, config_file, None)
    }

    /// [`load`](Self::load) with an explicit environment map instead of the
    /// process environment.
    fn load_with_env(
        project_root: &Path,
        config_file: Option<&PathBuf>,
        env: Option<HashMap<String, String>>,
    ) -> anyhow::Result<Self> {
        let (path, required) = match config_file {
            Some(path) => (path.clone(), true),
            None => (Self::config_path(project_root), false),
        };

        let defaults = Config::try_from(&StagingConfig::default())
            .context("Failed to build default configuration")?;
        let settings = Config::builder()
            .add_source(defaults)
            .add_source(File::from(path.as_path()).format(FileFormat::Toml).required(required))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true)
                    .source(env),
            )
            .build()
            .with_context(|| format!("Failed to read configuration from {}", path.display()))?;

        let staging: StagingConfig = settings
            .try_deserialize()
            .context("Invalid configuration value")?;
        staging
            .ports
            .validate()
            .context("Invalid `ports` configuration")?;

        let source = path.is_file().then_some(path);
        debug!(
            driver = %staging.driver,
            ports = %staging.ports,
            source = ?source,
            "Configuration loaded"
        );

        Ok(Self {
            staging,
            project_root: project_root.to_path_buf(),
            source,
        })
    }

    /// Path to the project configuration file.
    pub fn config_path(project_root: &Path) -> PathBuf {
        project_root.join(STATE_DIR).join(CONFIG_FILE)
    }

    /// The effective settings as TOML.
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(&self.staging)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use staging_core::domain::PortRange;
    use tempfile::TempDir;

    fn env(pairs: &[(&str, &str)]) -> Option<HashMap<String, String>> {
        Some(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    fn write_config(root: &Path, body: &str) {
        std::fs::create_dir_all(root.join(STATE_DIR)).unwrap();
        std::fs::write(AppConfig::config_path(root), body).unwrap();
    }

    #[test]
    fn load_without_file_returns_defaults() {
        let dir = TempDir::new().unwrap();
        let cfg = AppConfig::load_with_env(dir.path(), None, env(&[])).unwrap();
        assert_eq!(cfg.staging, StagingConfig::default());
        assert!(cfg.source.is_none());
    }

    #[test]
    fn file_overrides_defaults() {
        let dir = TempDir::new().unwrap();
        write_config(
            dir.path(),
            "driver = \"memory\"\n\n[ports]\nstart = 5000\nend = 5099\n\n[drivers.docker-compose]\nhost = \"staging.local\"\n",
        );

        let cfg = AppConfig::load_with_env(dir.path(), None, env(&[])).unwrap();
        assert_eq!(cfg.staging.driver, "memory");
        assert_eq!(cfg.staging.ports, PortRange::new(5000, 5099).unwrap());
        assert_eq!(
            cfg.staging.driver_option("docker-compose", "host"),
            Some("staging.local")
        );
        assert!(cfg.source.is_some());
    }

    #[test]
    fn partial_table_keeps_other_defaults() {
        let dir = TempDir::new().unwrap();
        write_config(dir.path(), "[ports]\nend = 4200\n");

        let cfg = AppConfig::load_with_env(dir.path(), None, env(&[])).unwrap();
        assert_eq!(cfg.staging.ports.start, 4001);
        assert_eq!(cfg.staging.ports.end, 4200);
    }

    #[test]
    fn environment_overrides_file() {
        let dir = TempDir::new().unwrap();
        write_config(dir.path(), "driver = \"memory\"\n");

        let cfg = AppConfig::load_with_env(
            dir.path(),
            None,
            env(&[
                ("MOLECULE_STAGING_DRIVER", "docker-compose"),
                ("MOLECULE_STAGING_PORTS__START", "6000"),
                ("MOLECULE_STAGING_PORTS__END", "6099"),
            ]),
        )
        .unwrap();
        assert_eq!(cfg.staging.driver, "docker-compose");
        assert_eq!(cfg.staging.ports, PortRange::new(6000, 6099).unwrap());
    }

    #[test]
    fn environment_start_past_default_end_is_rejected() {
        let dir = TempDir::new().unwrap();
        let err = AppConfig::load_with_env(
            dir.path(),
            None,
            env(&[("MOLECULE_STAGING_PORTS__START", "6000")]),
        )
        .unwrap_err();
        assert!(format!("{err:#}").contains("6000-4099"));
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope.toml");
        assert!(AppConfig::load_with_env(dir.path(), Some(&missing), env(&[])).is_err());
    }

    #[test]
    fn inverted_port_range_is_rejected() {
        let dir = TempDir::new().unwrap();
        write_config(dir.path(), "[ports]\nstart = 5000\nend = 4000\n");
        assert!(AppConfig::load_with_env(dir.path(), None, env(&[])).is_err());
    }

    #[test]
    fn config_path_is_under_molecule_dir() {
        assert_eq!(
            AppConfig::config_path(Path::new("/p")),
            PathBuf::from("/p/.molecule/staging.toml")
        );
    }
}
