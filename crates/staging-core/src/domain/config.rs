//! Settings shared by the orchestrator and every driver.
//!
//! Loading (files, env, `.env`) is the CLI's job; the core only sees the
//! resolved value.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::domain::PortRange;

pub const DEFAULT_DRIVER: &str = "docker-compose";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StagingConfig {
    /// Driver used for environments that do not exist yet.
    pub driver: String,
    /// Compose file used by the docker-compose driver, relative to the project root.
    pub compose_file: PathBuf,
    /// Prefix of compose project names (`<prefix>-<slug>`).
    pub project_prefix: String,
    /// Path probed by HTTP health checks.
    pub health_path: String,
    pub health_timeout_ms: u64,
    /// Inclusive range port triples are allocated from.
    pub ports: PortRange,
    /// Free-form per-driver options: `[drivers.<name>] key = "value"`.
    pub drivers: BTreeMap<String, BTreeMap<String, String>>,
}

impl Default for StagingConfig {
    fn default() -> Self {
        Self {
            driver: DEFAULT_DRIVER.into(),
            compose_file: PathBuf::from("docker-compose.staging.yml"),
            project_prefix: "staging".into(),
            health_path: "/health".into(),
            health_timeout_ms: 5_000,
            ports: PortRange::DEFAULT,
            drivers: BTreeMap::new(),
        }
    }
}

impl StagingConfig {
    /// Option `key` for driver `driver`, if configured.
    pub fn driver_option(&self, driver: &str, key: &str) -> Option<&str> {
        self.drivers
            .get(driver)
            .and_then(|opts| opts.get(key))
            .map(String::as_str)
    }
}
