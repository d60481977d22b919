//! Environment records - one per ephemeral staging environment.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::{DomainError, PortTriple, Slug};

/// Lifecycle status of an environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvironmentStatus {
    Creating,
    Running,
    Stopped,
    Error,
}

impl EnvironmentStatus {
    /// Whether the orchestrator may move an environment from `self` to `next`.
    ///
    /// - `* -> creating` only through `up` (fresh deploy or redeploy)
    /// - `creating -> running | error`
    /// - `running -> error` (failed health)
    /// - `* -> stopped` (successful `down`)
    pub fn can_transition_to(self, next: EnvironmentStatus) -> bool {
        use EnvironmentStatus::*;
        match (self, next) {
            (_, Creating) | (_, Stopped) => true,
            (Creating, Running) | (Creating, Error) => true,
            (Running, Error) => true,
            (Running, Running) | (Error, Error) => true,
            _ => false,
        }
    }
}

impl fmt::Display for EnvironmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Creating => write!(f, "creating"),
            Self::Running => write!(f, "running"),
            Self::Stopped => write!(f, "stopped"),
            Self::Error => write!(f, "error"),
        }
    }
}

impl FromStr for EnvironmentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "creating" => Ok(Self::Creating),
            "running" => Ok(Self::Running),
            "stopped" => Ok(Self::Stopped),
            "error" => Ok(Self::Error),
            other => Err(format!("unknown environment status '{other}'")),
        }
    }
}

/// Externally reachable endpoints of a deployed environment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentUrls {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app: Option<String>,
}

impl EnvironmentUrls {
    pub fn is_empty(&self) -> bool {
        self.api.is_none() && self.app.is_none()
    }
}

/// Ports reserved for an environment. Fields are optional because some
/// drivers (PaaS) never bind local ports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentPorts {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db: Option<u16>,
}

impl EnvironmentPorts {
    /// All assigned ports, skipping absent roles.
    pub fn assigned(self) -> impl Iterator<Item = u16> {
        [self.api, self.app, self.db].into_iter().flatten()
    }
}

impl From<PortTriple> for EnvironmentPorts {
    fn from(triple: PortTriple) -> Self {
        Self {
            api: Some(triple.api),
            app: Some(triple.app),
            db: Some(triple.db),
        }
    }
}

/// One ephemeral environment as persisted in `staging.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StagingEnvironmentRecord {
    pub slug: Slug,
    pub branch: String,
    pub driver: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub urls: Option<EnvironmentUrls>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ports: Option<EnvironmentPorts>,
    pub status: EnvironmentStatus,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub driver_meta: Map<String, Value>,
}

impl StagingEnvironmentRecord {
    /// A fresh record in `creating` state, stamped with `now`.
    pub fn new(slug: Slug, branch: impl Into<String>, driver: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            slug,
            branch: branch.into(),
            driver: driver.into(),
            created_at: now,
            updated_at: now,
            urls: None,
            ports: None,
            status: EnvironmentStatus::Creating,
            driver_meta: Map::new(),
        }
    }

    pub fn with_ports(mut self, ports: impl Into<EnvironmentPorts>) -> Self {
        self.ports = Some(ports.into());
        self
    }

    /// Bump `updated_at`. `created_at` is never touched after construction.
    pub fn touch(&mut self) {
        let now = Utc::now();
        // Clock skew must not make a record look updated before it existed.
        self.updated_at = if now < self.created_at {
            self.created_at
        } else {
            now
        };
    }

    /// Move to `next`, enforcing the lifecycle rules.
    pub fn transition(&mut self, next: EnvironmentStatus) -> Result<(), DomainError> {
        if !self.status.can_transition_to(next) {
            return Err(DomainError::InvalidTransition {
                slug: self.slug.to_string(),
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        self.touch();
        Ok(())
    }

    /// Ports held by this record (empty when none are reserved). The
    /// iterator owns a copy and does not borrow the record.
    pub fn assigned_ports(&self) -> impl Iterator<Item = u16> + use<> {
        self.ports.unwrap_or_default().assigned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> StagingEnvironmentRecord {
        StagingEnvironmentRecord::new(
            Slug::from_branch("feat-login").unwrap(),
            "feature/feat-login",
            "docker-compose",
        )
    }

    #[test]
    fn new_record_is_creating() {
        let rec = record();
        assert_eq!(rec.status, EnvironmentStatus::Creating);
        assert_eq!(rec.created_at, rec.updated_at);
    }

    #[test]
    fn creating_to_running_is_allowed() {
        let mut rec = record();
        rec.transition(EnvironmentStatus::Running).unwrap();
        assert_eq!(rec.status, EnvironmentStatus::Running);
        assert!(rec.updated_at >= rec.created_at);
    }

    #[test]
    fn error_cannot_jump_back_to_running() {
        let mut rec = record();
        rec.transition(EnvironmentStatus::Error).unwrap();
        let err = rec.transition(EnvironmentStatus::Running).unwrap_err();
        assert!(matches!(err, DomainError::InvalidTransition { .. }));
    }

    #[test]
    fn any_status_may_stop_or_redeploy() {
        for status in [
            EnvironmentStatus::Creating,
            EnvironmentStatus::Running,
            EnvironmentStatus::Error,
        ] {
            assert!(status.can_transition_to(EnvironmentStatus::Stopped));
            assert!(status.can_transition_to(EnvironmentStatus::Creating));
        }
    }

    #[test]
    fn serialises_with_camel_case_keys() {
        let rec = record().with_ports(PortTriple::starting_at(4001));
        let json = serde_json::to_value(&rec).unwrap();
        assert_eq!(json["slug"], "feat-login");
        assert_eq!(json["status"], "creating");
        assert_eq!(json["ports"]["db"], 4003);
        assert!(json.get("createdAt").is_some());
        assert!(json.get("driverMeta").is_none());
        assert!(json.get("urls").is_none());
    }

    #[test]
    fn parses_documented_example() {
        let json = r#"{
            "slug": "feat-login",
            "branch": "feature/feat-login",
            "driver": "docker-compose",
            "createdAt": "2026-02-21T10:00:00Z",
            "updatedAt": "2026-02-21T10:00:00Z",
            "urls": { "api": "http://localhost:4001", "app": "http://localhost:4002" },
            "ports": { "api": 4001, "app": 4002, "db": 4003 },
            "status": "running"
        }"#;
        let rec: StagingEnvironmentRecord = serde_json::from_str(json).unwrap();
        assert_eq!(rec.status, EnvironmentStatus::Running);
        assert_eq!(rec.assigned_ports().collect::<Vec<_>>(), vec![4001, 4002, 4003]);
        assert_eq!(
            rec.urls.unwrap().app.as_deref(),
            Some("http://localhost:4002")
        );
    }

    #[test]
    fn assigned_ports_do_not_borrow_the_record() {
        let ports = {
            let rec = StagingEnvironmentRecord::new(Slug::parse("a").unwrap(), "a", "memory")
                .with_ports(PortTriple::starting_at(4004));
            rec.assigned_ports()
        };
        assert_eq!(ports.collect::<Vec<_>>(), vec![4004, 4005, 4006]);

        let bare = StagingEnvironmentRecord::new(Slug::parse("b").unwrap(), "b", "memory");
        assert_eq!(bare.assigned_ports().count(), 0);
    }

    #[test]
    fn status_round_trips_through_str() {
        assert_eq!(
            "RUNNING".parse::<EnvironmentStatus>().unwrap(),
            EnvironmentStatus::Running
        );
        assert!("paused".parse::<EnvironmentStatus>().is_err());
    }
}
