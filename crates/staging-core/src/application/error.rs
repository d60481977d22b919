//! Application layer errors.
//!
//! These errors represent failures in orchestration and at port boundaries,
//! not business rules. Business rule violations are `DomainError`.

use std::path::PathBuf;
use thiserror::Error;

use crate::error::ErrorCategory;

/// Errors that occur while orchestrating environments.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ApplicationError {
    /// The state file exists but cannot be trusted.
    #[error("Staging state at {path} is corrupted: {reason}")]
    StateCorrupted { path: PathBuf, reason: String },

    /// Reading or writing the state file failed.
    #[error("Staging state I/O error at {path}: {reason}")]
    StateIo { path: PathBuf, reason: String },

    /// The advisory lock around the state file could not be taken.
    #[error("Could not lock staging state at {path}: {reason}")]
    LockFailed { path: PathBuf, reason: String },

    /// In-process store lock poisoned.
    #[error("State store lock poisoned")]
    StoreLockError,

    #[error("Environment '{slug}' not found")]
    EnvironmentNotFound { slug: String },

    #[error("Unknown driver '{name}'")]
    UnknownDriver { name: String, available: Vec<String> },

    #[error("Driver '{driver}' is missing prerequisites: {}", .missing.join(", "))]
    PrerequisitesMissing { driver: String, missing: Vec<String> },

    /// The driver's own lifecycle call failed. Propagated unchanged; no retries.
    #[error("Driver '{driver}' failed during {operation}: {reason}")]
    DriverFailed {
        driver: String,
        operation: &'static str,
        reason: String,
    },
}

impl ApplicationError {
    /// Shorthand used by driver implementations.
    pub fn driver(
        driver: impl Into<String>,
        operation: &'static str,
        reason: impl Into<String>,
    ) -> Self {
        Self::DriverFailed {
            driver: driver.into(),
            operation,
            reason: reason.into(),
        }
    }

    /// Get user-actionable suggestions.
    pub fn suggestions(&self) -> Vec<String> {
        match self {
            Self::StateCorrupted { path, .. } => vec![
                format!("Could not parse: {}", path.display()),
                "The file tracks live infrastructure, so it was not overwritten".into(),
                "Fix the JSON by hand, or move it aside once every environment is torn down"
                    .into(),
            ],
            Self::StateIo { path, .. } => vec![
                format!("Failed to access: {}", path.display()),
                "Check that you have write permissions".into(),
            ],
            Self::LockFailed { .. } => vec![
                "Another staging command may be running for this project".into(),
                "Try again in a moment".into(),
            ],
            Self::EnvironmentNotFound { slug } => vec![
                format!("No tracked environment named '{}'", slug),
                "Try: staging list".into(),
            ],
            Self::UnknownDriver { available, .. } => {
                let mut out = vec!["Available drivers:".to_string()];
                out.extend(available.iter().map(|d| format!("  • {d}")));
                out.push("Set `driver` in .molecule/staging.toml or pass --driver".into());
                out
            }
            Self::PrerequisitesMissing { missing, .. } => {
                let mut out = vec!["Install the following and retry:".to_string()];
                out.extend(missing.iter().map(|m| format!("  • {m}")));
                out
            }
            Self::DriverFailed { .. } => vec![
                "Check the driver output above for details".into(),
                "Re-run with -vv for debug logs".into(),
            ],
            _ => vec!["Check the error details above".into()],
        }
    }

    /// Get error category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::StateCorrupted { .. } => ErrorCategory::Configuration,
            Self::StateIo { .. } | Self::StoreLockError => ErrorCategory::Internal,
            Self::LockFailed { .. } => ErrorCategory::Internal,
            Self::EnvironmentNotFound { .. } => ErrorCategory::NotFound,
            Self::UnknownDriver { .. } => ErrorCategory::Configuration,
            Self::PrerequisitesMissing { .. } => ErrorCategory::Prerequisite,
            Self::DriverFailed { .. } => ErrorCategory::Driver,
        }
    }
}
