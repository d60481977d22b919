// ============================================================================
// domain/error.rs - STAGING DOMAIN ERRORS
// ============================================================================

use thiserror::Error;

use crate::domain::EnvironmentStatus;

/// Root domain error type.
///
/// All errors are:
/// - Cloneable (so services can stash and re-raise them)
/// - Categorizable (for CLI display)
/// - Actionable (provides suggestions)
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DomainError {
    // ========================================================================
    // Validation Errors (400-level equivalent)
    // ========================================================================
    #[error("Branch '{branch}' cannot be turned into a slug: {reason}")]
    InvalidBranch { branch: String, reason: String },

    #[error("Invalid port range {start}-{end}: {reason}")]
    InvalidPortRange { start: u16, end: u16, reason: String },

    #[error("Invalid status transition for '{slug}': {from} -> {to}")]
    InvalidTransition {
        slug: String,
        from: EnvironmentStatus,
        to: EnvironmentStatus,
    },

    // ========================================================================
    // Resource Exhaustion
    // ========================================================================
    #[error("No free ports available in range {start}-{end}")]
    NoFreePorts { start: u16, end: u16 },

    // ========================================================================
    // Persisted Shape Violations
    // ========================================================================
    #[error("Unsupported staging state version {found} (supported: {supported})")]
    UnsupportedStateVersion { found: u32, supported: u32 },

    #[error("State entry '{key}' holds a record for slug '{slug}'")]
    SlugKeyMismatch { key: String, slug: String },

    /// A stored slug that `Slug::from_branch` would not produce.
    #[error("'{value}' is not a normalised slug (expected '{expected}')")]
    NonCanonicalSlug { value: String, expected: String },
}

impl DomainError {
    /// Get user-actionable suggestions for fixing this error.
    pub fn suggestions(&self) -> Vec<String> {
        match self {
            Self::InvalidBranch { branch, .. } => vec![
                format!("Branch name: '{}'", branch),
                "Branch names need at least one letter or digit".into(),
            ],
            Self::InvalidPortRange { .. } => vec![
                "Port ranges are inclusive and must satisfy start <= end <= 65535".into(),
                "Check `ports.start` / `ports.end` in .molecule/staging.toml".into(),
            ],
            Self::NoFreePorts { start, end } => vec![
                format!("Every port triple in {}-{} is taken", start, end),
                "Tear down unused environments: staging down <slug>".into(),
                "Or widen `ports.end` in .molecule/staging.toml".into(),
            ],
            Self::UnsupportedStateVersion { .. }
            | Self::SlugKeyMismatch { .. }
            | Self::NonCanonicalSlug { .. } => vec![
                "The staging state file was written by another tool or version".into(),
                "Inspect .molecule/staging.json before editing it by hand".into(),
            ],
            Self::InvalidTransition { .. } => vec!["Run `staging up <branch>` to redeploy".into()],
        }
    }

    /// Error category for CLI display styling.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidBranch { .. }
            | Self::InvalidPortRange { .. }
            | Self::InvalidTransition { .. } => ErrorCategory::Validation,
            Self::NoFreePorts { .. } => ErrorCategory::Exhausted,
            Self::UnsupportedStateVersion { .. }
            | Self::SlugKeyMismatch { .. }
            | Self::NonCanonicalSlug { .. } => ErrorCategory::Corruption,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Validation,
    Exhausted,
    Corruption,
}
