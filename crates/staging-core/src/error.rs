//! Unified error handling for the staging core.
//!
//! This module provides a unified error type that wraps domain and application
//! errors, with rich context and user-actionable suggestions.

use thiserror::Error;

use crate::application::ApplicationError;
use crate::domain::DomainError;

/// Root error type for staging core operations.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum StagingError {
    /// Errors from the domain layer (business rule violations).
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// Errors from the application layer (orchestration and port failures).
    #[error(transparent)]
    Application(#[from] ApplicationError),

    /// Configuration or setup errors.
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Unexpected internal errors (bugs).
    #[error("Internal error: {message}. This is a bug, please report it.")]
    Internal { message: String },
}

impl StagingError {
    /// Get user-actionable suggestions for fixing this error.
    pub fn suggestions(&self) -> Vec<String> {
        match self {
            Self::Domain(e) => e.suggestions(),
            Self::Application(e) => e.suggestions(),
            Self::Configuration { message } => vec![
                format!("Configuration issue: {}", message),
                "Check .molecule/staging.toml and MOLECULE_STAGING_* variables".into(),
            ],
            Self::Internal { .. } => vec!["This appears to be a bug, please report it".into()],
        }
    }

    /// Get error category for display/styling purposes.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Domain(e) => match e.category() {
                crate::domain::ErrorCategory::Validation => ErrorCategory::Validation,
                crate::domain::ErrorCategory::Exhausted => ErrorCategory::Exhausted,
                crate::domain::ErrorCategory::Corruption => ErrorCategory::Configuration,
            },
            Self::Application(e) => e.category(),
            Self::Configuration { .. } => ErrorCategory::Configuration,
            Self::Internal { .. } => ErrorCategory::Internal,
        }
    }

    /// `true` for the "unknown slug" family.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::Application(ApplicationError::EnvironmentNotFound { .. })
        )
    }
}

/// Error categories for UI display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Validation,
    NotFound,
    /// A configured resource pool (port range) ran dry.
    Exhausted,
    Configuration,
    /// Local tooling a driver needs is missing.
    Prerequisite,
    /// Infrastructure call failed inside a driver.
    Driver,
    Internal,
}

/// Convenient result type alias.
pub type StagingResult<T> = Result<T, StagingError>;
