//! Application layer for staging environments.
//!
//! This layer contains:
//! - **Services**: Use case orchestration (`StagingService`)
//! - **Ports**: Interface definitions (traits) for external dependencies
//! - **Registry**: Name-based driver lookup
//! - **Errors**: Application-specific error types
//!
//! The application layer coordinates the domain layer but contains no
//! business logic itself. Slug, lifecycle and allocation rules live in
//! `crate::domain`.

pub mod cancel;
pub mod error;
pub mod ports;
pub mod registry;
pub mod services;

pub use services::{ReconcileReport, StagingService};

// Re-export port traits (for adapter implementation)
pub use ports::{StagingDriver, StateStore};

pub use cancel::CancellationToken;
pub use error::ApplicationError;
pub use registry::DriverRegistry;
