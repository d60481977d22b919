//! Application services - orchestrate use cases.
//!
//! Services coordinate the domain layer and ports to accomplish
//! high-level use cases like "deploy this branch" or "tear it down".

pub mod staging_service;

pub use staging_service::{ReconcileReport, StagingService};
