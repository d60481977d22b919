//! Driven (output) ports - implemented by infrastructure.
//!
//! These traits define what the application needs from external systems.
//! The `staging-adapters` crate provides implementations.

pub mod driver;
pub mod state_store;

#[cfg(test)]
pub use driver::MockStagingDriver;
pub use driver::{
    Deployment, DiscoveredEnvironment, DriverContext, HealthReport, LogOptions, LogOutput,
    LogSink, PrerequisiteReport, ServiceHealth, ServiceStatus, StagingDriver,
};
pub use state_store::StateStore;
