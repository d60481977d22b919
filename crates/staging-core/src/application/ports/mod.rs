//! Application ports (traits) for external dependencies.
//!
//! In hexagonal architecture, ports define interfaces that the application
//! needs from the outside world. Adapters in `staging-adapters` implement these.
//!
//! ## Port Types
//!
//! - **Driven (Output) Ports**: Called by application, implemented by infrastructure
//!   - `StateStore`: durable environment registry
//!   - `StagingDriver`: infrastructure lifecycle backend
//!
//! - **Driving (Input) Ports**: Called by external world, implemented by application
//!   - (`StagingService`, invoked by the CLI layer)

pub mod output;

pub use output::{
    Deployment, DiscoveredEnvironment, DriverContext, HealthReport, LogOptions, LogOutput,
    LogSink, PrerequisiteReport, ServiceHealth, ServiceStatus, StagingDriver, StateStore,
};
