//! Staging Core - Hexagonal Architecture Implementation
//!
//! This crate provides the domain and application layers for the ephemeral
//! staging orchestrator: one environment per git branch, deployed through a
//! pluggable driver and tracked in a small JSON registry.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │           staging-cli (CLI)             │
//! │     (Implements Driving Ports)          │
//! └──────────────────┬──────────────────────┘
//!                    │ calls
//!                    ▼
//! ┌─────────────────────────────────────────┐
//! │         Application Services            │
//! │   (StagingService, DriverRegistry)      │
//! │         Orchestrates Use Cases          │
//! └──────────────────┬──────────────────────┘
//!                    │ uses
//!                    ▼
//! ┌─────────────────────────────────────────┐
//! │      Application Ports (Traits)         │
//! │   (Driven: StateStore, StagingDriver)   │
//! └──────────────────┬──────────────────────┘
//!                    │ implemented by
//!                    ▼
//! ┌─────────────────────────────────────────┐
//! │    staging-adapters (Infrastructure)    │
//! │ (JsonFileStateStore, DockerCompose...)  │
//! └─────────────────────────────────────────┘
//!                    │
//!                    ▼
//! ┌─────────────────────────────────────────┐
//! │         Domain Layer (Pure Logic)       │
//! │   (Slug, Record, State, Allocation)     │
//! │         No External Dependencies        │
//! └─────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use staging_core::{
//!     application::{DriverRegistry, StagingService, ports::DriverContext},
//!     domain::StagingConfig,
//! };
//!
//! // Adapters come from staging-adapters
//! let context = DriverContext::new(".", StagingConfig::default());
//! let service = StagingService::new(store, registry, context);
//!
//! let record = service.up("feature/login", None).unwrap();
//! println!("{} is {}", record.slug, record.status);
//! ```

pub mod domain;

pub mod application;

pub mod error;

// Public API - what external crates should use
pub mod prelude {
    pub use crate::application::{
        ApplicationError, CancellationToken, DriverRegistry, ReconcileReport, StagingService,
        ports::{
            Deployment, DiscoveredEnvironment, DriverContext, HealthReport, LogOptions,
            LogOutput, LogSink, PrerequisiteReport, ServiceHealth, ServiceStatus, StagingDriver,
            StateStore,
        },
    };
    pub use crate::domain::{
        EnvironmentPorts, EnvironmentStatus, EnvironmentUrls, PortRange, PortTriple, Slug,
        StagingConfig, StagingEnvironmentRecord, StagingState,
    };
    pub use crate::error::{ErrorCategory, StagingError, StagingResult};
}

// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
