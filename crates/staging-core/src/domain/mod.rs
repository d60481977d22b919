// ============================================================================
//  CLEAN MODULE BOUNDARIES
// ============================================================================

//! Core domain layer for staging environments.
//!
//! Pure logic only. Reading and writing `staging.json`, talking to docker or
//! a PaaS, and printing are handled via ports (traits) defined in the
//! application layer.
//!
//! - **No I/O**: no filesystem, network, or process calls
//! - **Plain values**: `StagingState` is rebuilt on every command
//! - **Rich domain model**: slug rules, lifecycle rules and allocation live here
pub mod allocation;
pub mod config;
pub mod environment;
pub mod error;
pub mod slug;
pub mod state;

pub use allocation::{PortRange, PortTriple, allocate_ports};
pub use config::{DEFAULT_DRIVER, StagingConfig};
pub use environment::{
    EnvironmentPorts, EnvironmentStatus, EnvironmentUrls, StagingEnvironmentRecord,
};
pub use error::{DomainError, ErrorCategory};
pub use slug::{MAX_SLUG_LEN, Slug};
pub use state::{STATE_VERSION, StagingState};
