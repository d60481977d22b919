//! Infrastructure adapters for staging environments.
//!
//! This crate implements the ports defined in `staging-core::application::ports`.
//! It contains all external dependencies and I/O operations.

pub mod drivers;
pub mod state_store;

// Re-export commonly used adapters
pub use drivers::{DockerComposeDriver, MemoryDriver, builtin_registry};
pub use state_store::{InMemoryStateStore, JsonFileStateStore};
