//! Staging driver adapters.

pub mod command;
pub mod docker_compose;
pub mod memory;

pub use command::{CommandOutput, CommandRunner, CommandSpec, SystemRunner};
pub use docker_compose::DockerComposeDriver;
pub use memory::MemoryDriver;

use staging_core::application::DriverRegistry;

/// Every driver this build ships with, keyed by name.
pub fn builtin_registry() -> DriverRegistry {
    DriverRegistry::new()
        .with(Box::new(DockerComposeDriver::new()))
        .with(Box::new(MemoryDriver::new()))
}
