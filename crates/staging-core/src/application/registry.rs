//! Driver lookup by name.

use std::collections::BTreeMap;

use tracing::debug;

use crate::{
    application::{ApplicationError, ports::StagingDriver},
    error::StagingResult,
};

/// Name -> driver map, populated at startup with whatever drivers the
/// binary links in.
#[derive(Default)]
pub struct DriverRegistry {
    drivers: BTreeMap<String, Box<dyn StagingDriver>>,
}

impl DriverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `driver` under its own name, replacing any previous entry.
    pub fn register(&mut self, driver: Box<dyn StagingDriver>) -> &mut Self {
        let name = driver.name().to_string();
        debug!(driver = %name, "Registered staging driver");
        self.drivers.insert(name, driver);
        self
    }

    /// Builder-style [`register`](Self::register).
    pub fn with(mut self, driver: Box<dyn StagingDriver>) -> Self {
        self.register(driver);
        self
    }

    pub fn get(&self, name: &str) -> StagingResult<&dyn StagingDriver> {
        self.drivers
            .get(name)
            .map(|d| &**d)
            .ok_or_else(|| {
                ApplicationError::UnknownDriver {
                    name: name.to_string(),
                    available: self.names(),
                }
                .into()
            })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.drivers.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        self.drivers.keys().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn StagingDriver> {
        self.drivers.values().map(|d| &**d)
    }

    pub fn len(&self) -> usize {
        self.drivers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.drivers.is_empty()
    }
}

impl std::fmt::Debug for DriverRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DriverRegistry")
            .field("drivers", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::output::MockStagingDriver;
    use crate::error::StagingError;

    fn mock(name: &'static str) -> Box<dyn StagingDriver> {
        let mut driver = MockStagingDriver::new();
        driver.expect_name().return_const(name);
        Box::new(driver)
    }

    #[test]
    fn looks_up_by_name() {
        let registry = DriverRegistry::new()
            .with(mock("docker-compose"))
            .with(mock("fly"));
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.get("fly").unwrap().name(), "fly");
        assert_eq!(registry.names(), vec!["docker-compose", "fly"]);
    }

    #[test]
    fn unknown_driver_lists_alternatives() {
        let registry = DriverRegistry::new().with(mock("docker-compose"));
        let err = registry.get("nomad").err().unwrap();
        match err {
            StagingError::Application(ApplicationError::UnknownDriver { name, available }) => {
                assert_eq!(name, "nomad");
                assert_eq!(available, vec!["docker-compose".to_string()]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn re_registering_replaces() {
        let mut registry = DriverRegistry::new();
        registry.register(mock("docker-compose"));
        registry.register(mock("docker-compose"));
        assert_eq!(registry.len(), 1);
    }
}
