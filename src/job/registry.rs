//! Registry mapping job names to handler factories.
//!
//! Workers resolve the function name of each assigned job through this map
//! to get a fresh [`Job`] instance. The capability check happens at
//! registration: a factory can only be registered for types implementing
//! [`Job`], so resolution can never produce an instance that does not
//! satisfy the job-handling capability.

use std::collections::HashMap;

use serde_json::Value;

use super::Job;
use crate::error::{GearmanError, Result};

/// Factory producing one job instance from per-worker init parameters.
pub type JobFactory = Box<dyn Fn(Value) -> Box<dyn Job> + Send + Sync>;

/// Map of job name -> factory.
#[derive(Default)]
pub struct JobRegistry {
    map: HashMap<String, JobFactory>,
}

impl JobRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory under a job name.
    ///
    /// Registering the same name twice replaces the earlier factory.
    pub fn register<J, F>(&mut self, name: &str, factory: F)
    where
        J: Job + 'static,
        F: Fn(Value) -> J + Send + Sync + 'static,
    {
        self.map.insert(
            name.to_string(),
            Box::new(move |init| Box::new(factory(init)) as Box<dyn Job>),
        );
    }

    /// Check whether a name has a registered factory.
    pub fn contains(&self, name: &str) -> bool {
        self.map.contains_key(name)
    }

    /// Registered job names, for ability announcement (`can_do`).
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.map.keys().map(|s| s.as_str())
    }

    /// Resolve a job name to its factory.
    ///
    /// # Errors
    ///
    /// [`GearmanError::UnknownJob`] when the name has no registered factory.
    pub fn resolve(&self, name: &str) -> Result<&JobFactory> {
        self.map
            .get(name)
            .ok_or_else(|| GearmanError::UnknownJob(name.to_string()))
    }

    /// Create a job instance for the given name.
    pub fn instantiate(&self, name: &str, init_params: Value) -> Result<Box<dyn Job>> {
        Ok(self.resolve(name)?(init_params))
    }
}
