use std::{fmt::Debug, sync::Arc};

use ahash::HashMap;
use tracing::{event, Level};

use crate::Job;

/// Builds a job, given the name to give it.
pub type TaskFactory = Arc<dyn Fn(&str) -> Job + Send + Sync>;

/// A table of job factories keyed by task type, filled in once at startup so that jobs can be
/// created from a key found in configuration or a request.
#[derive(Clone, Default)]
pub struct TaskRegistry {
    factories: Arc<HashMap<String, TaskFactory>>,
}

impl Debug for TaskRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskRegistry")
            .field("keys", &self.keys())
            .finish()
    }
}

impl TaskRegistry {
    pub fn builder() -> TaskRegistryBuilder {
        TaskRegistryBuilder::default()
    }

    /// Create a new Waiting job from the factory registered under `key`.
    pub fn create(&self, key: &str, name: &str) -> Option<Job> {
        let factory = self.factories.get(key)?;
        Some(factory(name))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.factories.contains_key(key)
    }

    /// The registered keys, sorted.
    pub fn keys(&self) -> Vec<&str> {
        let mut keys = self.factories.keys().map(String::as_str).collect::<Vec<_>>();
        keys.sort_unstable();
        keys
    }
}

#[derive(Default)]
pub struct TaskRegistryBuilder {
    factories: HashMap<String, TaskFactory>,
}

impl TaskRegistryBuilder {
    /// Register a factory. Registering a key twice replaces the earlier factory.
    pub fn register(
        mut self,
        key: impl Into<String>,
        factory: impl Fn(&str) -> Job + Send + Sync + 'static,
    ) -> Self {
        let key = key.into();
        if self.factories.insert(key.clone(), Arc::new(factory)).is_some() {
            event!(Level::WARN, %key, "Replacing task factory registered under the same key");
        }
        self
    }

    pub fn build(self) -> TaskRegistry {
        TaskRegistry {
            factories: Arc::new(self.factories),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::JobState;

    fn registry() -> TaskRegistry {
        TaskRegistry::builder()
            .register("import", |name| {
                Job::new(name, |job| {
                    job.set_total_work_units(3);
                    job.done();
                })
            })
            .register("noop", |name| Job::new(name, |_| {}))
            .build()
    }

    #[test]
    fn create_registered_job() {
        let registry = registry();
        assert!(registry.contains("import"));
        assert_eq!(registry.keys(), vec!["import", "noop"]);

        let job = registry.create("import", "Import series").unwrap();
        assert_eq!(job.name(), "Import series");
        assert_eq!(job.state(), JobState::Waiting);

        job.run();
        assert_eq!(job.state(), JobState::Finished);
        assert_eq!(job.done_work_units(), 3);

        let other = registry.create("import", "Import series").unwrap();
        assert_ne!(other.id(), job.id());
        assert_eq!(other.state(), JobState::Waiting);
    }

    #[test]
    fn unknown_key() {
        let registry = registry();
        assert!(!registry.contains("export"));
        assert!(registry.create("export", "Export").is_none());
    }

    #[test]
    fn later_registration_wins() {
        let registry = TaskRegistry::builder()
            .register("job", |name| Job::new(name, |job| job.log("first")))
            .register("job", |name| Job::new(name, |job| job.log("second")))
            .build();

        let job = registry.create("job", "Job").unwrap();
        job.run();
        assert_eq!(job.logs(), vec!["second".to_string()]);
    }
}
