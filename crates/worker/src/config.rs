use serde::Deserialize;

/// Settings for a [Worker](crate::Worker).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// The name given to the worker thread. This shows up in debuggers and panic messages.
    pub name: String,
    /// The maximum number of tasks waiting in the queue. Leave this as `None` for an unbounded
    /// queue. When the queue is full, submitting a task blocks until there is room.
    pub queue_capacity: Option<usize>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            name: "jobweave-worker".to_string(),
            queue_capacity: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserialize_partial() {
        let config: WorkerConfig = serde_json::from_str(r#"{ "queue_capacity": 4 }"#).unwrap();
        assert_eq!(config.name, "jobweave-worker");
        assert_eq!(config.queue_capacity, Some(4));
    }

    #[test]
    fn deserialize_empty() {
        let config: WorkerConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.queue_capacity, None);
    }
}
