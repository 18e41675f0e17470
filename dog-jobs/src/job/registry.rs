use std::collections::HashMap;
use std::sync::Arc;

use super::JobHandler;

/// Registry mapping job types to their handlers
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn JobHandler>>,
}

impl HandlerRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Register the handler for a job type, replacing any previous one.
    ///
    /// Returns true if an existing handler was replaced.
    pub fn register(&mut self, job_type: impl Into<String>, handler: Arc<dyn JobHandler>) -> bool {
        self.handlers.insert(job_type.into(), handler).is_some()
    }

    /// Get the handler for a job type
    pub fn get(&self, job_type: &str) -> Option<Arc<dyn JobHandler>> {
        self.handlers.get(job_type).cloned()
    }

    /// Check if a job type is registered
    pub fn is_registered(&self, job_type: &str) -> bool {
        self.handlers.contains_key(job_type)
    }

    /// Get all registered job types, sorted
    pub fn registered_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.handlers.keys().cloned().collect();
        types.sort();
        types
    }
}
