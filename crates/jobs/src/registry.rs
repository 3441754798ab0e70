use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;

use crate::handler::JobHandler;
use crate::types::JobType;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("unsupported queue type: {0}")]
    UnsupportedType(JobType),
}

/// Immutable `JobType → handler` table, shared by the orchestrator and the
/// queue service.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: HashMap<JobType, Arc<dyn JobHandler>>,
}

impl HandlerRegistry {
    pub fn builder() -> HandlerRegistryBuilder {
        HandlerRegistryBuilder::default()
    }

    pub fn get_handler(&self, job_type: JobType) -> Result<Arc<dyn JobHandler>, RegistryError> {
        self.handlers
            .get(&job_type)
            .cloned()
            .ok_or(RegistryError::UnsupportedType(job_type))
    }

    pub fn supports(&self, job_type: JobType) -> bool {
        self.handlers.contains_key(&job_type)
    }

    /// Registered types, in declaration order of [`JobType::ALL`].
    pub fn registered_types(&self) -> Vec<JobType> {
        JobType::ALL
            .into_iter()
            .filter(|t| self.supports(*t))
            .collect()
    }
}

impl core::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("types", &self.registered_types())
            .finish()
    }
}

#[derive(Default)]
pub struct HandlerRegistryBuilder {
    handlers: HashMap<JobType, Arc<dyn JobHandler>>,
}

impl HandlerRegistryBuilder {
    /// Register a handler. A later registration for the same type replaces the earlier one.
    pub fn register<H>(self, job_type: JobType, handler: H) -> Self
    where
        H: JobHandler + 'static,
    {
        self.register_arc(job_type, Arc::new(handler))
    }

    pub fn register_arc(mut self, job_type: JobType, handler: Arc<dyn JobHandler>) -> Self {
        self.handlers.insert(job_type, handler);
        self
    }

    pub fn build(self) -> HandlerRegistry {
        HandlerRegistry {
            handlers: self.handlers,
        }
    }
}
