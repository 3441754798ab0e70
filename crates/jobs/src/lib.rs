//! `payforge-jobs`
//!
//! **Responsibility:** the background queue's domain model and handler contract.
//!
//! This crate is storage- and runtime-agnostic:
//! - [`Queue`] / [`QueueLog`] records and their status machines
//! - the two-method [`JobHandler`] contract every job type implements
//! - the startup-built [`HandlerRegistry`]
//! - the shipped handlers, each a thin adapter over a business collaborator
//!
//! Persistence and scheduling live in `payforge-infra`.

pub mod error;
pub mod handler;
pub mod handlers;
pub mod registry;
pub mod types;

pub use error::JobError;
pub use handler::JobHandler;
pub use registry::{HandlerRegistry, HandlerRegistryBuilder, RegistryError};
pub use types::{
    complete_percentage, JobType, JsonMap, LogOutcome, NewQueueLog, Queue, QueueLog, QueueLogStatus,
    QueueStatus, CONTEXT_ID_KEY, FILE_ID_KEY,
};
