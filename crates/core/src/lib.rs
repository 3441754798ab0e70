//! `payforge-core`: shared identifiers and error primitives.
//!
//! This crate has no infrastructure concerns: it is depended on by the job
//! contracts, the stores and the HTTP layer alike.

pub mod error;
pub mod id;

pub use error::DomainError;
pub use id::{FileId, QueueId, QueueLogId, TenantId};
