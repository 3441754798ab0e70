//! Infrastructure layer: queue persistence and scheduling, file registry,
//! and the in-process HR collaborators used by the shipped handlers.

pub mod files;
pub mod queue;
pub mod workforce;
