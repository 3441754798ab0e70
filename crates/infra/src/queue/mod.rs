//! Background job queue: persistence, scheduling and the tenant-facing service.
//!
//! ## Components
//!
//! - `QueueStore`: queues and queue logs, with conditional status updates
//!   (in-memory or Postgres)
//! - `QueueOrchestrator`: the pending and processing polling cycles
//! - `ProgressNotifier`: tenant-scoped progress fan-out
//! - `QueueService`: create / inspect / list / reinitialize for one tenant

pub mod config;
pub mod in_memory;
pub mod notifier;
pub mod orchestrator;
pub mod postgres;
pub mod service;
pub mod store;
pub mod view;

pub use config::QueueConfig;
pub use in_memory::InMemoryQueueStore;
pub use notifier::{
    BroadcastProgressNotifier, InMemoryProgressNotifier, ProgressNotifier, ProgressUpdate, TenantProgress,
};
pub use orchestrator::{OrchestratorHandle, PassSummary, QueueOrchestrator};
pub use postgres::PostgresQueueStore;
pub use service::{CreateQueue, QueueService, QueueServiceError};
pub use store::{Page, PageRequest, QueueStore, QueueStoreError};
pub use view::{QueueLogView, QueueSummary, QueueView};
