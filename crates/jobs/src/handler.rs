use async_trait::async_trait;

use crate::error::JobError;
use crate::types::{NewQueueLog, Queue, QueueLog};

/// Per-job-type behavior plugged into the orchestrator.
///
/// `initialize` runs once per run, while the queue is PENDING, and enumerates
/// every unit of work. The returned list fully replaces any logs left from a
/// previous run and its length becomes the queue's `total_count`.
///
/// `process_one` runs for each PENDING log after it has been claimed. Returning
/// `Ok` marks the log COMPLETED; returning `Err` marks it FAILED with the
/// error detail. Either way the unit counts towards progress.
///
/// Implementations must be safe to call concurrently for different logs of the
/// same queue.
#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn initialize(&self, queue: &Queue) -> Result<Vec<NewQueueLog>, JobError>;

    async fn process_one(&self, queue: &Queue, log: &QueueLog) -> Result<(), JobError>;
}
