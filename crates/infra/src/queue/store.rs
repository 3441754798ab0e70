//! Queue persistence contract.

use async_trait::async_trait;
use serde::Serialize;

use payforge_core::{QueueId, QueueLogId, TenantId};
use payforge_jobs::{LogOutcome, NewQueueLog, Queue, QueueLog, QueueLogStatus, QueueStatus};

/// Queue store error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum QueueStoreError {
    #[error("storage error: {0}")]
    Storage(String),
    #[error("failed to decode stored row: {0}")]
    Decode(String),
}

/// Page/limit pair for tenant-facing listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageRequest {
    /// 1-based.
    pub page: u32,
    pub limit: u32,
}

impl PageRequest {
    pub const DEFAULT_PAGE: u32 = 1;
    pub const DEFAULT_LIMIT: u32 = 10;
    pub const MAX_LIMIT: u32 = 100;

    pub fn new(page: u32, limit: u32) -> Self {
        let page = if page == 0 { Self::DEFAULT_PAGE } else { page };
        let limit = match limit {
            0 => Self::DEFAULT_LIMIT,
            n => n.min(Self::MAX_LIMIT),
        };
        Self { page, limit }
    }

    /// Parse raw query-string values. Missing, unparseable or zero values fall
    /// back to the defaults; the limit is capped.
    pub fn parse(page: Option<&str>, limit: Option<&str>) -> Self {
        let parse = |raw: Option<&str>| raw.and_then(|s| s.trim().parse::<u32>().ok()).unwrap_or(0);
        Self::new(parse(page), parse(limit))
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.limit)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(Self::DEFAULT_PAGE, Self::DEFAULT_LIMIT)
    }
}

/// One page of a listing plus the total across all pages.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub limit: u32,
    pub total: u64,
}

/// Persistence for queues and their logs.
///
/// Every status change is conditional: the write only applies if the row is
/// still in the expected status, and the caller learns whether it applied
/// (`None` / `false` means the precondition no longer held).
#[async_trait]
pub trait QueueStore: Send + Sync {
    async fn insert_queue(&self, queue: Queue) -> Result<Queue, QueueStoreError>;

    /// Tenant-scoped lookup; a queue of another tenant is reported as absent.
    async fn get_queue(&self, tenant_id: TenantId, id: QueueId) -> Result<Option<Queue>, QueueStoreError>;

    /// Tenant-scoped listing, newest first.
    async fn list_queues(&self, tenant_id: TenantId, page: PageRequest) -> Result<Page<Queue>, QueueStoreError>;

    /// All queues in `status` across tenants, in creation order.
    async fn queues_by_status(&self, status: QueueStatus) -> Result<Vec<Queue>, QueueStoreError>;

    /// `from → to`, recording `error_status`.
    async fn transition_queue(
        &self,
        id: QueueId,
        from: QueueStatus,
        to: QueueStatus,
        error_status: Option<String>,
    ) -> Result<Option<Queue>, QueueStoreError>;

    /// Zero the counters of a PENDING queue ahead of initialization.
    async fn reset_progress(&self, id: QueueId) -> Result<bool, QueueStoreError>;

    /// End of initialization, applied atomically: replace the queue's logs with
    /// `logs`, set `total_count = logs.len()`, zero `current_count`, and move
    /// PENDING → PROCESSING. Nothing is written unless the queue is PENDING.
    async fn start_processing(&self, id: QueueId, logs: Vec<NewQueueLog>) -> Result<Option<Queue>, QueueStoreError>;

    /// Unconditionally set the status (operator override). Setting PENDING
    /// clears `error_status`. Returns the snapshot read before the update.
    async fn force_status(
        &self,
        tenant_id: TenantId,
        id: QueueId,
        status: QueueStatus,
    ) -> Result<Option<Queue>, QueueStoreError>;

    /// `current_count = min(current_count + processed, total_count)` on a
    /// queue that is PROCESSING in `run`, recomputing the percentage. Units
    /// settled for an earlier run never count toward a later one.
    async fn advance_progress(&self, id: QueueId, run: u32, processed: u64) -> Result<Option<Queue>, QueueStoreError>;

    /// PROCESSING → `status` (COMPLETED or INCOMPLETE), only while the queue
    /// is still in `run`.
    async fn finish_run(&self, id: QueueId, run: u32, status: QueueStatus) -> Result<Option<Queue>, QueueStoreError>;

    /// Up to `limit` PENDING logs of the queue, in creation order.
    async fn pending_logs(&self, queue_id: QueueId, limit: usize) -> Result<Vec<QueueLog>, QueueStoreError>;

    /// PENDING → PROCESSING for one log.
    async fn claim_log(&self, id: QueueLogId) -> Result<Option<QueueLog>, QueueStoreError>;

    /// PROCESSING → COMPLETED | FAILED for one log.
    async fn finish_log(&self, id: QueueLogId, outcome: LogOutcome) -> Result<bool, QueueStoreError>;

    async fn count_logs(&self, queue_id: QueueId, status: QueueLogStatus) -> Result<u64, QueueStoreError>;

    /// Every log of the queue, in creation order.
    async fn list_logs(&self, queue_id: QueueId) -> Result<Vec<QueueLog>, QueueStoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_request_defaults_and_caps() {
        assert_eq!(PageRequest::parse(None, None), PageRequest { page: 1, limit: 10 });
        assert_eq!(
            PageRequest::parse(Some("abc"), Some("-3")),
            PageRequest { page: 1, limit: 10 }
        );
        assert_eq!(
            PageRequest::parse(Some("0"), Some("0")),
            PageRequest { page: 1, limit: 10 }
        );
        assert_eq!(
            PageRequest::parse(Some(" 3 "), Some("500")),
            PageRequest { page: 3, limit: 100 }
        );
        assert_eq!(PageRequest::new(3, 20).offset(), 40);
    }
}
