//! Progress publication.

use std::sync::Mutex;

use serde::Serialize;
use tokio::sync::broadcast;

use payforge_core::{QueueId, TenantId};
use payforge_jobs::{Queue, QueueStatus};

/// Payload pushed to dashboards after a queue makes progress.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressUpdate {
    pub queue_id: QueueId,
    /// The queue's `dateRangeId` setting.
    pub context_id: String,
    pub current_count: u64,
    pub total_count: u64,
    pub status: QueueStatus,
    pub complete_percentage: f64,
}

impl ProgressUpdate {
    /// `None` for queues whose settings carry no notification context.
    pub fn for_queue(queue: &Queue) -> Option<Self> {
        Some(Self {
            queue_id: queue.id,
            context_id: queue.context_id()?,
            current_count: queue.current_count,
            total_count: queue.total_count,
            status: queue.status,
            complete_percentage: queue.complete_percentage,
        })
    }
}

/// A progress update addressed to one tenant.
#[derive(Debug, Clone, Serialize)]
pub struct TenantProgress {
    pub tenant_id: TenantId,
    pub update: ProgressUpdate,
}

/// One-way, best-effort publish. Implementations must not block or fail the caller.
pub trait ProgressNotifier: Send + Sync {
    fn publish(&self, tenant_id: TenantId, update: ProgressUpdate);
}

/// Lossy in-process fan-out; subscribers filter by tenant.
#[derive(Debug, Clone)]
pub struct BroadcastProgressNotifier {
    tx: broadcast::Sender<TenantProgress>,
}

impl BroadcastProgressNotifier {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TenantProgress> {
        self.tx.subscribe()
    }
}

impl Default for BroadcastProgressNotifier {
    fn default() -> Self {
        Self::new(256)
    }
}

impl ProgressNotifier for BroadcastProgressNotifier {
    fn publish(&self, tenant_id: TenantId, update: ProgressUpdate) {
        // No subscribers is not an error.
        let _ = self.tx.send(TenantProgress { tenant_id, update });
    }
}

/// Records every update; for tests.
#[derive(Debug, Default)]
pub struct InMemoryProgressNotifier {
    published: Mutex<Vec<TenantProgress>>,
}

impl InMemoryProgressNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn published(&self) -> Vec<TenantProgress> {
        self.published
            .lock()
            .map(|p| p.clone())
            .unwrap_or_default()
    }
}

impl ProgressNotifier for InMemoryProgressNotifier {
    fn publish(&self, tenant_id: TenantId, update: ProgressUpdate) {
        if let Ok(mut published) = self.published.lock() {
            published.push(TenantProgress { tenant_id, update });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use payforge_jobs::{JobType, JsonMap};
    use serde_json::json;

    #[test]
    fn queues_without_context_produce_no_update() {
        let queue = Queue::new(TenantId::new(), "Import", JobType::EmployeeImportation, JsonMap::new());
        assert!(ProgressUpdate::for_queue(&queue).is_none());
    }

    #[tokio::test]
    async fn broadcast_delivers_camel_case_payload() {
        let notifier = BroadcastProgressNotifier::default();
        let mut rx = notifier.subscribe();

        let mut settings = JsonMap::new();
        settings.insert("dateRangeId".into(), json!("dr-1"));
        let mut queue = Queue::new(TenantId::new(), "Payroll", JobType::PayrollProcessing, settings);
        queue.mark_initialized(4);
        queue.advance(1);

        let update = ProgressUpdate::for_queue(&queue).unwrap();
        notifier.publish(queue.tenant_id, update);

        let received = rx.recv().await.unwrap();
        assert_eq!(received.tenant_id, queue.tenant_id);
        let json = serde_json::to_value(&received.update).unwrap();
        assert_eq!(json["contextId"], "dr-1");
        assert_eq!(json["currentCount"], 1);
        assert_eq!(json["completePercentage"], 0.25);
        assert_eq!(json["status"], "PROCESSING");
    }
}
