//! In-memory queue store for tests/dev.

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::Utc;

use payforge_core::{QueueId, QueueLogId, TenantId};
use payforge_jobs::{LogOutcome, NewQueueLog, Queue, QueueLog, QueueLogStatus, QueueStatus};

use super::store::{Page, PageRequest, QueueStore, QueueStoreError};

#[derive(Debug, Default)]
struct State {
    /// Insertion order is creation order.
    queues: Vec<Queue>,
    logs: Vec<QueueLog>,
}

impl State {
    fn queue_mut(&mut self, id: QueueId) -> Option<&mut Queue> {
        self.queues.iter_mut().find(|q| q.id == id)
    }

    fn log_mut(&mut self, id: QueueLogId) -> Option<&mut QueueLog> {
        self.logs.iter_mut().find(|l| l.id == id)
    }
}

/// Queue store backed by two vectors under one lock, so every conditional
/// update is atomic with respect to the others.
#[derive(Debug, Default)]
pub struct InMemoryQueueStore {
    state: RwLock<State>,
}

impl InMemoryQueueStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, State>, QueueStoreError> {
        self.state
            .read()
            .map_err(|_| QueueStoreError::Storage("queue store lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, State>, QueueStoreError> {
        self.state
            .write()
            .map_err(|_| QueueStoreError::Storage("queue store lock poisoned".to_string()))
    }
}

#[async_trait]
impl QueueStore for InMemoryQueueStore {
    async fn insert_queue(&self, queue: Queue) -> Result<Queue, QueueStoreError> {
        let mut state = self.write()?;
        if state.queues.iter().any(|q| q.id == queue.id) {
            return Err(QueueStoreError::Storage(format!("queue already exists: {}", queue.id)));
        }
        state.queues.push(queue.clone());
        Ok(queue)
    }

    async fn get_queue(&self, tenant_id: TenantId, id: QueueId) -> Result<Option<Queue>, QueueStoreError> {
        let state = self.read()?;
        Ok(state
            .queues
            .iter()
            .find(|q| q.id == id && q.tenant_id == tenant_id)
            .cloned())
    }

    async fn list_queues(&self, tenant_id: TenantId, page: PageRequest) -> Result<Page<Queue>, QueueStoreError> {
        let state = self.read()?;
        let owned: Vec<&Queue> = state.queues.iter().rev().filter(|q| q.tenant_id == tenant_id).collect();
        let items = owned
            .iter()
            .skip(page.offset() as usize)
            .take(page.limit as usize)
            .map(|q| (*q).clone())
            .collect();
        Ok(Page {
            items,
            page: page.page,
            limit: page.limit,
            total: owned.len() as u64,
        })
    }

    async fn queues_by_status(&self, status: QueueStatus) -> Result<Vec<Queue>, QueueStoreError> {
        let state = self.read()?;
        Ok(state.queues.iter().filter(|q| q.status == status).cloned().collect())
    }

    async fn transition_queue(
        &self,
        id: QueueId,
        from: QueueStatus,
        to: QueueStatus,
        error_status: Option<String>,
    ) -> Result<Option<Queue>, QueueStoreError> {
        let mut state = self.write()?;
        match state.queue_mut(id) {
            Some(queue) if queue.status == from => {
                queue.set_status(to, error_status);
                Ok(Some(queue.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn reset_progress(&self, id: QueueId) -> Result<bool, QueueStoreError> {
        let mut state = self.write()?;
        match state.queue_mut(id) {
            Some(queue) if queue.status == QueueStatus::Pending => {
                queue.total_count = 0;
                queue.current_count = 0;
                queue.complete_percentage = 0.0;
                queue.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn start_processing(&self, id: QueueId, logs: Vec<NewQueueLog>) -> Result<Option<Queue>, QueueStoreError> {
        let mut state = self.write()?;
        let total = logs.len() as u64;

        let updated = match state.queue_mut(id) {
            Some(queue) if queue.status == QueueStatus::Pending => {
                queue.mark_initialized(total);
                queue.clone()
            }
            _ => return Ok(None),
        };

        state.logs.retain(|l| l.queue_id != id);
        state.logs.extend(logs.into_iter().map(|unit| QueueLog::new(id, unit)));
        Ok(Some(updated))
    }

    async fn force_status(
        &self,
        tenant_id: TenantId,
        id: QueueId,
        status: QueueStatus,
    ) -> Result<Option<Queue>, QueueStoreError> {
        let mut state = self.write()?;
        let Some(queue) = state.queue_mut(id).filter(|q| q.tenant_id == tenant_id) else {
            return Ok(None);
        };

        let before = queue.clone();
        let error_status = match status {
            QueueStatus::Pending => None,
            _ => queue.error_status.take(),
        };
        queue.set_status(status, error_status);
        Ok(Some(before))
    }

    async fn advance_progress(&self, id: QueueId, run: u32, processed: u64) -> Result<Option<Queue>, QueueStoreError> {
        let mut state = self.write()?;
        match state.queue_mut(id) {
            Some(queue) if queue.status == QueueStatus::Processing && queue.run == run => {
                queue.advance(processed);
                Ok(Some(queue.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn finish_run(&self, id: QueueId, run: u32, status: QueueStatus) -> Result<Option<Queue>, QueueStoreError> {
        let mut state = self.write()?;
        match state.queue_mut(id) {
            Some(queue) if queue.status == QueueStatus::Processing && queue.run == run => {
                queue.set_status(status, None);
                Ok(Some(queue.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn pending_logs(&self, queue_id: QueueId, limit: usize) -> Result<Vec<QueueLog>, QueueStoreError> {
        let state = self.read()?;
        Ok(state
            .logs
            .iter()
            .filter(|l| l.queue_id == queue_id && l.status == QueueLogStatus::Pending)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn claim_log(&self, id: QueueLogId) -> Result<Option<QueueLog>, QueueStoreError> {
        let mut state = self.write()?;
        match state.log_mut(id) {
            Some(log) if log.status == QueueLogStatus::Pending => {
                log.status = QueueLogStatus::Processing;
                log.updated_at = Utc::now();
                Ok(Some(log.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn finish_log(&self, id: QueueLogId, outcome: LogOutcome) -> Result<bool, QueueStoreError> {
        let mut state = self.write()?;
        match state.log_mut(id) {
            Some(log) if log.status == QueueLogStatus::Processing => {
                log.finish(outcome);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn count_logs(&self, queue_id: QueueId, status: QueueLogStatus) -> Result<u64, QueueStoreError> {
        let state = self.read()?;
        Ok(state
            .logs
            .iter()
            .filter(|l| l.queue_id == queue_id && l.status == status)
            .count() as u64)
    }

    async fn list_logs(&self, queue_id: QueueId) -> Result<Vec<QueueLog>, QueueStoreError> {
        let state = self.read()?;
        Ok(state.logs.iter().filter(|l| l.queue_id == queue_id).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use payforge_jobs::{JobType, JsonMap};

    fn units(n: usize) -> Vec<NewQueueLog> {
        (0..n).map(|i| NewQueueLog::new(format!("unit {i}"), JsonMap::new())).collect()
    }

    async fn pending_queue(store: &InMemoryQueueStore, tenant_id: TenantId) -> Queue {
        store
            .insert_queue(Queue::new(tenant_id, "q", JobType::PayrollProcessing, JsonMap::new()))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn start_processing_replaces_logs_and_sets_total() {
        let store = InMemoryQueueStore::new();
        let queue = pending_queue(&store, TenantId::new()).await;

        let started = store.start_processing(queue.id, units(3)).await.unwrap().unwrap();
        assert_eq!(started.status, QueueStatus::Processing);
        assert_eq!(started.total_count, 3);

        // A second initialization is rejected while PROCESSING.
        assert!(store.start_processing(queue.id, units(5)).await.unwrap().is_none());
        assert_eq!(store.list_logs(queue.id).await.unwrap().len(), 3);

        // Re-running from PENDING purges the previous run's logs.
        store.force_status(queue.tenant_id, queue.id, QueueStatus::Pending).await.unwrap();
        store.start_processing(queue.id, units(2)).await.unwrap().unwrap();
        let logs = store.list_logs(queue.id).await.unwrap();
        assert_eq!(logs.len(), 2);
        assert_eq!(logs[0].message, "unit 0");
    }

    #[tokio::test]
    async fn transitions_are_conditional() {
        let store = InMemoryQueueStore::new();
        let queue = pending_queue(&store, TenantId::new()).await;

        let applied = store
            .transition_queue(queue.id, QueueStatus::Processing, QueueStatus::Completed, None)
            .await
            .unwrap();
        assert!(applied.is_none());

        let failed = store
            .transition_queue(queue.id, QueueStatus::Pending, QueueStatus::Failed, Some("bad settings".into()))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(failed.status, QueueStatus::Failed);
        assert_eq!(failed.error_status.as_deref(), Some("bad settings"));
    }

    #[tokio::test]
    async fn a_log_is_claimed_and_finished_once() {
        let store = InMemoryQueueStore::new();
        let queue = pending_queue(&store, TenantId::new()).await;
        store.start_processing(queue.id, units(2)).await.unwrap();

        let batch = store.pending_logs(queue.id, 10).await.unwrap();
        let first = batch[0].id;

        assert!(store.claim_log(first).await.unwrap().is_some());
        assert!(store.claim_log(first).await.unwrap().is_none());
        assert!(store.finish_log(first, LogOutcome::Failed("boom".into())).await.unwrap());
        assert!(!store.finish_log(first, LogOutcome::Completed).await.unwrap());

        assert_eq!(store.count_logs(queue.id, QueueLogStatus::Failed).await.unwrap(), 1);
        assert_eq!(store.pending_logs(queue.id, 10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn advance_is_clamped_to_total() {
        let store = InMemoryQueueStore::new();
        let queue = pending_queue(&store, TenantId::new()).await;
        let started = store.start_processing(queue.id, units(3)).await.unwrap().unwrap();

        let q = store.advance_progress(queue.id, started.run, 2).await.unwrap().unwrap();
        assert_eq!((q.current_count, q.complete_percentage), (2, 0.66));
        let q = store.advance_progress(queue.id, started.run, 5).await.unwrap().unwrap();
        assert_eq!((q.current_count, q.complete_percentage), (3, 1.0));
    }

    #[tokio::test]
    async fn progress_and_finish_are_scoped_to_the_run() {
        let store = InMemoryQueueStore::new();
        let queue = pending_queue(&store, TenantId::new()).await;
        let first = store.start_processing(queue.id, units(3)).await.unwrap().unwrap();
        assert_eq!(first.run, 1);

        store.force_status(queue.tenant_id, queue.id, QueueStatus::Pending).await.unwrap();
        let second = store.start_processing(queue.id, units(3)).await.unwrap().unwrap();
        assert_eq!(second.run, 2);

        assert!(store.advance_progress(queue.id, first.run, 3).await.unwrap().is_none());
        assert!(store.finish_run(queue.id, first.run, QueueStatus::Completed).await.unwrap().is_none());

        let current = store.get_queue(queue.tenant_id, queue.id).await.unwrap().unwrap();
        assert_eq!((current.status, current.current_count), (QueueStatus::Processing, 0));

        let done = store.finish_run(queue.id, second.run, QueueStatus::Incomplete).await.unwrap().unwrap();
        assert_eq!(done.status, QueueStatus::Incomplete);
    }

    #[tokio::test]
    async fn reads_are_tenant_scoped_and_listing_is_newest_first() {
        let store = InMemoryQueueStore::new();
        let tenant = TenantId::new();
        let other = TenantId::new();
        let first = pending_queue(&store, tenant).await;
        let foreign = pending_queue(&store, other).await;
        let second = pending_queue(&store, tenant).await;

        assert!(store.get_queue(tenant, foreign.id).await.unwrap().is_none());
        assert!(store.force_status(tenant, foreign.id, QueueStatus::Failed).await.unwrap().is_none());

        let page = store.list_queues(tenant, PageRequest::new(1, 1)).await.unwrap();
        assert_eq!(page.total, 2);
        assert_eq!(page.items[0].id, second.id);
        let page = store.list_queues(tenant, PageRequest::new(2, 1)).await.unwrap();
        assert_eq!(page.items[0].id, first.id);
    }
}
