//! Tenant-scoped queue operations exposed to the HTTP layer.

use std::sync::Arc;

use thiserror::Error;

use payforge_core::{FileId, QueueId, TenantId};
use payforge_jobs::{HandlerRegistry, JobType, JsonMap, Queue, QueueStatus, RegistryError, FILE_ID_KEY};

use crate::files::FileLookup;

use super::store::{Page, PageRequest, QueueStore, QueueStoreError};
use super::view::{QueueSummary, QueueView};

#[derive(Debug, Error)]
pub enum QueueServiceError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error(transparent)]
    UnsupportedType(#[from] RegistryError),
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("file lookup failed: {0}")]
    FileLookup(String),
    #[error(transparent)]
    Store(#[from] QueueStoreError),
}

/// Input of [`QueueService::create_queue`].
#[derive(Debug, Clone)]
pub struct CreateQueue {
    pub name: String,
    pub job_type: JobType,
    pub settings: JsonMap,
}

pub struct QueueService {
    store: Arc<dyn QueueStore>,
    registry: Arc<HandlerRegistry>,
    files: Arc<dyn FileLookup>,
}

impl QueueService {
    pub fn new(store: Arc<dyn QueueStore>, registry: Arc<HandlerRegistry>, files: Arc<dyn FileLookup>) -> Self {
        Self { store, registry, files }
    }

    /// Persist a PENDING queue. Nothing is written when the type has no
    /// handler or a referenced file is missing.
    pub async fn create_queue(&self, tenant_id: TenantId, input: CreateQueue) -> Result<QueueView, QueueServiceError> {
        if !self.registry.supports(input.job_type) {
            return Err(RegistryError::UnsupportedType(input.job_type).into());
        }

        let name = input.name.trim();
        if name.is_empty() {
            return Err(QueueServiceError::Validation("name must not be empty".to_string()));
        }

        if let Some(file_id) = referenced_file(&input.settings)? {
            let exists = self
                .files
                .exists(tenant_id, file_id)
                .await
                .map_err(|e| QueueServiceError::FileLookup(format!("{e:#}")))?;
            if !exists {
                return Err(QueueServiceError::NotFound(format!("file {file_id}")));
            }
        }

        let queue = self
            .store
            .insert_queue(Queue::new(tenant_id, name, input.job_type, input.settings))
            .await?;

        tracing::info!(
            queue_id = %queue.id,
            tenant_id = %tenant_id,
            job_type = %queue.job_type,
            "queue created"
        );
        Ok(queue.into())
    }

    pub async fn get_queue_info(
        &self,
        tenant_id: TenantId,
        id: QueueId,
        include_logs: bool,
    ) -> Result<Option<QueueView>, QueueServiceError> {
        let Some(queue) = self.store.get_queue(tenant_id, id).await? else {
            return Ok(None);
        };

        let view = QueueView::from(queue);
        if !include_logs {
            return Ok(Some(view));
        }
        let logs = self.store.list_logs(id).await?;
        Ok(Some(view.with_logs(logs)))
    }

    pub async fn get_queue_table(
        &self,
        tenant_id: TenantId,
        page: PageRequest,
    ) -> Result<Page<QueueSummary>, QueueServiceError> {
        let page = self.store.list_queues(tenant_id, page).await?;
        Ok(Page {
            items: page.items.into_iter().map(QueueSummary::from).collect(),
            page: page.page,
            limit: page.limit,
            total: page.total,
        })
    }

    /// Operator override of a queue's status. Returns the snapshot taken
    /// before the update, or `None` (and no mutation) for an unknown id.
    pub async fn reinitialize_queue(
        &self,
        tenant_id: TenantId,
        id: QueueId,
        status: QueueStatus,
    ) -> Result<Option<QueueView>, QueueServiceError> {
        let before = self.store.force_status(tenant_id, id, status).await?;
        match &before {
            Some(before) if !before.status.is_terminal() => tracing::warn!(
                queue_id = %id,
                tenant_id = %tenant_id,
                from = %before.status,
                to = %status,
                "queue status overridden while the queue was still running"
            ),
            Some(before) => tracing::info!(
                queue_id = %id,
                tenant_id = %tenant_id,
                from = %before.status,
                to = %status,
                "queue status overridden"
            ),
            None => {}
        }
        Ok(before.map(QueueView::from))
    }
}

fn referenced_file(settings: &JsonMap) -> Result<Option<FileId>, QueueServiceError> {
    match settings.get(FILE_ID_KEY) {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::String(raw)) => raw
            .parse()
            .map(Some)
            .map_err(|e| QueueServiceError::Validation(format!("{FILE_ID_KEY}: {e}"))),
        Some(other) => Err(QueueServiceError::Validation(format!(
            "{FILE_ID_KEY} must be a string, got {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::files::InMemoryFileStore;
    use crate::queue::in_memory::InMemoryQueueStore;
    use async_trait::async_trait;
    use payforge_jobs::{JobError, JobHandler, NewQueueLog, QueueLog};
    use serde_json::json;

    struct Noop;

    #[async_trait]
    impl JobHandler for Noop {
        async fn initialize(&self, _queue: &Queue) -> Result<Vec<NewQueueLog>, JobError> {
            Ok(Vec::new())
        }

        async fn process_one(&self, _queue: &Queue, _log: &QueueLog) -> Result<(), JobError> {
            Ok(())
        }
    }

    fn service() -> (QueueService, Arc<InMemoryQueueStore>, Arc<InMemoryFileStore>) {
        let store = InMemoryQueueStore::arc();
        let files = Arc::new(InMemoryFileStore::new());
        let registry = HandlerRegistry::builder()
            .register(JobType::EmployeeImportation, Noop)
            .register(JobType::PayrollProcessing, Noop)
            .build();
        let service = QueueService::new(store.clone(), Arc::new(registry), files.clone());
        (service, store, files)
    }

    fn import(file_id: impl Into<serde_json::Value>) -> CreateQueue {
        let mut settings = JsonMap::new();
        settings.insert(FILE_ID_KEY.into(), file_id.into());
        CreateQueue {
            name: "Import employees".into(),
            job_type: JobType::EmployeeImportation,
            settings,
        }
    }

    #[tokio::test]
    async fn create_queue_with_missing_file_persists_nothing() {
        let (service, store, _files) = service();
        let tenant = TenantId::new();

        let err = service
            .create_queue(tenant, import(FileId::new().to_string()))
            .await
            .unwrap_err();
        assert!(matches!(err, QueueServiceError::NotFound(_)));

        let page = store.list_queues(tenant, PageRequest::default()).await.unwrap();
        assert_eq!(page.total, 0);
    }

    #[tokio::test]
    async fn create_queue_with_uploaded_file_is_pending() {
        let (service, _store, files) = service();
        let tenant = TenantId::new();
        let file = files.upload(tenant, "employees.xlsx", vec![json!({ "employeeNo": "E-1" })]).unwrap();

        let view = service.create_queue(tenant, import(file.id.to_string())).await.unwrap();
        assert_eq!(view.status, QueueStatus::Pending);
        assert_eq!(view.total_count, 0);

        // Another tenant cannot reference it.
        let err = service
            .create_queue(TenantId::new(), import(file.id.to_string()))
            .await
            .unwrap_err();
        assert!(matches!(err, QueueServiceError::NotFound(_)));
    }

    #[tokio::test]
    async fn create_queue_rejects_unsupported_type_and_bad_file_ids() {
        let (service, _store, _files) = service();
        let tenant = TenantId::new();

        let err = service
            .create_queue(
                tenant,
                CreateQueue {
                    name: "Timekeeping".into(),
                    job_type: JobType::TimekeepingProcessing,
                    settings: JsonMap::new(),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, QueueServiceError::UnsupportedType(_)));

        let err = service.create_queue(tenant, import("not-a-uuid")).await.unwrap_err();
        assert!(matches!(err, QueueServiceError::Validation(_)));

        let err = service.create_queue(tenant, import(42)).await.unwrap_err();
        assert!(matches!(err, QueueServiceError::Validation(_)));
    }

    #[tokio::test]
    async fn reinitialize_unknown_queue_returns_none_without_mutation() {
        let (service, store, _files) = service();
        let tenant = TenantId::new();
        let created = service
            .create_queue(
                tenant,
                CreateQueue {
                    name: "Payroll".into(),
                    job_type: JobType::PayrollProcessing,
                    settings: JsonMap::new(),
                },
            )
            .await
            .unwrap();

        let result = service
            .reinitialize_queue(tenant, QueueId::new(), QueueStatus::Failed)
            .await
            .unwrap();
        assert!(result.is_none());

        let unchanged = store.get_queue(tenant, created.id).await.unwrap().unwrap();
        assert_eq!(unchanged.status, QueueStatus::Pending);
        assert_eq!(unchanged.updated_at, created.updated_at);
    }

    #[tokio::test]
    async fn reinitialize_returns_previous_snapshot() {
        let (service, _store, _files) = service();
        let tenant = TenantId::new();
        let created = service
            .create_queue(
                tenant,
                CreateQueue {
                    name: "Payroll".into(),
                    job_type: JobType::PayrollProcessing,
                    settings: JsonMap::new(),
                },
            )
            .await
            .unwrap();

        let before = service
            .reinitialize_queue(tenant, created.id, QueueStatus::Failed)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(before.status, QueueStatus::Pending);

        let after = service.get_queue_info(tenant, created.id, false).await.unwrap().unwrap();
        assert_eq!(after.status, QueueStatus::Failed);
        assert!(after.logs.is_none());
    }
}
