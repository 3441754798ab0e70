//! Service wiring: queue store, handler registry, orchestrator and the
//! progress fan-out shared by the HTTP handlers.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use tokio_stream::{wrappers::BroadcastStream, StreamExt};

use payforge_core::TenantId;
use payforge_infra::files::InMemoryFileStore;
use payforge_infra::queue::{
    BroadcastProgressNotifier, InMemoryQueueStore, PostgresQueueStore, QueueOrchestrator, QueueService, QueueStore,
};
use payforge_infra::workforce::InMemoryWorkforce;
use payforge_jobs::handlers::{EmployeeImportationHandler, PayrollHandler, TimekeepingHandler};
use payforge_jobs::{HandlerRegistry, JobType};

use crate::config::ApiConfig;

/// SSE event name carrying a [`payforge_infra::queue::ProgressUpdate`].
pub const PROGRESS_EVENT: &str = "queue.progress";

pub struct AppServices {
    pub queue: Arc<QueueService>,
    pub files: Arc<InMemoryFileStore>,
    pub workforce: Arc<InMemoryWorkforce>,
    pub progress: BroadcastProgressNotifier,
    pub orchestrator: Arc<QueueOrchestrator>,
}

impl std::fmt::Debug for AppServices {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppServices")
            .field("queue_config", self.orchestrator.config())
            .finish_non_exhaustive()
    }
}

pub async fn build_services(config: &ApiConfig) -> anyhow::Result<AppServices> {
    let store: Arc<dyn QueueStore> = match &config.database_url {
        Some(url) => {
            tracing::info!("using Postgres queue store");
            Arc::new(PostgresQueueStore::connect(url).await?)
        }
        None => {
            tracing::info!("using in-memory queue store");
            InMemoryQueueStore::arc()
        }
    };

    let files = Arc::new(InMemoryFileStore::new());
    let workforce = Arc::new(InMemoryWorkforce::new(files.clone()));
    let registry = Arc::new(
        HandlerRegistry::builder()
            .register(
                JobType::EmployeeImportation,
                EmployeeImportationHandler::new(workforce.clone()),
            )
            .register(JobType::TimekeepingProcessing, TimekeepingHandler::new(workforce.clone()))
            .register(JobType::PayrollProcessing, PayrollHandler::new(workforce.clone()))
            .build(),
    );

    let progress = BroadcastProgressNotifier::default();
    let orchestrator = Arc::new(QueueOrchestrator::new(
        store.clone(),
        registry.clone(),
        Arc::new(progress.clone()),
        config.queue.clone(),
    ));
    let queue = Arc::new(QueueService::new(store, registry, files.clone()));

    Ok(AppServices {
        queue,
        files,
        workforce,
        progress,
        orchestrator,
    })
}

/// Progress updates for one tenant as server-sent events. Lagged receivers
/// drop the missed updates.
pub fn tenant_sse_stream(
    services: Arc<AppServices>,
    tenant_id: TenantId,
) -> Sse<impl tokio_stream::Stream<Item = Result<SseEvent, Infallible>>> {
    let rx = services.progress.subscribe();
    let stream = BroadcastStream::new(rx).filter_map(move |msg| match msg {
        Ok(m) if m.tenant_id == tenant_id => {
            let data = serde_json::to_string(&m.update).unwrap_or_else(|_| "{}".to_string());
            Some(Ok(SseEvent::default().event(PROGRESS_EVENT).data(data)))
        }
        _ => None,
    });

    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
}
