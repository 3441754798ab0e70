//! Polling scheduler for the background queue.
//!
//! Two independent cycles share one store:
//!
//! - the **pending cycle** initializes PENDING queues (handler `initialize`,
//!   then the atomic PENDING → PROCESSING swap that fixes `total_count`)
//! - the **processing cycle** drains PROCESSING queues in batches of
//!   `batch_size` logs, running each batch concurrently, and finalizes a queue
//!   once no PENDING log remains
//!
//! Progress only counts units whose outcome was recorded, and is applied to
//! the run the batch started in. A log whose outcome could not be recorded
//! stays PROCESSING and keeps the queue from finishing as COMPLETED.
//!
//! Failures never escape a pass: store errors are logged and the step is
//! abandoned, handler errors and panics are recorded on the queue or log.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::future::join_all;
use futures::FutureExt;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, info_span, instrument, warn, Instrument};

use payforge_jobs::{
    HandlerRegistry, JobError, JobHandler, LogOutcome, NewQueueLog, Queue, QueueLog, QueueLogStatus,
    QueueStatus,
};

use super::config::QueueConfig;
use super::notifier::{ProgressNotifier, ProgressUpdate};
use super::store::{QueueStore, QueueStoreError};

/// What one pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassSummary {
    /// Queues picked up.
    pub queues: usize,
    /// Queues moved to PROCESSING.
    pub initialized: usize,
    /// Queues moved to FAILED.
    pub failed: usize,
    /// Logs run with a recorded outcome.
    pub units: usize,
    /// Queues moved to COMPLETED or INCOMPLETE.
    pub finalized: usize,
}

#[derive(Debug, Clone, Copy)]
enum Cycle {
    Pending,
    Processing,
}

pub struct QueueOrchestrator {
    store: Arc<dyn QueueStore>,
    registry: Arc<HandlerRegistry>,
    notifier: Arc<dyn ProgressNotifier>,
    config: QueueConfig,
}

impl QueueOrchestrator {
    pub fn new(
        store: Arc<dyn QueueStore>,
        registry: Arc<HandlerRegistry>,
        notifier: Arc<dyn ProgressNotifier>,
        config: QueueConfig,
    ) -> Self {
        Self {
            store,
            registry,
            notifier,
            config,
        }
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    /// Start both cycles on the current tokio runtime.
    pub fn spawn(self: Arc<Self>) -> OrchestratorHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        info!(
            batch_size = self.config.batch_size,
            poll_interval_ms = self.config.poll_interval.as_millis() as u64,
            unit_timeout_ms = self.config.unit_timeout.map(|t| t.as_millis() as u64),
            job_types = ?self.registry.registered_types(),
            "starting queue orchestrator"
        );

        let handles = [Cycle::Pending, Cycle::Processing]
            .into_iter()
            .map(|cycle| {
                let this = Arc::clone(&self);
                let shutdown = shutdown_rx.clone();
                let span = info_span!("queue.cycle", cycle = ?cycle);
                tokio::spawn(async move { this.run_cycle(cycle, shutdown).await }.instrument(span))
            })
            .collect();

        OrchestratorHandle {
            shutdown: shutdown_tx,
            handles,
        }
    }

    async fn run_cycle(&self, cycle: Cycle, mut shutdown: watch::Receiver<bool>) {
        loop {
            if *shutdown.borrow() {
                break;
            }

            match cycle {
                Cycle::Pending => {
                    self.run_pending_pass().await;
                }
                Cycle::Processing => {
                    self.run_processing_pass().await;
                }
            }

            tokio::select! {
                _ = tokio::time::sleep(self.config.poll_interval) => {}
                // A closed channel also stops the loop.
                _ = shutdown.changed() => break,
            }
        }
        debug!("cycle stopped");
    }

    /// Initialize every PENDING queue, one after another.
    #[instrument(name = "queue.pending_pass", skip_all)]
    pub async fn run_pending_pass(&self) -> PassSummary {
        let mut summary = PassSummary::default();

        let queues = match self.store.queues_by_status(QueueStatus::Pending).await {
            Ok(queues) => queues,
            Err(error) => {
                error!(%error, "failed to fetch pending queues");
                return summary;
            }
        };

        for queue in queues {
            summary.queues += 1;
            match self.initialize_queue(&queue).await {
                Ok(Some(QueueStatus::Processing)) => summary.initialized += 1,
                Ok(Some(QueueStatus::Failed)) => summary.failed += 1,
                Ok(_) => {}
                Err(error) => {
                    error!(queue_id = %queue.id, tenant_id = %queue.tenant_id, %error, "queue initialization step failed");
                }
            }
        }

        summary
    }

    /// Returns the status the queue was moved to, `None` when another actor
    /// changed it first.
    async fn initialize_queue(&self, queue: &Queue) -> Result<Option<QueueStatus>, QueueStoreError> {
        let handler = match self.registry.get_handler(queue.job_type) {
            Ok(handler) => handler,
            Err(err) => return self.fail_initialization(queue, err.to_string()).await,
        };

        if !self.store.reset_progress(queue.id).await? {
            debug!(queue_id = %queue.id, "queue left PENDING before initialization, skipping");
            return Ok(None);
        }

        match guard(handler.initialize(queue)).await {
            Ok(units) => self.start_processing(queue, units).await,
            Err(err) => self.fail_initialization(queue, err.detail()).await,
        }
    }

    async fn start_processing(
        &self,
        queue: &Queue,
        units: Vec<NewQueueLog>,
    ) -> Result<Option<QueueStatus>, QueueStoreError> {
        let count = units.len();
        match self.store.start_processing(queue.id, units).await? {
            Some(started) => {
                info!(
                    queue_id = %queue.id,
                    tenant_id = %queue.tenant_id,
                    job_type = %queue.job_type,
                    total_count = count,
                    "queue initialized"
                );
                self.notify(&started);
                Ok(Some(started.status))
            }
            None => {
                warn!(queue_id = %queue.id, "queue left PENDING during initialization, units discarded");
                Ok(None)
            }
        }
    }

    async fn fail_initialization(
        &self,
        queue: &Queue,
        detail: String,
    ) -> Result<Option<QueueStatus>, QueueStoreError> {
        warn!(
            queue_id = %queue.id,
            tenant_id = %queue.tenant_id,
            job_type = %queue.job_type,
            error = %detail,
            "queue initialization failed"
        );

        let failed = self
            .store
            .transition_queue(queue.id, QueueStatus::Pending, QueueStatus::Failed, Some(detail))
            .await?;

        match failed {
            Some(failed) => Ok(Some(failed.status)),
            None => {
                debug!(queue_id = %queue.id, "queue left PENDING, failure not recorded");
                Ok(None)
            }
        }
    }

    /// Drain one batch from every PROCESSING queue, one queue after another.
    #[instrument(name = "queue.processing_pass", skip_all)]
    pub async fn run_processing_pass(&self) -> PassSummary {
        let mut summary = PassSummary::default();

        let queues = match self.store.queues_by_status(QueueStatus::Processing).await {
            Ok(queues) => queues,
            Err(error) => {
                error!(%error, "failed to fetch processing queues");
                return summary;
            }
        };

        for queue in queues {
            summary.queues += 1;

            let handler = match self.registry.get_handler(queue.job_type) {
                Ok(handler) => handler,
                Err(error) => {
                    warn!(queue_id = %queue.id, %error, "no handler for processing queue, skipping");
                    continue;
                }
            };

            match self.drain_batch(&queue, handler.as_ref()).await {
                Ok(BatchOutcome::Ran(units)) => summary.units += units,
                Ok(BatchOutcome::Finalized) => summary.finalized += 1,
                Ok(BatchOutcome::Idle) => {}
                Err(error) => {
                    error!(queue_id = %queue.id, tenant_id = %queue.tenant_id, %error, "queue batch step failed");
                }
            }
        }

        summary
    }

    async fn drain_batch(&self, queue: &Queue, handler: &dyn JobHandler) -> Result<BatchOutcome, QueueStoreError> {
        let batch = self.store.pending_logs(queue.id, self.config.batch_size).await?;
        if batch.is_empty() {
            return self.finalize(queue).await;
        }

        let settled = join_all(batch.iter().map(|log| self.run_unit(queue, handler, log)))
            .await
            .into_iter()
            .filter(|unit| *unit == UnitResult::Recorded)
            .count();

        if settled == 0 {
            return Ok(BatchOutcome::Idle);
        }

        match self.store.advance_progress(queue.id, queue.run, settled as u64).await? {
            Some(progressed) => {
                debug!(
                    queue_id = %queue.id,
                    current_count = progressed.current_count,
                    total_count = progressed.total_count,
                    "batch processed"
                );
                self.notify(&progressed);
            }
            None => debug!(queue_id = %queue.id, run = queue.run, "queue left this run during batch"),
        }

        Ok(BatchOutcome::Ran(settled))
    }

    /// Claim, run and settle one log.
    async fn run_unit(&self, queue: &Queue, handler: &dyn JobHandler, log: &QueueLog) -> UnitResult {
        let claimed = match self.store.claim_log(log.id).await {
            Ok(Some(claimed)) => claimed,
            Ok(None) => {
                debug!(queue_id = %queue.id, log_id = %log.id, "log already claimed");
                return UnitResult::Skipped;
            }
            Err(error) => {
                error!(queue_id = %queue.id, log_id = %log.id, %error, "failed to claim log");
                return UnitResult::Skipped;
            }
        };

        let outcome = match self.execute(handler, queue, &claimed).await {
            Ok(()) => LogOutcome::Completed,
            Err(err) => {
                let detail = err.detail();
                warn!(queue_id = %queue.id, log_id = %log.id, error = %detail, "unit failed");
                LogOutcome::Failed(detail)
            }
        };

        match self.store.finish_log(claimed.id, outcome).await {
            Ok(true) => UnitResult::Recorded,
            Ok(false) => {
                debug!(queue_id = %queue.id, log_id = %log.id, "log purged or settled elsewhere, outcome dropped");
                UnitResult::Skipped
            }
            Err(error) => {
                error!(queue_id = %queue.id, log_id = %log.id, %error, "failed to record unit outcome");
                UnitResult::Lost
            }
        }
    }

    async fn execute(&self, handler: &dyn JobHandler, queue: &Queue, log: &QueueLog) -> Result<(), JobError> {
        let unit = guard(handler.process_one(queue, log));
        match self.config.unit_timeout {
            Some(limit) => tokio::time::timeout(limit, unit)
                .await
                .unwrap_or(Err(JobError::Timeout(limit))),
            None => unit.await,
        }
    }

    /// No PENDING log remains. Logs still PROCESSING here never had their
    /// outcome recorded and count against completion like FAILED ones.
    async fn finalize(&self, queue: &Queue) -> Result<BatchOutcome, QueueStoreError> {
        let failed = self.store.count_logs(queue.id, QueueLogStatus::Failed).await?;
        let unsettled = self.store.count_logs(queue.id, QueueLogStatus::Processing).await?;
        if unsettled > 0 {
            warn!(queue_id = %queue.id, unsettled, "finishing with unrecorded unit outcomes");
        }
        let status = if failed == 0 && unsettled == 0 {
            QueueStatus::Completed
        } else {
            QueueStatus::Incomplete
        };

        match self.store.finish_run(queue.id, queue.run, status).await? {
            Some(finished) => {
                info!(
                    queue_id = %queue.id,
                    tenant_id = %queue.tenant_id,
                    status = %finished.status,
                    failed_units = failed,
                    unsettled_units = unsettled,
                    "queue finished"
                );
                self.notify(&finished);
                Ok(BatchOutcome::Finalized)
            }
            None => {
                debug!(queue_id = %queue.id, "queue left PROCESSING before finalization");
                Ok(BatchOutcome::Idle)
            }
        }
    }

    fn notify(&self, queue: &Queue) {
        match ProgressUpdate::for_queue(queue) {
            Some(update) => self.notifier.publish(queue.tenant_id, update),
            None => debug!(queue_id = %queue.id, "no dateRangeId in settings, progress not published"),
        }
    }
}

enum BatchOutcome {
    Ran(usize),
    Finalized,
    Idle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UnitResult {
    /// Ran, and the outcome is stored.
    Recorded,
    /// Ran, but storing the outcome failed; the log is left PROCESSING.
    Lost,
    /// Not claimed by this pass, or its outcome no longer applies.
    Skipped,
}

/// Turn a handler panic into a `JobError`.
async fn guard<T, F>(fut: F) -> Result<T, JobError>
where
    F: Future<Output = Result<T, JobError>>,
{
    AssertUnwindSafe(fut)
        .catch_unwind()
        .await
        .unwrap_or_else(|payload| Err(JobError::failed(panic_message(&*payload))))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        format!("handler panicked: {msg}")
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        format!("handler panicked: {msg}")
    } else {
        "handler panicked".to_string()
    }
}

/// Stops both cycles of a spawned orchestrator.
#[derive(Debug)]
pub struct OrchestratorHandle {
    shutdown: watch::Sender<bool>,
    handles: Vec<JoinHandle<()>>,
}

impl OrchestratorHandle {
    /// Signal shutdown and wait for the in-flight passes to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        join_all(self.handles).await.into_iter().for_each(|result| {
            if let Err(error) = result {
                warn!(%error, "queue cycle task ended abnormally");
            }
        });
        info!("queue orchestrator stopped");
    }
}
