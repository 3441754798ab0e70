//! Postgres-backed queue store.
//!
//! Status changes are single conditional statements
//! (`UPDATE ... WHERE id = $1 AND status = $2 RETURNING ...`), so concurrent
//! callers racing on the same row see exactly one winner. Initialization runs
//! in one transaction that locks the queue row (`FOR UPDATE`) before swapping
//! the log set and bumping the queue's `run`; batch progress and
//! finalization are matched on that run.
//!
//! ## Error Mapping
//!
//! | SQLx Error | QueueStoreError |
//! |------------|-----------------|
//! | Database / PoolClosed / Io / other | `Storage` |
//! | ColumnDecode / unknown enum text | `Decode` |

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, QueryBuilder, Row};
use tracing::instrument;

use payforge_core::{QueueId, QueueLogId, TenantId};
use payforge_jobs::{JsonMap, LogOutcome, NewQueueLog, Queue, QueueLog, QueueLogStatus, QueueStatus};

use super::store::{Page, PageRequest, QueueStore, QueueStoreError};

const SCHEMA: &str = include_str!("../../migrations/0001_queues.sql");

const QUEUE_COLUMNS: &str = "id, tenant_id, name, type, status, settings, total_count, current_count, \
     complete_percentage, error_status, run, created_at, updated_at";

const LOG_COLUMNS: &str = "id, queue_id, params, message, status, error_status, created_at, updated_at";

/// Postgres bind parameters are capped at 65535 per statement.
const INSERT_CHUNK: usize = 5_000;

#[derive(Debug, Clone)]
pub struct PostgresQueueStore {
    pool: Arc<PgPool>,
}

impl PostgresQueueStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool: Arc::new(pool) }
    }

    /// Connect and make sure the queue tables exist.
    pub async fn connect(database_url: &str) -> Result<Self, QueueStoreError> {
        let pool = PgPool::connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        let store = Self::new(pool);
        store.ensure_schema().await?;
        Ok(store)
    }

    /// Apply the bundled migration. Idempotent.
    pub async fn ensure_schema(&self) -> Result<(), QueueStoreError> {
        sqlx::raw_sql(SCHEMA)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("ensure_schema", e))?;
        Ok(())
    }
}

#[async_trait]
impl QueueStore for PostgresQueueStore {
    #[instrument(skip(self, queue), fields(queue_id = %queue.id, tenant_id = %queue.tenant_id), err)]
    async fn insert_queue(&self, queue: Queue) -> Result<Queue, QueueStoreError> {
        sqlx::query(
            r#"
            INSERT INTO queues (
                id, tenant_id, name, type, status, settings, total_count, current_count,
                complete_percentage, error_status, run, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(queue.id.as_uuid())
        .bind(queue.tenant_id.as_uuid())
        .bind(&queue.name)
        .bind(queue.job_type.as_str())
        .bind(queue.status.as_str())
        .bind(Json(&queue.settings))
        .bind(queue.total_count as i64)
        .bind(queue.current_count as i64)
        .bind(queue.complete_percentage)
        .bind(&queue.error_status)
        .bind(i32::try_from(queue.run).unwrap_or(i32::MAX))
        .bind(queue.created_at)
        .bind(queue.updated_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_queue", e))?;

        Ok(queue)
    }

    async fn get_queue(&self, tenant_id: TenantId, id: QueueId) -> Result<Option<Queue>, QueueStoreError> {
        let row = sqlx::query(&format!(
            "SELECT {QUEUE_COLUMNS} FROM queues WHERE id = $1 AND tenant_id = $2"
        ))
        .bind(id.as_uuid())
        .bind(tenant_id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_queue", e))?;

        row.as_ref().map(queue_from_row).transpose()
    }

    async fn list_queues(&self, tenant_id: TenantId, page: PageRequest) -> Result<Page<Queue>, QueueStoreError> {
        let total: i64 = sqlx::query("SELECT COUNT(*) AS total FROM queues WHERE tenant_id = $1")
            .bind(tenant_id.as_uuid())
            .fetch_one(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("count_queues", e))?
            .try_get("total")
            .map_err(|e| QueueStoreError::Decode(e.to_string()))?;

        let rows = sqlx::query(&format!(
            "SELECT {QUEUE_COLUMNS} FROM queues WHERE tenant_id = $1 ORDER BY seq DESC LIMIT $2 OFFSET $3"
        ))
        .bind(tenant_id.as_uuid())
        .bind(i64::from(page.limit))
        .bind(page.offset() as i64)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_queues", e))?;

        Ok(Page {
            items: rows.iter().map(queue_from_row).collect::<Result<_, _>>()?,
            page: page.page,
            limit: page.limit,
            total: total.max(0) as u64,
        })
    }

    async fn queues_by_status(&self, status: QueueStatus) -> Result<Vec<Queue>, QueueStoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {QUEUE_COLUMNS} FROM queues WHERE status = $1 ORDER BY seq ASC"
        ))
        .bind(status.as_str())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("queues_by_status", e))?;

        rows.iter().map(queue_from_row).collect()
    }

    #[instrument(skip(self, error_status), fields(queue_id = %id, from = %from, to = %to), err)]
    async fn transition_queue(
        &self,
        id: QueueId,
        from: QueueStatus,
        to: QueueStatus,
        error_status: Option<String>,
    ) -> Result<Option<Queue>, QueueStoreError> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE queues
            SET status = $3, error_status = $4, updated_at = NOW()
            WHERE id = $1 AND status = $2
            RETURNING {QUEUE_COLUMNS}
            "#
        ))
        .bind(id.as_uuid())
        .bind(from.as_str())
        .bind(to.as_str())
        .bind(error_status)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("transition_queue", e))?;

        row.as_ref().map(queue_from_row).transpose()
    }

    async fn reset_progress(&self, id: QueueId) -> Result<bool, QueueStoreError> {
        let result = sqlx::query(
            r#"
            UPDATE queues
            SET total_count = 0, current_count = 0, complete_percentage = 0, updated_at = NOW()
            WHERE id = $1 AND status = $2
            "#,
        )
        .bind(id.as_uuid())
        .bind(QueueStatus::Pending.as_str())
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("reset_progress", e))?;

        Ok(result.rows_affected() == 1)
    }

    #[instrument(skip(self, logs), fields(queue_id = %id, log_count = logs.len()), err)]
    async fn start_processing(&self, id: QueueId, logs: Vec<NewQueueLog>) -> Result<Option<Queue>, QueueStoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        let locked = sqlx::query("SELECT status FROM queues WHERE id = $1 FOR UPDATE")
            .bind(id.as_uuid())
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("lock_queue", e))?;

        let is_pending = match locked {
            Some(row) => {
                let status: String = row
                    .try_get("status")
                    .map_err(|e| QueueStoreError::Decode(e.to_string()))?;
                status == QueueStatus::Pending.as_str()
            }
            None => false,
        };
        if !is_pending {
            tx.rollback().await.map_err(|e| map_sqlx_error("rollback", e))?;
            return Ok(None);
        }

        sqlx::query("DELETE FROM queue_logs WHERE queue_id = $1")
            .bind(id.as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("purge_logs", e))?;

        let total = logs.len() as i64;
        let now = Utc::now();
        for chunk in logs.chunks(INSERT_CHUNK) {
            let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
                "INSERT INTO queue_logs (id, queue_id, params, message, status, created_at, updated_at) ",
            );
            builder.push_values(chunk, |mut b, unit| {
                b.push_bind(*QueueLogId::new().as_uuid())
                    .push_bind(id.as_uuid())
                    .push_bind(Json(&unit.params))
                    .push_bind(&unit.message)
                    .push_bind(QueueLogStatus::Pending.as_str())
                    .push_bind(now)
                    .push_bind(now);
            });
            builder
                .build()
                .execute(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("insert_logs", e))?;
        }

        let row = sqlx::query(&format!(
            r#"
            UPDATE queues
            SET status = $2, total_count = $3, current_count = 0, complete_percentage = 0,
                error_status = NULL, run = run + 1, updated_at = NOW()
            WHERE id = $1
            RETURNING {QUEUE_COLUMNS}
            "#
        ))
        .bind(id.as_uuid())
        .bind(QueueStatus::Processing.as_str())
        .bind(total)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("start_processing", e))?;
        let queue = queue_from_row(&row)?;

        tx.commit().await.map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok(Some(queue))
    }

    #[instrument(skip(self), fields(queue_id = %id, tenant_id = %tenant_id, status = %status), err)]
    async fn force_status(
        &self,
        tenant_id: TenantId,
        id: QueueId,
        status: QueueStatus,
    ) -> Result<Option<Queue>, QueueStoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        let before = sqlx::query(&format!(
            "SELECT {QUEUE_COLUMNS} FROM queues WHERE id = $1 AND tenant_id = $2 FOR UPDATE"
        ))
        .bind(id.as_uuid())
        .bind(tenant_id.as_uuid())
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("force_status_read", e))?;

        let Some(before) = before.as_ref().map(queue_from_row).transpose()? else {
            tx.rollback().await.map_err(|e| map_sqlx_error("rollback", e))?;
            return Ok(None);
        };

        sqlx::query(
            r#"
            UPDATE queues
            SET status = $2,
                error_status = CASE WHEN $2 = 'PENDING' THEN NULL ELSE error_status END,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .bind(status.as_str())
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("force_status", e))?;

        tx.commit().await.map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok(Some(before))
    }

    #[instrument(skip(self), fields(queue_id = %id, run = run, processed = processed), err)]
    async fn advance_progress(&self, id: QueueId, run: u32, processed: u64) -> Result<Option<Queue>, QueueStoreError> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE queues
            SET current_count = LEAST(current_count + $4, total_count),
                complete_percentage = CASE
                    WHEN total_count = 0 THEN 0
                    ELSE FLOOR(LEAST(current_count + $4, total_count) * 100.0 / total_count) / 100.0
                END,
                updated_at = NOW()
            WHERE id = $1 AND status = $2 AND run = $3
            RETURNING {QUEUE_COLUMNS}
            "#
        ))
        .bind(id.as_uuid())
        .bind(QueueStatus::Processing.as_str())
        .bind(i32::try_from(run).unwrap_or(i32::MAX))
        .bind(i64::try_from(processed).unwrap_or(i64::MAX))
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("advance_progress", e))?;

        row.as_ref().map(queue_from_row).transpose()
    }

    #[instrument(skip(self), fields(queue_id = %id, run = run, status = %status), err)]
    async fn finish_run(&self, id: QueueId, run: u32, status: QueueStatus) -> Result<Option<Queue>, QueueStoreError> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE queues
            SET status = $4, error_status = NULL, updated_at = NOW()
            WHERE id = $1 AND status = $2 AND run = $3
            RETURNING {QUEUE_COLUMNS}
            "#
        ))
        .bind(id.as_uuid())
        .bind(QueueStatus::Processing.as_str())
        .bind(i32::try_from(run).unwrap_or(i32::MAX))
        .bind(status.as_str())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("finish_run", e))?;

        row.as_ref().map(queue_from_row).transpose()
    }

    async fn pending_logs(&self, queue_id: QueueId, limit: usize) -> Result<Vec<QueueLog>, QueueStoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {LOG_COLUMNS} FROM queue_logs WHERE queue_id = $1 AND status = $2 ORDER BY seq ASC LIMIT $3"
        ))
        .bind(queue_id.as_uuid())
        .bind(QueueLogStatus::Pending.as_str())
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("pending_logs", e))?;

        rows.iter().map(log_from_row).collect()
    }

    async fn claim_log(&self, id: QueueLogId) -> Result<Option<QueueLog>, QueueStoreError> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE queue_logs
            SET status = $3, updated_at = NOW()
            WHERE id = $1 AND status = $2
            RETURNING {LOG_COLUMNS}
            "#
        ))
        .bind(id.as_uuid())
        .bind(QueueLogStatus::Pending.as_str())
        .bind(QueueLogStatus::Processing.as_str())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("claim_log", e))?;

        row.as_ref().map(log_from_row).transpose()
    }

    async fn finish_log(&self, id: QueueLogId, outcome: LogOutcome) -> Result<bool, QueueStoreError> {
        let result = sqlx::query(
            r#"
            UPDATE queue_logs
            SET status = $3, error_status = $4, updated_at = NOW()
            WHERE id = $1 AND status = $2
            "#,
        )
        .bind(id.as_uuid())
        .bind(QueueLogStatus::Processing.as_str())
        .bind(outcome.status().as_str())
        .bind(outcome.error_status())
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("finish_log", e))?;

        Ok(result.rows_affected() == 1)
    }

    async fn count_logs(&self, queue_id: QueueId, status: QueueLogStatus) -> Result<u64, QueueStoreError> {
        let total: i64 = sqlx::query("SELECT COUNT(*) AS total FROM queue_logs WHERE queue_id = $1 AND status = $2")
            .bind(queue_id.as_uuid())
            .bind(status.as_str())
            .fetch_one(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("count_logs", e))?
            .try_get("total")
            .map_err(|e| QueueStoreError::Decode(e.to_string()))?;

        Ok(total.max(0) as u64)
    }

    async fn list_logs(&self, queue_id: QueueId) -> Result<Vec<QueueLog>, QueueStoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {LOG_COLUMNS} FROM queue_logs WHERE queue_id = $1 ORDER BY seq ASC"
        ))
        .bind(queue_id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_logs", e))?;

        rows.iter().map(log_from_row).collect()
    }
}

fn queue_from_row(row: &PgRow) -> Result<Queue, QueueStoreError> {
    let decode = |e: sqlx::Error| QueueStoreError::Decode(e.to_string());

    let job_type: String = row.try_get("type").map_err(decode)?;
    let status: String = row.try_get("status").map_err(decode)?;
    let settings: Json<JsonMap> = row.try_get("settings").map_err(decode)?;
    let total_count: i64 = row.try_get("total_count").map_err(decode)?;
    let current_count: i64 = row.try_get("current_count").map_err(decode)?;
    let run: i32 = row.try_get("run").map_err(decode)?;
    let created_at: DateTime<Utc> = row.try_get("created_at").map_err(decode)?;
    let updated_at: DateTime<Utc> = row.try_get("updated_at").map_err(decode)?;

    Ok(Queue {
        id: QueueId::from_uuid(row.try_get("id").map_err(decode)?),
        tenant_id: TenantId::from_uuid(row.try_get("tenant_id").map_err(decode)?),
        name: row.try_get("name").map_err(decode)?,
        job_type: job_type
            .parse()
            .map_err(|e| QueueStoreError::Decode(format!("queues.type: {e}")))?,
        status: status
            .parse()
            .map_err(|e| QueueStoreError::Decode(format!("queues.status: {e}")))?,
        settings: settings.0,
        total_count: total_count.max(0) as u64,
        current_count: current_count.max(0) as u64,
        complete_percentage: row.try_get("complete_percentage").map_err(decode)?,
        error_status: row.try_get("error_status").map_err(decode)?,
        run: run.max(0) as u32,
        created_at,
        updated_at,
    })
}

fn log_from_row(row: &PgRow) -> Result<QueueLog, QueueStoreError> {
    let decode = |e: sqlx::Error| QueueStoreError::Decode(e.to_string());

    let status: String = row.try_get("status").map_err(decode)?;
    let params: Json<JsonMap> = row.try_get("params").map_err(decode)?;

    Ok(QueueLog {
        id: QueueLogId::from_uuid(row.try_get("id").map_err(decode)?),
        queue_id: QueueId::from_uuid(row.try_get("queue_id").map_err(decode)?),
        params: params.0,
        message: row.try_get("message").map_err(decode)?,
        status: status
            .parse()
            .map_err(|e| QueueStoreError::Decode(format!("queue_logs.status: {e}")))?,
        error_status: row.try_get("error_status").map_err(decode)?,
        created_at: row.try_get("created_at").map_err(decode)?,
        updated_at: row.try_get("updated_at").map_err(decode)?,
    })
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> QueueStoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            QueueStoreError::Storage(format!("database error in {}: {}", operation, db_err.message()))
        }
        sqlx::Error::PoolClosed => QueueStoreError::Storage(format!("connection pool closed in {}", operation)),
        sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
            QueueStoreError::Decode(format!("{}: {}", operation, err))
        }
        _ => QueueStoreError::Storage(format!("sqlx error in {}: {}", operation, err)),
    }
}
