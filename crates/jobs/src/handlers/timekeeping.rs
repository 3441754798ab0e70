use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use payforge_core::TenantId;

use crate::error::JobError;
use crate::handler::JobHandler;
use crate::types::{NewQueueLog, Queue, QueueLog, CONTEXT_ID_KEY};

/// One employee on one calendar day of a date range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeDay {
    pub employee_id: String,
    pub date: NaiveDate,
}

/// Groups raw attendance into per-employee-day timekeeping records.
#[async_trait]
pub trait TimekeepingProcessor: Send + Sync {
    async fn employee_days(&self, tenant_id: TenantId, date_range_id: &str) -> anyhow::Result<Vec<EmployeeDay>>;

    async fn process_day(&self, tenant_id: TenantId, date_range_id: &str, day: &EmployeeDay) -> anyhow::Result<()>;
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DayParams {
    date_range_id: String,
    #[serde(flatten)]
    day: EmployeeDay,
}

/// `TIMEKEEPING_PROCESSING`: one unit per employee-day in `settings.dateRangeId`.
pub struct TimekeepingHandler {
    processor: Arc<dyn TimekeepingProcessor>,
}

impl TimekeepingHandler {
    pub fn new(processor: Arc<dyn TimekeepingProcessor>) -> Self {
        Self { processor }
    }
}

pub(crate) fn required_date_range(queue: &Queue) -> Result<String, JobError> {
    queue
        .context_id()
        .ok_or_else(|| JobError::InvalidSettings(format!("{} requires {CONTEXT_ID_KEY}", queue.job_type)))
}

#[async_trait]
impl JobHandler for TimekeepingHandler {
    async fn initialize(&self, queue: &Queue) -> Result<Vec<NewQueueLog>, JobError> {
        let date_range_id = required_date_range(queue)?;
        let days = self.processor.employee_days(queue.tenant_id, &date_range_id).await?;

        days.into_iter()
            .map(|day| {
                let message = format!("Timekeeping {} on {}", day.employee_id, day.date);
                NewQueueLog::from_params(
                    message,
                    &DayParams {
                        date_range_id: date_range_id.clone(),
                        day,
                    },
                )
            })
            .collect()
    }

    async fn process_one(&self, queue: &Queue, log: &QueueLog) -> Result<(), JobError> {
        let params: DayParams = log.parse_params()?;
        self.processor
            .process_day(queue.tenant_id, &params.date_range_id, &params.day)
            .await?;
        Ok(())
    }
}
