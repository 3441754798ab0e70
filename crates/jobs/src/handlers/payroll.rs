use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use payforge_core::TenantId;

use crate::error::JobError;
use crate::handler::JobHandler;
use crate::handlers::timekeeping::required_date_range;
use crate::types::{NewQueueLog, Queue, QueueLog};

/// Computes payslips for a date range.
#[async_trait]
pub trait PayrollProcessor: Send + Sync {
    /// Employees with timekeeping in the range.
    async fn employees(&self, tenant_id: TenantId, date_range_id: &str) -> anyhow::Result<Vec<String>>;

    async fn compute_payroll(&self, tenant_id: TenantId, date_range_id: &str, employee_id: &str) -> anyhow::Result<()>;
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EmployeeParams {
    date_range_id: String,
    employee_id: String,
}

/// `PAYROLL_PROCESSING`: one unit per employee in `settings.dateRangeId`.
pub struct PayrollHandler {
    processor: Arc<dyn PayrollProcessor>,
}

impl PayrollHandler {
    pub fn new(processor: Arc<dyn PayrollProcessor>) -> Self {
        Self { processor }
    }
}

#[async_trait]
impl JobHandler for PayrollHandler {
    async fn initialize(&self, queue: &Queue) -> Result<Vec<NewQueueLog>, JobError> {
        let date_range_id = required_date_range(queue)?;
        let employees = self.processor.employees(queue.tenant_id, &date_range_id).await?;

        employees
            .into_iter()
            .map(|employee_id| {
                let message = format!("Payroll for {employee_id}");
                NewQueueLog::from_params(
                    message,
                    &EmployeeParams {
                        date_range_id: date_range_id.clone(),
                        employee_id,
                    },
                )
            })
            .collect()
    }

    async fn process_one(&self, queue: &Queue, log: &QueueLog) -> Result<(), JobError> {
        let params: EmployeeParams = log.parse_params()?;
        self.processor
            .compute_payroll(queue.tenant_id, &params.date_range_id, &params.employee_id)
            .await
            .map_err(|e| JobError::Other(e.context(format!("employee {}", params.employee_id))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{JobType, JsonMap};
    use serde_json::json;

    struct FakePayroll;

    #[async_trait]
    impl PayrollProcessor for FakePayroll {
        async fn employees(&self, _tenant_id: TenantId, _date_range_id: &str) -> anyhow::Result<Vec<String>> {
            Ok(vec!["E-1".into(), "E-2".into(), "E-3".into()])
        }

        async fn compute_payroll(&self, _tenant_id: TenantId, _date_range_id: &str, employee_id: &str) -> anyhow::Result<()> {
            anyhow::ensure!(employee_id != "E-2", "no rate configured");
            Ok(())
        }
    }

    #[tokio::test]
    async fn one_unit_per_employee_with_contextual_failures() {
        let handler = PayrollHandler::new(Arc::new(FakePayroll));
        let settings: JsonMap = serde_json::from_value(json!({ "dateRangeId": 17 })).unwrap();
        let queue = Queue::new(TenantId::new(), "Payroll", JobType::PayrollProcessing, settings);

        let units = handler.initialize(&queue).await.unwrap();
        assert_eq!(units.len(), 3);
        assert_eq!(units[0].params["dateRangeId"], "17");

        let failing = QueueLog::new(queue.id, units[1].clone());
        let err = handler.process_one(&queue, &failing).await.unwrap_err();
        assert_eq!(err.detail(), "employee E-2: no rate configured");

        let passing = QueueLog::new(queue.id, units[2].clone());
        assert!(handler.process_one(&queue, &passing).await.is_ok());
    }
}
