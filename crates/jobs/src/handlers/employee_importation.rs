use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use payforge_core::{FileId, TenantId};

use crate::error::JobError;
use crate::handler::JobHandler;
use crate::types::{NewQueueLog, Queue, QueueLog};

/// Reads uploaded spreadsheets and upserts one employee per row.
#[async_trait]
pub trait EmployeeImporter: Send + Sync {
    /// Data rows of the uploaded file, header excluded.
    async fn read_rows(&self, tenant_id: TenantId, file_id: FileId) -> anyhow::Result<Vec<JsonValue>>;

    async fn import_row(&self, tenant_id: TenantId, row: &JsonValue) -> anyhow::Result<()>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImportSettings {
    file_id: FileId,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RowParams {
    file_id: FileId,
    /// 1-based, counting data rows only.
    row_number: usize,
    row: JsonValue,
}

/// `EMPLOYEE_IMPORTATION`: one unit per spreadsheet row.
pub struct EmployeeImportationHandler {
    importer: Arc<dyn EmployeeImporter>,
}

impl EmployeeImportationHandler {
    pub fn new(importer: Arc<dyn EmployeeImporter>) -> Self {
        Self { importer }
    }
}

#[async_trait]
impl JobHandler for EmployeeImportationHandler {
    async fn initialize(&self, queue: &Queue) -> Result<Vec<NewQueueLog>, JobError> {
        let settings: ImportSettings = queue.parse_settings()?;
        let rows = self.importer.read_rows(queue.tenant_id, settings.file_id).await?;

        tracing::debug!(
            queue_id = %queue.id,
            file_id = %settings.file_id,
            rows = rows.len(),
            "employee file expanded"
        );

        rows.into_iter()
            .enumerate()
            .map(|(idx, row)| {
                let params = RowParams {
                    file_id: settings.file_id,
                    row_number: idx + 1,
                    row,
                };
                NewQueueLog::from_params(format!("Import row {}", params.row_number), &params)
            })
            .collect()
    }

    async fn process_one(&self, queue: &Queue, log: &QueueLog) -> Result<(), JobError> {
        let params: RowParams = log.parse_params()?;
        self.importer
            .import_row(queue.tenant_id, &params.row)
            .await
            .map_err(|e| JobError::Other(e.context(format!("row {}", params.row_number))))
    }
}
