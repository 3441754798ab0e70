use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use payforge_core::{QueueId, TenantId};
use payforge_infra::files::UploadedFile;
use payforge_jobs::{JobType, JsonMap, QueueStatus};

use crate::app::errors;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct CreateQueueRequest {
    pub name: String,
    #[serde(rename = "type")]
    pub job_type: String,
    #[serde(default)]
    pub settings: JsonMap,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReinitializeQueueRequest {
    pub queue_id: String,
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct QueueInfoQuery {
    pub id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct QueueTableQuery {
    pub page: Option<String>,
    pub limit: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UploadFileRequest {
    pub name: String,
    #[serde(default)]
    pub rows: Vec<JsonValue>,
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedFileResponse {
    pub id: String,
    pub tenant_id: TenantId,
    pub name: String,
    pub row_count: usize,
}

impl From<UploadedFile> for UploadedFileResponse {
    fn from(f: UploadedFile) -> Self {
        Self {
            id: f.id.to_string(),
            tenant_id: f.tenant_id,
            name: f.name,
            row_count: f.rows.len(),
        }
    }
}

// -------------------------
// Parsing helpers
// -------------------------

pub fn parse_job_type(raw: &str) -> Result<JobType, axum::response::Response> {
    raw.parse().map_err(|_| {
        let allowed: Vec<&str> = JobType::ALL.iter().map(|t| t.as_str()).collect();
        errors::json_error(
            axum::http::StatusCode::BAD_REQUEST,
            "unsupported_type",
            format!("type must be one of: {}", allowed.join(", ")),
        )
    })
}

pub fn parse_queue_status(raw: &str) -> Result<QueueStatus, axum::response::Response> {
    raw.parse().map_err(|e: payforge_core::DomainError| {
        errors::json_error(axum::http::StatusCode::BAD_REQUEST, "invalid_status", e.to_string())
    })
}

pub fn parse_queue_id(raw: Option<&str>) -> Result<QueueId, axum::response::Response> {
    let raw = raw.ok_or_else(|| {
        errors::json_error(axum::http::StatusCode::BAD_REQUEST, "invalid_id", "queue id is required")
    })?;
    raw.parse()
        .map_err(|_| errors::json_error(axum::http::StatusCode::BAD_REQUEST, "invalid_id", "invalid queue id"))
}
