//! Formatted representations returned to callers.

use chrono::{DateTime, Utc};
use serde::Serialize;

use payforge_core::{QueueId, QueueLogId};
use payforge_jobs::{JobType, JsonMap, Queue, QueueLog, QueueLogStatus, QueueStatus};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueView {
    pub id: QueueId,
    pub name: String,
    #[serde(rename = "type")]
    pub job_type: JobType,
    pub status: QueueStatus,
    pub settings: JsonMap,
    pub total_count: u64,
    pub current_count: u64,
    pub complete_percentage: f64,
    pub error_status: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logs: Option<Vec<QueueLogView>>,
}

impl QueueView {
    pub fn with_logs(mut self, logs: Vec<QueueLog>) -> Self {
        self.logs = Some(logs.into_iter().map(QueueLogView::from).collect());
        self
    }
}

impl From<Queue> for QueueView {
    fn from(q: Queue) -> Self {
        Self {
            id: q.id,
            name: q.name,
            job_type: q.job_type,
            status: q.status,
            settings: q.settings,
            total_count: q.total_count,
            current_count: q.current_count,
            complete_percentage: q.complete_percentage,
            error_status: q.error_status,
            created_at: q.created_at,
            updated_at: q.updated_at,
            logs: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueLogView {
    pub id: QueueLogId,
    pub message: String,
    pub params: JsonMap,
    pub status: QueueLogStatus,
    pub error_status: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<QueueLog> for QueueLogView {
    fn from(l: QueueLog) -> Self {
        Self {
            id: l.id,
            message: l.message,
            params: l.params,
            status: l.status,
            error_status: l.error_status,
            created_at: l.created_at,
            updated_at: l.updated_at,
        }
    }
}

/// Row of the queue table listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueSummary {
    pub id: QueueId,
    pub name: String,
    #[serde(rename = "type")]
    pub job_type: JobType,
    pub status: QueueStatus,
    pub total_count: u64,
    pub current_count: u64,
    pub complete_percentage: f64,
    pub error_status: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<Queue> for QueueSummary {
    fn from(q: Queue) -> Self {
        Self {
            id: q.id,
            name: q.name,
            job_type: q.job_type,
            status: q.status,
            total_count: q.total_count,
            current_count: q.current_count,
            complete_percentage: q.complete_percentage,
            error_status: q.error_status,
            created_at: q.created_at,
        }
    }
}
