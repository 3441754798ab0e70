//! Queue and queue-log records.

use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use payforge_core::{DomainError, QueueId, QueueLogId, TenantId};

use crate::error::JobError;

/// Free-form key/value payload (queue settings, log params).
pub type JsonMap = serde_json::Map<String, JsonValue>;

/// Settings key carrying the date-range identifier progress updates are scoped to.
pub const CONTEXT_ID_KEY: &str = "dateRangeId";

/// Settings key referencing an uploaded file.
pub const FILE_ID_KEY: &str = "fileId";

/// Which handler applies to a queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobType {
    EmployeeImportation,
    TimekeepingProcessing,
    PayrollProcessing,
}

impl JobType {
    pub const ALL: [JobType; 3] = [
        JobType::EmployeeImportation,
        JobType::TimekeepingProcessing,
        JobType::PayrollProcessing,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobType::EmployeeImportation => "EMPLOYEE_IMPORTATION",
            JobType::TimekeepingProcessing => "TIMEKEEPING_PROCESSING",
            JobType::PayrollProcessing => "PAYROLL_PROCESSING",
        }
    }
}

impl core::fmt::Display for JobType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        JobType::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| DomainError::validation(format!("unknown job type: {wanted}")))
    }
}

/// Queue lifecycle: PENDING → PROCESSING → {COMPLETED | INCOMPLETE | FAILED}.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QueueStatus {
    /// Created, waiting for initialization
    Pending,
    /// Initialized; logs are being drained
    Processing,
    /// Drained without any failed log
    Completed,
    /// Drained with at least one failed log
    Incomplete,
    /// Initialization failed
    Failed,
}

impl QueueStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueueStatus::Pending => "PENDING",
            QueueStatus::Processing => "PROCESSING",
            QueueStatus::Completed => "COMPLETED",
            QueueStatus::Incomplete => "INCOMPLETE",
            QueueStatus::Failed => "FAILED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            QueueStatus::Completed | QueueStatus::Incomplete | QueueStatus::Failed
        )
    }
}

impl core::fmt::Display for QueueStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QueueStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PENDING" => Ok(QueueStatus::Pending),
            "PROCESSING" => Ok(QueueStatus::Processing),
            "COMPLETED" => Ok(QueueStatus::Completed),
            "INCOMPLETE" => Ok(QueueStatus::Incomplete),
            "FAILED" => Ok(QueueStatus::Failed),
            other => Err(DomainError::validation(format!("unknown queue status: {other}"))),
        }
    }
}

/// Queue log lifecycle: PENDING → PROCESSING → {COMPLETED | FAILED}.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QueueLogStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl QueueLogStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueueLogStatus::Pending => "PENDING",
            QueueLogStatus::Processing => "PROCESSING",
            QueueLogStatus::Completed => "COMPLETED",
            QueueLogStatus::Failed => "FAILED",
        }
    }
}

impl core::fmt::Display for QueueLogStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QueueLogStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PENDING" => Ok(QueueLogStatus::Pending),
            "PROCESSING" => Ok(QueueLogStatus::Processing),
            "COMPLETED" => Ok(QueueLogStatus::Completed),
            "FAILED" => Ok(QueueLogStatus::Failed),
            other => Err(DomainError::validation(format!("unknown queue log status: {other}"))),
        }
    }
}

/// `floor(current / total * 100) / 100`, i.e. the completed fraction truncated
/// to two decimals. Zero when nothing has been enumerated yet.
pub fn complete_percentage(current: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let current = u128::from(current.min(total));
    let hundredths = current * 100 / u128::from(total);
    hundredths as f64 / 100.0
}

/// One background job instance and its aggregate progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Queue {
    pub id: QueueId,
    pub tenant_id: TenantId,
    pub name: String,
    #[serde(rename = "type")]
    pub job_type: JobType,
    pub status: QueueStatus,
    /// Interpreted only by the matching handler.
    pub settings: JsonMap,
    pub total_count: u64,
    pub current_count: u64,
    /// Cached; always derived from the two counts.
    pub complete_percentage: f64,
    /// Populated only when initialization failed.
    pub error_status: Option<String>,
    /// Bumped by every initialization; writes made on behalf of a batch
    /// carry the run they were started in.
    #[serde(default)]
    pub run: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Queue {
    /// Create a new PENDING queue.
    pub fn new(tenant_id: TenantId, name: impl Into<String>, job_type: JobType, settings: JsonMap) -> Self {
        let now = Utc::now();
        Self {
            id: QueueId::new(),
            tenant_id,
            name: name.into(),
            job_type,
            status: QueueStatus::Pending,
            settings,
            total_count: 0,
            current_count: 0,
            complete_percentage: 0.0,
            error_status: None,
            run: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// A settings value rendered as an identifier (strings as-is, numbers in decimal).
    pub fn setting_id(&self, key: &str) -> Option<String> {
        match self.settings.get(key)? {
            JsonValue::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            JsonValue::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    /// The context progress notifications are scoped to, if the settings carry one.
    pub fn context_id(&self) -> Option<String> {
        self.setting_id(CONTEXT_ID_KEY)
    }

    /// Deserialize the settings into a handler-specific shape.
    pub fn parse_settings<T: DeserializeOwned>(&self) -> Result<T, JobError> {
        serde_json::from_value(JsonValue::Object(self.settings.clone()))
            .map_err(|e| JobError::InvalidSettings(format!("{} settings: {e}", self.job_type)))
    }

    /// End of initialization: fix the total for this run and start draining.
    pub fn mark_initialized(&mut self, total_count: u64) {
        self.total_count = total_count;
        self.current_count = 0;
        self.complete_percentage = 0.0;
        self.error_status = None;
        self.run = self.run.saturating_add(1);
        self.status = QueueStatus::Processing;
        self.updated_at = Utc::now();
    }

    /// Count `processed` more units as done. Never exceeds `total_count`.
    pub fn advance(&mut self, processed: u64) {
        self.current_count = self.current_count.saturating_add(processed).min(self.total_count);
        self.complete_percentage = complete_percentage(self.current_count, self.total_count);
        self.updated_at = Utc::now();
    }

    pub fn set_status(&mut self, status: QueueStatus, error_status: Option<String>) {
        self.status = status;
        self.error_status = error_status;
        self.updated_at = Utc::now();
    }
}

/// A unit of work enumerated by a handler's `initialize`, not yet persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewQueueLog {
    pub message: String,
    pub params: JsonMap,
}

impl NewQueueLog {
    pub fn new(message: impl Into<String>, params: JsonMap) -> Self {
        Self {
            message: message.into(),
            params,
        }
    }

    /// Build from a typed params struct (must serialize to a JSON object).
    pub fn from_params<P: Serialize>(message: impl Into<String>, params: &P) -> Result<Self, JobError> {
        match serde_json::to_value(params) {
            Ok(JsonValue::Object(map)) => Ok(Self::new(message, map)),
            Ok(other) => Err(JobError::InvalidParams(format!(
                "params must be a JSON object, got {other}"
            ))),
            Err(e) => Err(JobError::InvalidParams(e.to_string())),
        }
    }
}

/// One unit of work belonging to exactly one queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueLog {
    pub id: QueueLogId,
    pub queue_id: QueueId,
    /// Input to `process_one`; handler-specific shape.
    pub params: JsonMap,
    /// Human-readable description for progress UIs.
    pub message: String,
    pub status: QueueLogStatus,
    /// Failure detail when `status` is FAILED.
    pub error_status: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl QueueLog {
    pub fn new(queue_id: QueueId, unit: NewQueueLog) -> Self {
        let now = Utc::now();
        Self {
            id: QueueLogId::new(),
            queue_id,
            params: unit.params,
            message: unit.message,
            status: QueueLogStatus::Pending,
            error_status: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn parse_params<T: DeserializeOwned>(&self) -> Result<T, JobError> {
        serde_json::from_value(JsonValue::Object(self.params.clone()))
            .map_err(|e| JobError::InvalidParams(format!("log {}: {e}", self.id)))
    }

    pub fn finish(&mut self, outcome: LogOutcome) {
        match outcome {
            LogOutcome::Completed => {
                self.status = QueueLogStatus::Completed;
                self.error_status = None;
            }
            LogOutcome::Failed(detail) => {
                self.status = QueueLogStatus::Failed;
                self.error_status = Some(detail);
            }
        }
        self.updated_at = Utc::now();
    }
}

/// How a claimed log settled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogOutcome {
    Completed,
    Failed(String),
}

impl LogOutcome {
    pub fn status(&self) -> QueueLogStatus {
        match self {
            LogOutcome::Completed => QueueLogStatus::Completed,
            LogOutcome::Failed(_) => QueueLogStatus::Failed,
        }
    }

    pub fn error_status(&self) -> Option<&str> {
        match self {
            LogOutcome::Completed => None,
            LogOutcome::Failed(detail) => Some(detail),
        }
    }
}
