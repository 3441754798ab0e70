use std::time::Duration;

use thiserror::Error;

/// Failure raised by a job handler. The orchestrator records [`JobError::detail`]
/// as the `error_status` of the queue (during initialization) or of the log
/// (during processing).
#[derive(Debug, Error)]
pub enum JobError {
    #[error("invalid settings: {0}")]
    InvalidSettings(String),

    #[error("invalid params: {0}")]
    InvalidParams(String),

    #[error("{0}")]
    Failed(String),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl JobError {
    pub fn failed(msg: impl Into<String>) -> Self {
        Self::Failed(msg.into())
    }

    /// Human-readable detail, including the cause chain for wrapped errors.
    pub fn detail(&self) -> String {
        match self {
            JobError::Other(err) => format!("{err:#}"),
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn detail_includes_cause_chain() {
        let err: anyhow::Result<()> = Err(anyhow::anyhow!("connection refused"));
        let err = JobError::from(err.context("loading employee rows").unwrap_err());
        assert_eq!(err.detail(), "loading employee rows: connection refused");
    }

    #[test]
    fn detail_of_plain_variants_is_display() {
        assert_eq!(
            JobError::InvalidSettings("missing fileId".into()).detail(),
            "invalid settings: missing fileId"
        );
        assert_eq!(
            JobError::Timeout(Duration::from_millis(250)).detail(),
            "timed out after 250ms"
        );
    }
}
