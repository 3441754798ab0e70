//! Orchestrator settings read from the environment.

use std::time::Duration;

pub const BATCH_SIZE_VAR: &str = "QUEUE_BATCH_SIZE";
pub const POLL_INTERVAL_VAR: &str = "QUEUE_POLL_INTERVAL_MS";
pub const UNIT_TIMEOUT_VAR: &str = "QUEUE_UNIT_TIMEOUT_MS";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueConfig {
    /// Max logs drained per queue per processing pass.
    pub batch_size: usize,
    /// Delay between passes of each cycle.
    pub poll_interval: Duration,
    /// Upper bound for one `process_one` call; `None` waits indefinitely.
    pub unit_timeout: Option<Duration>,
}

impl QueueConfig {
    pub const DEFAULT_BATCH_SIZE: usize = 5;
    pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source. Unparseable or zero values fall
    /// back to the defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let batch_size = positive(BATCH_SIZE_VAR, lookup(BATCH_SIZE_VAR).as_deref())
            .map(|n| n as usize)
            .unwrap_or(Self::DEFAULT_BATCH_SIZE);
        let poll_interval = positive(POLL_INTERVAL_VAR, lookup(POLL_INTERVAL_VAR).as_deref())
            .map(Duration::from_millis)
            .unwrap_or(Self::DEFAULT_POLL_INTERVAL);
        let unit_timeout =
            positive(UNIT_TIMEOUT_VAR, lookup(UNIT_TIMEOUT_VAR).as_deref()).map(Duration::from_millis);

        Self {
            batch_size,
            poll_interval,
            unit_timeout,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = if batch_size == 0 {
            Self::DEFAULT_BATCH_SIZE
        } else {
            batch_size
        };
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_unit_timeout(mut self, unit_timeout: Option<Duration>) -> Self {
        self.unit_timeout = unit_timeout;
        self
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            batch_size: Self::DEFAULT_BATCH_SIZE,
            poll_interval: Self::DEFAULT_POLL_INTERVAL,
            unit_timeout: None,
        }
    }
}

fn positive(key: &str, raw: Option<&str>) -> Option<u64> {
    let raw = raw?.trim();
    if raw.is_empty() {
        return None;
    }
    match raw.parse::<u64>() {
        Ok(0) => {
            tracing::warn!(key, "zero is not allowed, using default");
            None
        }
        Ok(n) => Some(n),
        Err(_) => {
            tracing::warn!(key, value = raw, "unparseable value, using default");
            None
        }
    }
}
