//! Scheduler configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Scheduler configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SchedulerConfig {
    /// Max simultaneously submitted remote jobs
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Resubmissions allowed per unit before the run is aborted
    #[serde(default = "default_retry_limit")]
    pub retry_limit: u32,

    /// Soft deadline for the whole run
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Sleep between poll cycles
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
}

fn default_max_concurrency() -> usize {
    3
}

fn default_retry_limit() -> u32 {
    3
}

fn default_timeout_secs() -> u64 {
    600
}

fn default_poll_interval_secs() -> u64 {
    10
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_concurrency: default_max_concurrency(),
            retry_limit: default_retry_limit(),
            timeout_secs: default_timeout_secs(),
            poll_interval_secs: default_poll_interval_secs(),
        }
    }
}

impl SchedulerConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}
