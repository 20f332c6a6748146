//! Run outcome and statistics types for the scheduler

use std::time::Duration;

/// How a run ended when no unit exhausted its retries
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Both queues drained
    Completed,

    /// The soft deadline passed with work left over
    TimedOut { elapsed: Duration, unfinished: usize },
}

/// Statistics for the scheduler
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SchedulerStats {
    /// First submissions
    pub total_submitted: u64,
    /// Submissions after a remote failure
    pub total_resubmitted: u64,
    pub total_completed: u64,
    /// Status checks or submissions that failed at the I/O level
    pub total_service_errors: u64,
    pub peak_concurrent: usize,
}

/// Summary of a `run_to_completion` call
#[derive(Debug, Clone)]
pub struct RunReport {
    pub outcome: RunOutcome,
    /// Poll cycles executed
    pub cycles: u64,
    pub elapsed: Duration,
    pub stats: SchedulerStats,
}
