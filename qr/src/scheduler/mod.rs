//! Scheduler for remote query units
//!
//! Admits units into a bounded active set under a priority barrier, polls
//! them to completion, retries failures and enforces a soft deadline in a
//! single cooperative polling loop.

mod config;
mod core;
mod queue;

pub use config::SchedulerConfig;
pub use core::Scheduler;
pub use queue::{RunOutcome, RunReport, SchedulerStats};
