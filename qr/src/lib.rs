//! QueryRunner - resumable runner for hourly remote SQL jobs
//!
//! Each configured step keeps a day/hour progress ledger in object storage.
//! A run grows the ledger for the current time, renders one query per
//! outstanding hour and drives them through a concurrency-capped scheduler
//! against a remote query service, recording progress as it goes.
//!
//! # Modules
//!
//! - [`scheduler`] - Dual-queue admission, priority barrier, retries, soft timeout
//! - [`service`] - Remote query service trait and HTTP client
//! - [`store`] - Object storage for templates and ledger snapshots
//! - [`progress`] - Ledger persistence driven by scheduler events
//! - [`coordinator`] - Per-step orchestration
//! - [`config`] - Configuration types and loading
//! - [`cli`] - Command-line interface

pub mod alert;
pub mod cli;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod lock;
pub mod progress;
pub mod scheduler;
pub mod service;
pub mod store;
pub mod template;
pub mod unit;

// Re-export commonly used types
pub use alert::{Alerter, LogAlerter, WebhookAlerter};
pub use config::{Config, SetupConfig, StepConfig};
pub use coordinator::{Coordinator, StepOutcome, StepPlan};
pub use error::{SchedulerError, ServiceError, StoreError, TemplateError};
pub use lock::RunLock;
pub use progress::{LedgerRecorder, ProgressRecorder};
pub use scheduler::{RunOutcome, RunReport, Scheduler, SchedulerConfig, SchedulerStats};
pub use service::{HttpQueryService, JobState, JobStatus, QueryRequest, QueryService};
pub use store::{LocalObjectStore, MemoryObjectStore, ObjectStore};
pub use unit::{Payload, Priority, QueryJob, SetupJob, Unit, UnitId};
