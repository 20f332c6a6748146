//! Schedulable units of remote work

use hourledger::SlotRef;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use uuid::Uuid;

use crate::service::QueryRequest;

/// Unique identifier for a unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UnitId(Uuid);

impl UnitId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for UnitId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for UnitId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Scheduling precedence; a lower value runs first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Priority(pub u8);

impl Priority {
    /// Setup and cleanup steps that dependent queries wait on
    pub const SETUP: Priority = Priority(0);
    /// Ordinary hourly queries
    pub const QUERY: Priority = Priority(1);
}

impl Default for Priority {
    fn default() -> Self {
        Self::QUERY
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where a query executes on the remote service
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionContext {
    pub database: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workgroup: Option<String>,
}

/// An hourly query filling one ledger slot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryJob {
    pub sql: String,
    pub destination: String,
    pub context: ExecutionContext,
    pub slot: SlotRef,
}

/// A destructive setup query that dependent queries wait on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetupJob {
    pub sql: String,
    pub destination: String,
    pub context: ExecutionContext,
}

/// Job-specific parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Query(QueryJob),
    Setup(SetupJob),
}

impl Payload {
    /// The ledger slot this job fills, if any
    pub fn slot(&self) -> Option<SlotRef> {
        match self {
            Payload::Query(job) => Some(job.slot),
            Payload::Setup(_) => None,
        }
    }

    /// Build the remote submission for this payload
    pub fn to_request(&self) -> QueryRequest {
        let (sql, destination, context) = match self {
            Payload::Query(job) => (&job.sql, &job.destination, &job.context),
            Payload::Setup(job) => (&job.sql, &job.destination, &job.context),
        };
        QueryRequest {
            query: sql.clone(),
            destination: destination.clone(),
            context: context.clone(),
        }
    }
}

/// One schedulable remote job plus its execution state
#[derive(Debug, Clone)]
pub struct Unit {
    pub id: UnitId,
    pub name: String,
    pub priority: Priority,
    pub payload: Payload,
    /// Remote job id of the latest submission
    pub remote_id: Option<String>,
    pub retry_count: u32,
    pub completed: bool,
    pub last_error: Option<String>,
    pub submitted_at: Option<Instant>,
}

impl Unit {
    pub fn new(name: impl Into<String>, priority: Priority, payload: Payload) -> Self {
        Self {
            id: UnitId::new(),
            name: name.into(),
            priority,
            payload,
            remote_id: None,
            retry_count: 0,
            completed: false,
            last_error: None,
            submitted_at: None,
        }
    }

    /// An hourly query unit at `Priority::QUERY`
    pub fn query(name: impl Into<String>, job: QueryJob) -> Self {
        Self::new(name, Priority::QUERY, Payload::Query(job))
    }

    /// A setup unit at `Priority::SETUP`
    pub fn setup(name: impl Into<String>, job: SetupJob) -> Self {
        Self::new(name, Priority::SETUP, Payload::Setup(job))
    }

    pub fn slot(&self) -> Option<SlotRef> {
        self.payload.slot()
    }
}
