//! Remote query-execution service
//!
//! The runner never executes SQL itself; it submits queries to a remote
//! service, polls their status and cancels them on abort.

mod client;
mod http;
mod types;

pub use client::QueryService;
pub use http::HttpQueryService;
pub use types::{JobState, JobStats, JobStatus, QueryRequest};

#[cfg(test)]
pub use client::mock;
