//! QueryService trait definition

use async_trait::async_trait;

use super::{JobStatus, QueryRequest};
use crate::error::ServiceError;

/// Remote query-execution service
///
/// Each submission is an independent remote job. Status is polled by the
/// scheduler; nothing is pushed back to the caller.
#[async_trait]
pub trait QueryService: Send + Sync {
    /// Start a query, returning the remote job id
    async fn submit(&self, request: &QueryRequest) -> Result<String, ServiceError>;

    /// Current state of a submitted job
    async fn get_status(&self, job_id: &str) -> Result<JobStatus, ServiceError>;

    /// Best-effort cancellation
    async fn cancel(&self, job_id: &str) -> Result<(), ServiceError>;
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use std::collections::{HashMap, VecDeque};
    use std::sync::Mutex;
    use tracing::debug;

    use crate::service::JobState;

    /// Observable interaction with the mock, in call order
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum MockEvent {
        Submitted { job_id: String, query: String },
        Polled { job_id: String, state: JobState },
        Cancelled { job_id: String },
    }

    #[derive(Default)]
    struct MockState {
        /// Per query text: one status sequence per attempt
        scripts: HashMap<String, VecDeque<Vec<JobState>>>,
        /// Per job id: remaining statuses, the last one repeats
        jobs: HashMap<String, VecDeque<JobState>>,
        events: Vec<MockEvent>,
        next_id: usize,
        failing_submits: usize,
        failing_polls: usize,
    }

    /// Scripted query service for unit tests
    ///
    /// Unscripted queries succeed on their first poll.
    #[derive(Default)]
    pub struct MockQueryService {
        state: Mutex<MockState>,
    }

    impl MockQueryService {
        pub fn new() -> Self {
            Self::default()
        }

        /// Script successive attempts of `query`; each attempt is the
        /// sequence of states returned by its polls
        pub fn with_attempts(self, query: &str, attempts: Vec<Vec<JobState>>) -> Self {
            self.state
                .lock()
                .unwrap()
                .scripts
                .insert(query.to_string(), attempts.into_iter().collect());
            self
        }

        /// Make `query` run forever
        pub fn never_completes(self, query: &str) -> Self {
            self.with_attempts(query, vec![vec![JobState::Running]])
        }

        /// Fail the next `count` submissions with a 503
        pub fn fail_next_submits(&self, count: usize) {
            self.state.lock().unwrap().failing_submits = count;
        }

        /// Fail the next `count` status polls with a 503
        pub fn fail_next_polls(&self, count: usize) {
            self.state.lock().unwrap().failing_polls = count;
        }

        pub fn events(&self) -> Vec<MockEvent> {
            self.state.lock().unwrap().events.clone()
        }

        /// Queries in submission order
        pub fn submitted_queries(&self) -> Vec<String> {
            self.events()
                .into_iter()
                .filter_map(|e| match e {
                    MockEvent::Submitted { query, .. } => Some(query),
                    _ => None,
                })
                .collect()
        }

        pub fn cancelled(&self) -> Vec<String> {
            self.events()
                .into_iter()
                .filter_map(|e| match e {
                    MockEvent::Cancelled { job_id } => Some(job_id),
                    _ => None,
                })
                .collect()
        }

        fn unavailable() -> ServiceError {
            ServiceError::Api {
                status: 503,
                message: "service unavailable".to_string(),
            }
        }
    }

    #[async_trait]
    impl QueryService for MockQueryService {
        async fn submit(&self, request: &QueryRequest) -> Result<String, ServiceError> {
            debug!(query = %request.query, "MockQueryService::submit: called");
            let mut state = self.state.lock().unwrap();
            if state.failing_submits > 0 {
                state.failing_submits -= 1;
                return Err(Self::unavailable());
            }
            state.next_id += 1;
            let job_id = format!("job-{}", state.next_id);
            let statuses = state
                .scripts
                .get_mut(&request.query)
                .and_then(|attempts| attempts.pop_front())
                .unwrap_or_else(|| vec![JobState::Succeeded]);
            state.jobs.insert(job_id.clone(), statuses.into_iter().collect());
            state.events.push(MockEvent::Submitted {
                job_id: job_id.clone(),
                query: request.query.clone(),
            });
            Ok(job_id)
        }

        async fn get_status(&self, job_id: &str) -> Result<JobStatus, ServiceError> {
            debug!(%job_id, "MockQueryService::get_status: called");
            let mut state = self.state.lock().unwrap();
            if state.failing_polls > 0 {
                state.failing_polls -= 1;
                return Err(Self::unavailable());
            }
            let statuses = state
                .jobs
                .get_mut(job_id)
                .ok_or_else(|| ServiceError::InvalidResponse(format!("unknown job {}", job_id)))?;
            let current = if statuses.len() > 1 {
                statuses.pop_front()
            } else {
                statuses.front().copied()
            }
            .unwrap_or(JobState::Running);
            state.events.push(MockEvent::Polled {
                job_id: job_id.to_string(),
                state: current,
            });
            Ok(JobStatus {
                state: current,
                reason: current.is_failure().then(|| format!("{} by script", current)),
                stats: None,
            })
        }

        async fn cancel(&self, job_id: &str) -> Result<(), ServiceError> {
            debug!(%job_id, "MockQueryService::cancel: called");
            self.state.lock().unwrap().events.push(MockEvent::Cancelled {
                job_id: job_id.to_string(),
            });
            Ok(())
        }
    }
}
