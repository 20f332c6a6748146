//! Scheduler implementation

use std::collections::VecDeque;
use std::sync::Arc;

use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::error::SchedulerError;
use crate::progress::ProgressRecorder;
use crate::service::{JobState, QueryService};
use crate::unit::{Priority, Unit, UnitId};

use super::config::SchedulerConfig;
use super::queue::{RunOutcome, RunReport, SchedulerStats};

/// Dual-queue admission controller for remote jobs
///
/// Units wait in `pending` in arrival order and move into `active` (at most
/// `max_concurrency` of them) when the head passes the priority barrier.
/// Active units are polled every cycle; failures are resubmitted up to
/// `retry_limit` times.
pub struct Scheduler {
    config: SchedulerConfig,
    service: Arc<dyn QueryService>,
    pending: VecDeque<Unit>,
    active: Vec<Unit>,
    /// While set, at most one unit is active
    serialize_mode: bool,
    /// Unit whose success clears `serialize_mode`
    prerequisite: Option<UnitId>,
    stats: SchedulerStats,
}

impl Scheduler {
    pub fn new(config: SchedulerConfig, service: Arc<dyn QueryService>) -> Self {
        debug!(?config, "Scheduler::new: called");
        Self {
            config,
            service,
            pending: VecDeque::new(),
            active: Vec::new(),
            serialize_mode: false,
            prerequisite: None,
            stats: SchedulerStats::default(),
        }
    }

    /// Append a unit to the pending backlog
    pub fn submit(&mut self, unit: Unit) {
        debug!(unit = %unit.name, priority = %unit.priority, "Scheduler::submit: called");
        self.pending.push_back(unit);
    }

    /// Append a prerequisite unit and run it alone
    ///
    /// Nothing else is admitted until it is observed succeeded.
    pub fn enforce_ordering(&mut self, unit: Unit) {
        debug!(unit = %unit.name, priority = %unit.priority, "Scheduler::enforce_ordering: called");
        self.serialize_mode = true;
        self.prerequisite = Some(unit.id);
        self.pending.push_back(unit);
    }

    pub fn active_len(&self) -> usize {
        self.active.len()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_idle(&self) -> bool {
        self.active.is_empty() && self.pending.is_empty()
    }

    pub fn active_priorities(&self) -> Vec<Priority> {
        self.active.iter().map(|u| u.priority).collect()
    }

    pub fn serialize_mode(&self) -> bool {
        self.serialize_mode
    }

    pub fn stats(&self) -> &SchedulerStats {
        &self.stats
    }

    /// Highest priority value among active units, `None` meaning unbounded
    fn barrier(&self) -> Option<Priority> {
        self.active.iter().map(|u| u.priority).max()
    }

    /// Poll until drained, fatally failed or past the deadline
    ///
    /// `abort_all` runs on every exit path.
    pub async fn run_to_completion(
        &mut self,
        recorder: &mut dyn ProgressRecorder,
    ) -> Result<RunReport, SchedulerError> {
        debug!(pending = self.pending.len(), "Scheduler::run_to_completion: called");
        let result = self.drive(recorder).await;
        let cancelled = self.abort_all().await;
        if cancelled > 0 {
            info!(cancelled, "Cancelled active units on exit");
        }
        result
    }

    async fn drive(&mut self, recorder: &mut dyn ProgressRecorder) -> Result<RunReport, SchedulerError> {
        let start = Instant::now();
        let timeout = self.config.timeout();
        let mut cycles = 0u64;

        loop {
            if self.is_idle() {
                info!(cycles, "All units completed");
                return Ok(self.report(RunOutcome::Completed, cycles, start));
            }

            let elapsed = start.elapsed();
            if elapsed > timeout {
                let unfinished = self.active.len() + self.pending.len();
                warn!(?elapsed, unfinished, "Run timed out");
                return Ok(self.report(RunOutcome::TimedOut { elapsed, unfinished }, cycles, start));
            }

            cycles += 1;
            info!(
                cycle = cycles,
                active = self.active.len(),
                pending = self.pending.len(),
                "Poll cycle"
            );
            self.run_cycle(recorder).await?;

            debug!(interval = ?self.config.poll_interval(), "Scheduler::drive: sleeping");
            tokio::time::sleep(self.config.poll_interval()).await;
        }
    }

    fn report(&self, outcome: RunOutcome, cycles: u64, start: Instant) -> RunReport {
        RunReport {
            outcome,
            cycles,
            elapsed: start.elapsed(),
            stats: self.stats.clone(),
        }
    }

    /// One scheduling cycle: reap finished units, then fill free slots
    pub async fn run_cycle(&mut self, recorder: &mut dyn ProgressRecorder) -> Result<(), SchedulerError> {
        self.reap(recorder).await?;
        self.admit(recorder).await;
        debug!(
            active = ?self.active_priorities(),
            pending = ?self.pending.iter().map(|u| u.priority).collect::<Vec<_>>(),
            "Scheduler::run_cycle: queues"
        );
        Ok(())
    }

    /// Check every active unit once
    async fn reap(&mut self, recorder: &mut dyn ProgressRecorder) -> Result<(), SchedulerError> {
        let mut index = 0;
        while index < self.active.len() {
            let Some(remote_id) = self.active[index].remote_id.clone() else {
                // a resubmission failed last cycle
                self.trigger(index, recorder).await;
                index += 1;
                continue;
            };

            debug!(unit = %self.active[index].name, %remote_id, "Scheduler::reap: checking status");
            let status = match self.service.get_status(&remote_id).await {
                Ok(status) => status,
                Err(e) => {
                    warn!(unit = %self.active[index].name, %remote_id, error = %e, "Status check failed, retrying next cycle");
                    self.stats.total_service_errors += 1;
                    index += 1;
                    continue;
                }
            };
            recorder.on_status(&self.active[index], &status).await;

            match status.state {
                JobState::Running | JobState::Queued => {
                    index += 1;
                }
                JobState::Succeeded => {
                    let mut unit = self.active.remove(index);
                    unit.completed = true;
                    info!(
                        unit = %unit.name,
                        %remote_id,
                        retries = unit.retry_count,
                        runtime = ?unit.submitted_at.map(|t| t.elapsed()),
                        "Unit completed"
                    );
                    recorder.on_success(&unit).await;
                    self.stats.total_completed += 1;
                    if self.prerequisite == Some(unit.id) {
                        debug!(unit = %unit.name, "Scheduler::reap: prerequisite done, leaving serialize mode");
                        self.serialize_mode = false;
                        self.prerequisite = None;
                    }
                }
                JobState::Failed | JobState::Cancelled => {
                    let reason = status.failure_reason();
                    let unit = &mut self.active[index];
                    unit.last_error = Some(reason.clone());
                    if unit.retry_count < self.config.retry_limit {
                        info!(
                            unit = %unit.name,
                            attempt = unit.retry_count + 1,
                            error = %reason,
                            "Retrying unit"
                        );
                        unit.retry_count += 1;
                        unit.last_error = None;
                        self.stats.total_resubmitted += 1;
                        self.trigger(index, recorder).await;
                        index += 1;
                    } else {
                        let unit = self.active.remove(index);
                        warn!(unit = %unit.name, retries = unit.retry_count, error = %reason, "Retry limit exceeded");
                        recorder.on_failure(&unit, &reason).await;
                        return Err(SchedulerError::RetryExhausted {
                            unit_id: unit.id,
                            name: unit.name,
                            retries: unit.retry_count,
                            reason,
                        });
                    }
                }
            }
        }
        Ok(())
    }

    /// Move units from the head of `pending` into free active slots
    async fn admit(&mut self, recorder: &mut dyn ProgressRecorder) {
        while self.active.len() < self.config.max_concurrency {
            let Some(head) = self.pending.front() else {
                break;
            };
            if let Some(barrier) = self.barrier() {
                if head.priority > barrier {
                    debug!(unit = %head.name, priority = %head.priority, %barrier, "Scheduler::admit: held by priority barrier");
                    break;
                }
            }
            if self.serialize_mode && !self.active.is_empty() {
                debug!(unit = %head.name, "Scheduler::admit: held by serialize mode");
                break;
            }

            let Some(mut unit) = self.pending.pop_front() else {
                break;
            };
            match self.service.submit(&unit.payload.to_request()).await {
                Ok(remote_id) => {
                    info!(unit = %unit.name, %remote_id, priority = %unit.priority, "Started unit");
                    unit.remote_id = Some(remote_id);
                    unit.submitted_at = Some(Instant::now());
                    recorder.on_submitted(&unit).await;
                    self.active.push(unit);
                    self.stats.total_submitted += 1;
                    self.stats.peak_concurrent = self.stats.peak_concurrent.max(self.active.len());
                }
                Err(e) => {
                    warn!(unit = %unit.name, error = %e, "Submission failed, retrying next cycle");
                    self.stats.total_service_errors += 1;
                    self.pending.push_front(unit);
                    break;
                }
            }
        }
    }

    /// Resubmit the active unit at `index` with the same payload
    async fn trigger(&mut self, index: usize, recorder: &mut dyn ProgressRecorder) {
        let service = Arc::clone(&self.service);
        let unit = &mut self.active[index];
        match service.submit(&unit.payload.to_request()).await {
            Ok(remote_id) => {
                info!(unit = %unit.name, %remote_id, "Resubmitted unit");
                unit.remote_id = Some(remote_id);
                unit.submitted_at = Some(Instant::now());
                recorder.on_submitted(unit).await;
            }
            Err(e) => {
                warn!(unit = %unit.name, error = %e, "Resubmission failed, retrying next cycle");
                unit.remote_id = None;
                self.stats.total_service_errors += 1;
            }
        }
    }

    /// Drop pending work and cancel every active remote job
    ///
    /// Cancellation is best-effort; errors are logged and ignored.
    pub async fn abort_all(&mut self) -> usize {
        debug!(active = self.active.len(), pending = self.pending.len(), "Scheduler::abort_all: called");
        if !self.pending.is_empty() {
            info!(discarded = self.pending.len(), "Discarding pending units");
        }
        self.pending.clear();

        let mut cancelled = 0;
        for unit in self.active.drain(..) {
            let Some(remote_id) = unit.remote_id else {
                continue;
            };
            cancelled += 1;
            match self.service.cancel(&remote_id).await {
                Ok(()) => info!(unit = %unit.name, %remote_id, "Cancelled unit"),
                Err(e) => warn!(unit = %unit.name, %remote_id, error = %e, "Cancel failed, ignoring"),
            }
        }
        self.serialize_mode = false;
        self.prerequisite = None;
        cancelled
    }
}
