//! Progress recording between the scheduler and the ledger
//!
//! The scheduler reports unit lifecycle events through [`ProgressRecorder`];
//! [`LedgerRecorder`] folds them into the hour ledger and persists the whole
//! snapshot after every change so a crash loses at most the in-flight units.

use std::sync::Arc;

use async_trait::async_trait;
use eyre::{Context, Result};
use hourledger::Ledger;
use tracing::{debug, warn};

use crate::service::JobStatus;
use crate::store::ObjectStore;
use crate::unit::Unit;

/// Receives unit lifecycle events from the scheduler
///
/// Implementations absorb their own failures; the scheduler keeps going.
#[async_trait]
pub trait ProgressRecorder: Send {
    /// A unit was (re)submitted and has a fresh remote id
    async fn on_submitted(&mut self, unit: &Unit);

    /// A status was observed for an active unit
    async fn on_status(&mut self, unit: &Unit, status: &JobStatus);

    async fn on_success(&mut self, unit: &Unit);

    /// A unit exhausted its retries
    async fn on_failure(&mut self, unit: &Unit, reason: &str);
}

/// Records unit progress into a ledger persisted in object storage
pub struct LedgerRecorder {
    ledger: Ledger,
    store: Arc<dyn ObjectStore>,
    bucket: String,
    key: String,
    workgroup: Option<String>,
}

impl LedgerRecorder {
    pub fn new(
        ledger: Ledger,
        store: Arc<dyn ObjectStore>,
        bucket: impl Into<String>,
        key: impl Into<String>,
        workgroup: Option<String>,
    ) -> Self {
        Self {
            ledger,
            store,
            bucket: bucket.into(),
            key: key.into(),
            workgroup,
        }
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// Write the whole snapshot
    pub async fn persist(&self) -> Result<()> {
        debug!(bucket = %self.bucket, key = %self.key, "LedgerRecorder::persist: called");
        let bytes = self.ledger.to_json().context("Failed to serialize ledger")?;
        self.store
            .put(&self.bucket, &self.key, &bytes)
            .await
            .context(format!("Failed to write ledger to {}/{}", self.bucket, self.key))
    }

    async fn persist_if(&self, changed: bool) {
        if !changed {
            return;
        }
        if let Err(e) = self.persist().await {
            warn!(error = %e, "Ledger persist failed, will retry on next change");
        }
    }

    fn apply<F>(&mut self, unit: &Unit, op: &str, f: F) -> bool
    where
        F: FnOnce(&mut Ledger, hourledger::SlotRef) -> Result<bool, hourledger::LedgerError>,
    {
        let Some(slot) = unit.slot() else {
            return false;
        };
        match f(&mut self.ledger, slot) {
            Ok(changed) => changed,
            Err(e) => {
                warn!(unit = %unit.name, %slot, op, error = %e, "Ledger update rejected");
                false
            }
        }
    }
}

#[async_trait]
impl ProgressRecorder for LedgerRecorder {
    async fn on_submitted(&mut self, unit: &Unit) {
        let Some(remote_id) = unit.remote_id.clone() else {
            return;
        };
        let changed = self.apply(unit, "submitted", |l, slot| l.record_submitted(slot, &remote_id));
        self.persist_if(changed).await;
    }

    async fn on_status(&mut self, unit: &Unit, status: &JobStatus) {
        let progress = status.to_progress(self.workgroup.as_deref());
        let changed = self.apply(unit, "progress", |l, slot| l.record_progress(slot, &progress));
        self.persist_if(changed).await;
    }

    async fn on_success(&mut self, unit: &Unit) {
        if unit.slot().is_none() {
            return;
        }
        self.apply(unit, "success", |l, slot| l.record_success(slot));
        // the snapshot is written after every successful unit, changed or not
        self.persist_if(true).await;
    }

    async fn on_failure(&mut self, unit: &Unit, _reason: &str) {
        let changed = self.apply(unit, "failure", |l, slot| l.record_failure(slot));
        self.persist_if(changed).await;
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::JobState;
    use crate::store::MemoryObjectStore;
    use crate::unit::{ExecutionContext, QueryJob, SetupJob};
    use chrono::NaiveDate;
    use hourledger::{LedgerMode, SlotRef, SlotState};

    fn now() -> chrono::NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 10, 14).unwrap().and_hms_opt(3, 0, 0).unwrap()
    }

    fn slot() -> SlotRef {
        SlotRef::new(NaiveDate::from_ymd_opt(2026, 10, 14).unwrap(), 3)
    }

    fn query_unit() -> Unit {
        let mut unit = Unit::query(
            "events",
            QueryJob {
                sql: "SELECT 1".to_string(),
                destination: "out/".to_string(),
                context: ExecutionContext::default(),
                slot: slot(),
            },
        );
        unit.remote_id = Some("job-1".to_string());
        unit
    }

    fn recorder(store: Arc<MemoryObjectStore>) -> LedgerRecorder {
        let ledger = Ledger::seed(&LedgerMode::Disabled, now());
        LedgerRecorder::new(ledger, store, "control", "control.json", Some("primary".to_string()))
    }

    async fn stored(store: &MemoryObjectStore) -> Ledger {
        Ledger::from_json(&store.get("control", "control.json").await.unwrap()).unwrap()
    }

    #[tokio::test]
    async fn test_submission_persists_remote_id() {
        let store = Arc::new(MemoryObjectStore::new());
        let mut recorder = recorder(store.clone());

        recorder.on_submitted(&query_unit()).await;

        let ledger = stored(&store).await;
        let entry = ledger.slot(slot().date, slot().hour).unwrap();
        assert_eq!(entry.state, SlotState::Submitted);
        assert_eq!(entry.remote_id.as_deref(), Some("job-1"));
    }

    #[tokio::test]
    async fn test_success_persists() {
        let store = Arc::new(MemoryObjectStore::new());
        let mut recorder = recorder(store.clone());
        let unit = query_unit();

        recorder.on_submitted(&unit).await;
        recorder.on_status(&unit, &JobStatus::new(JobState::Running)).await;
        recorder.on_success(&unit).await;

        let ledger = stored(&store).await;
        assert_eq!(ledger.slot(slot().date, slot().hour).unwrap().state, SlotState::Succeeded);
        assert_eq!(
            ledger.slot(slot().date, slot().hour).unwrap().stats.workgroup.as_deref(),
            Some("primary")
        );
        assert_eq!(recorder.ledger(), &ledger);
    }

    #[tokio::test]
    async fn test_failure_marks_slot() {
        let store = Arc::new(MemoryObjectStore::new());
        let mut recorder = recorder(store.clone());
        recorder.on_failure(&query_unit(), "SYNTAX_ERROR").await;
        assert_eq!(
            stored(&store).await.slot(slot().date, slot().hour).unwrap().state,
            SlotState::Failed
        );
    }

    #[tokio::test]
    async fn test_setup_units_are_ignored() {
        let store = Arc::new(MemoryObjectStore::new());
        let mut recorder = recorder(store.clone());
        let unit = Unit::setup(
            "drop",
            SetupJob {
                sql: "DROP TABLE x".to_string(),
                destination: "out/".to_string(),
                context: ExecutionContext::default(),
            },
        );

        recorder.on_submitted(&unit).await;
        recorder.on_success(&unit).await;
        assert!(!store.contains("control", "control.json"));
    }
}
