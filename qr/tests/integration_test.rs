//! End-to-end runs against a filesystem store
//!
//! The remote service is a local fake that finishes every query on its
//! second poll.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::NaiveDate;
use hourledger::{Ledger, SlotState};
use queryrunner::config::{Config, StepConfig};
use queryrunner::coordinator::{Coordinator, StepOutcome};
use queryrunner::error::ServiceError;
use queryrunner::service::{JobState, JobStatus, QueryRequest, QueryService};
use queryrunner::store::{LocalObjectStore, ObjectStore};
use queryrunner::{LogAlerter, RunLock};
use tempfile::TempDir;

#[derive(Default)]
struct SlowService {
    polls: Mutex<HashMap<String, u32>>,
    submitted: Mutex<Vec<String>>,
}

#[async_trait]
impl QueryService for SlowService {
    async fn submit(&self, request: &QueryRequest) -> Result<String, ServiceError> {
        let mut submitted = self.submitted.lock().unwrap();
        submitted.push(request.query.clone());
        Ok(format!("q{}", submitted.len()))
    }

    async fn get_status(&self, job_id: &str) -> Result<JobStatus, ServiceError> {
        let mut polls = self.polls.lock().unwrap();
        let count = polls.entry(job_id.to_string()).or_default();
        *count += 1;
        let state = if *count >= 2 { JobState::Succeeded } else { JobState::Running };
        Ok(JobStatus::new(state))
    }

    async fn cancel(&self, _job_id: &str) -> Result<(), ServiceError> {
        Ok(())
    }
}

const CONFIG: &str = r#"
steps:
  - name: backfill
    control-bucket: control
    control-key: backfill.json
    query-bucket: queries
    query-key: backfill.sql
    output-location: "out/{{date}}/{{hour}}/"
    database: analytics
    control-days: 0
    scheduler:
      max-concurrency: 2
      poll-interval-secs: 5
"#;

fn step() -> StepConfig {
    let config: Config = serde_yaml::from_str(CONFIG).unwrap();
    config.validate().unwrap();
    config.steps[0].clone()
}

// =============================================================================
// Runs
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_backfill_across_runs() {
    let temp = TempDir::new().unwrap();
    let store = Arc::new(LocalObjectStore::new(temp.path()));
    store
        .put("queries", "backfill.sql", b"SELECT '{{date}}', '{{hour}}'")
        .await
        .unwrap();
    let service = Arc::new(SlowService::default());
    let coordinator = Coordinator::new(service.clone(), store.clone(), Arc::new(LogAlerter));
    let step = step();

    let day1 = NaiveDate::from_ymd_opt(2026, 10, 12).unwrap();
    let outcome = coordinator.run_step(&step, day1.and_hms_opt(7, 0, 0).unwrap()).await.unwrap();
    assert!(matches!(outcome, StepOutcome::Completed { units: 1, .. }));

    // two days later the ledger catches up one day at a time
    let day3 = NaiveDate::from_ymd_opt(2026, 10, 14).unwrap();
    let outcome = coordinator.run_step(&step, day3.and_hms_opt(9, 0, 0).unwrap()).await.unwrap();
    assert!(matches!(outcome, StepOutcome::Completed { units: 2, .. }));

    let submitted = service.submitted.lock().unwrap().clone();
    assert_eq!(
        submitted,
        vec![
            "SELECT '2026-10-12', '07'",
            "SELECT '2026-10-13', '09'",
            "SELECT '2026-10-14', '09'",
        ]
    );

    let bytes = fs_read(temp.path().join("control/backfill.json"));
    let ledger = Ledger::from_json(&bytes).unwrap();
    assert_eq!(ledger.days().len(), 3);
    assert!(ledger.days().iter().all(|d| d.hours.iter().all(|h| h.state == SlotState::Succeeded)));

    let outcome = coordinator.run_step(&step, day3.and_hms_opt(9, 30, 0).unwrap()).await.unwrap();
    assert!(matches!(outcome, StepOutcome::NothingToDo));
}

#[tokio::test(start_paused = true)]
async fn test_snapshot_keeps_control_file_shape() {
    let temp = TempDir::new().unwrap();
    let store = Arc::new(LocalObjectStore::new(temp.path()));
    store.put("queries", "backfill.sql", b"SELECT 1").await.unwrap();
    let coordinator = Coordinator::new(Arc::new(SlowService::default()), store, Arc::new(LogAlerter));

    let now = NaiveDate::from_ymd_opt(2026, 3, 4).unwrap().and_hms_opt(2, 0, 0).unwrap();
    coordinator.run_step(&step(), now).await.unwrap();

    let json: serde_json::Value = serde_json::from_slice(&fs_read(temp.path().join("control/backfill.json"))).unwrap();
    let day = &json["datelist"][0];
    assert_eq!(day["year"], "2026");
    assert_eq!(day["month"], "03");
    assert_eq!(day["day"], "4");
    assert_eq!(day["hourlist"][0]["hour"], 2);
    assert_eq!(day["hourlist"][0]["queryid"], "q1");
    assert_eq!(day["hourlist"][0]["state"], "SUCCEEDED");
}

#[test]
fn test_run_lock_excludes_second_run() {
    let temp = TempDir::new().unwrap();
    let _lock = RunLock::acquire(temp.path()).unwrap();
    assert!(RunLock::acquire(temp.path()).is_err());
}

fn fs_read(path: std::path::PathBuf) -> Vec<u8> {
    std::fs::read(path).unwrap()
}
