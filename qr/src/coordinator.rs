//! Step orchestration
//!
//! One step reads its ledger snapshot, grows it for the current run, renders
//! one query per outstanding slot and hands the units to a fresh
//! [`Scheduler`]. Progress flows back into the ledger through a
//! [`LedgerRecorder`].

use std::sync::Arc;

use chrono::{NaiveDateTime, Timelike};
use eyre::{Context, Result};
use hourledger::{Ledger, LedgerSummary, SlotRef};
use tracing::{debug, info, warn};

use crate::alert::Alerter;
use crate::config::{SetupConfig, StepConfig};
use crate::progress::LedgerRecorder;
use crate::scheduler::{RunOutcome, RunReport, Scheduler};
use crate::service::QueryService;
use crate::store::{self, ObjectStore};
use crate::template::{QueryTemplate, TemplateVars};
use crate::unit::{ExecutionContext, QueryJob, SetupJob, Unit};

/// How a step ended
#[derive(Debug, Clone)]
pub enum StepOutcome {
    /// Every slot was already succeeded
    NothingToDo,

    Completed { units: usize, report: RunReport },

    /// The soft deadline passed; unfinished slots are picked up next run
    TimedOut { units: usize, report: RunReport },
}

impl StepOutcome {
    pub fn is_success(&self) -> bool {
        !matches!(self, StepOutcome::TimedOut { .. })
    }
}

/// Read-only view of what a run would do
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepPlan {
    pub summary: LedgerSummary,
    /// Slots this run would add to the ledger
    pub added: usize,
    pub outstanding: Vec<SlotRef>,
}

pub struct Coordinator {
    service: Arc<dyn QueryService>,
    store: Arc<dyn ObjectStore>,
    alerter: Arc<dyn Alerter>,
    template: QueryTemplate,
}

impl Coordinator {
    pub fn new(service: Arc<dyn QueryService>, store: Arc<dyn ObjectStore>, alerter: Arc<dyn Alerter>) -> Self {
        Self {
            service,
            store,
            alerter,
            template: QueryTemplate::new(),
        }
    }

    /// Run steps in order; a fatal step failure stops the rest
    pub async fn run_all(&self, steps: &[&StepConfig], now: NaiveDateTime) -> Result<Vec<(String, StepOutcome)>> {
        debug!(steps = steps.len(), %now, "Coordinator::run_all: called");
        let mut outcomes = Vec::with_capacity(steps.len());
        for step in steps {
            let outcome = self.run_step(step, now).await?;
            outcomes.push((step.name.clone(), outcome));
        }
        Ok(outcomes)
    }

    /// Run one step; every fatal error is alerted before it is returned
    pub async fn run_step(&self, step: &StepConfig, now: NaiveDateTime) -> Result<StepOutcome> {
        debug!(step = %step.name, %now, "Coordinator::run_step: called");
        match self.execute_step(step, now).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                let e = e.wrap_err(format!("Step '{}' failed", step.name));
                self.alerter.warn(&format!("{:#}", e)).await;
                Err(e)
            }
        }
    }

    async fn execute_step(&self, step: &StepConfig, now: NaiveDateTime) -> Result<StepOutcome> {
        let existing = self.read_ledger(step).await?;
        let (ledger, added) = Self::grow(existing, step, now);
        let mut recorder = LedgerRecorder::new(
            ledger,
            Arc::clone(&self.store),
            &step.control_bucket,
            &step.control_key,
            step.workgroup.clone(),
        );
        if added {
            recorder
                .persist()
                .await
                .context(format!("Step '{}': failed to persist extended ledger", step.name))?;
        }

        let outstanding: Vec<SlotRef> = recorder
            .ledger()
            .outstanding()
            .map(|(date, slot)| SlotRef::new(date, slot.hour))
            .collect();
        if outstanding.is_empty() {
            info!(step = %step.name, "Nothing outstanding");
            return Ok(StepOutcome::NothingToDo);
        }
        info!(step = %step.name, outstanding = outstanding.len(), "Starting step");

        // everything is rendered before the destructive clean
        let setup_unit = match &step.setup {
            Some(setup) => Some(self.setup_unit(step, setup, now).await?),
            None => None,
        };
        let queries = self.query_units(step, &outstanding).await?;
        if let Some(setup) = &step.setup {
            self.clean(step, setup).await?;
        }

        let mut scheduler = Scheduler::new(step.scheduler.clone(), Arc::clone(&self.service));
        if let Some(unit) = setup_unit {
            scheduler.enforce_ordering(unit);
        }
        for unit in queries {
            scheduler.submit(unit);
        }
        let units = outstanding.len() + usize::from(step.setup.is_some());

        let report = scheduler.run_to_completion(&mut recorder).await?;
        match report.outcome {
            RunOutcome::Completed => {
                info!(step = %step.name, units, cycles = report.cycles, "Step completed");
                Ok(StepOutcome::Completed { units, report })
            }
            RunOutcome::TimedOut { elapsed, unfinished } => {
                self.alerter
                    .warn(&format!(
                        "Step '{}' timed out after {}s with {} unfinished units",
                        step.name,
                        elapsed.as_secs(),
                        unfinished
                    ))
                    .await;
                Ok(StepOutcome::TimedOut { units, report })
            }
        }
    }

    /// Outstanding slots without persisting or submitting anything
    pub async fn plan(&self, step: &StepConfig, now: NaiveDateTime) -> Result<StepPlan> {
        debug!(step = %step.name, %now, "Coordinator::plan: called");
        let existing = self.read_ledger(step).await?;
        let before = existing.as_ref().map(|l| l.summary().slots).unwrap_or(0);
        let (ledger, _) = Self::grow(existing, step, now);
        let summary = ledger.summary();
        Ok(StepPlan {
            summary,
            added: summary.slots.saturating_sub(before),
            outstanding: ledger
                .outstanding()
                .map(|(date, slot)| SlotRef::new(date, slot.hour))
                .collect(),
        })
    }

    async fn read_ledger(&self, step: &StepConfig) -> Result<Option<Ledger>> {
        let bytes = store::get_optional(self.store.as_ref(), &step.control_bucket, &step.control_key)
            .await
            .context(format!(
                "Step '{}': failed to read ledger {}/{}",
                step.name, step.control_bucket, step.control_key
            ))?;
        match bytes {
            Some(bytes) => {
                let ledger = Ledger::from_json(&bytes).context(format!(
                    "Step '{}': corrupt ledger {}/{}",
                    step.name, step.control_bucket, step.control_key
                ))?;
                Ok(Some(ledger))
            }
            None => {
                info!(step = %step.name, "No ledger snapshot, starting fresh");
                Ok(None)
            }
        }
    }

    /// Load or seed the ledger; the flag is set when it changed
    fn grow(existing: Option<Ledger>, step: &StepConfig, now: NaiveDateTime) -> (Ledger, bool) {
        let before = existing.clone();
        let ledger = Ledger::load(existing, &step.mode(), now);
        let changed = before.as_ref() != Some(&ledger);
        (ledger, changed)
    }

    async fn read_template(&self, bucket: &str, key: &str) -> Result<String> {
        let bytes = self
            .store
            .get(bucket, key)
            .await
            .context(format!("Failed to read template {}/{}", bucket, key))?;
        String::from_utf8(bytes).context(format!("Template {}/{} is not UTF-8", bucket, key))
    }

    /// One query unit per outstanding slot
    async fn query_units(&self, step: &StepConfig, outstanding: &[SlotRef]) -> Result<Vec<Unit>> {
        let sql_template = self.read_template(&step.query_bucket, &step.query_key).await?;
        let context = ExecutionContext {
            database: step.database.clone(),
            workgroup: step.workgroup.clone(),
        };
        let mut units = Vec::with_capacity(outstanding.len());
        for slot in outstanding {
            let vars = TemplateVars::for_slot(&step.name, *slot);
            let job = QueryJob {
                sql: self.template.render(&step.query_key, &sql_template, &vars)?,
                destination: self.template.render("output-location", &step.output_location, &vars)?,
                context: context.clone(),
                slot: *slot,
            };
            units.push(Unit::query(format!("{}@{}", step.name, slot), job));
        }
        Ok(units)
    }

    /// Build the prerequisite unit, rendered for the current hour
    async fn setup_unit(&self, step: &StepConfig, setup: &SetupConfig, now: NaiveDateTime) -> Result<Unit> {
        debug!(step = %step.name, setup = %setup.name, "Coordinator::setup_unit: called");
        let vars = TemplateVars::for_slot(&step.name, SlotRef::new(now.date(), now.hour()));
        let sql_template = self.read_template(&step.query_bucket, &setup.query_key).await?;
        let job = SetupJob {
            sql: self.template.render(&setup.query_key, &sql_template, &vars)?,
            destination: self.template.render("output-location", &setup.output_location, &vars)?,
            context: ExecutionContext {
                database: step.database.clone(),
                workgroup: step.workgroup.clone(),
            },
        };
        Ok(Unit::setup(&setup.name, job))
    }

    /// Delete the setup's `clean-prefix`
    async fn clean(&self, step: &StepConfig, setup: &SetupConfig) -> Result<()> {
        let Some(prefix) = &setup.clean_prefix else {
            return Ok(());
        };
        debug!(step = %step.name, %prefix, "Coordinator::clean: called");
        let bucket = setup.clean_bucket.as_deref().unwrap_or(&step.query_bucket);
        let removed = store::delete_prefix(self.store.as_ref(), bucket, prefix)
            .await
            .context(format!("Step '{}': failed to clean {}/{}", step.name, bucket, prefix))?;
        if removed == 0 {
            warn!(step = %step.name, %bucket, %prefix, "Nothing to clean");
        }
        Ok(())
    }
}
