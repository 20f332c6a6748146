//! Ledger operations: seeding, forward extension, outstanding set, recording

use chrono::{Duration, NaiveDate, NaiveDateTime, Timelike};
use tracing::{debug, info, warn};

use crate::error::LedgerError;
use crate::model::{Day, HourSlot, SlotProgress, SlotRef, SlotState};
use crate::snapshot::Snapshot;

/// How the ledger grows on each run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerMode {
    /// Track only the current hour of each run
    Disabled,
    /// Grow forward one day at a time until `today + control_days`.
    /// New days hold all 24 hours when `append_hours` is set, else the current hour.
    Backfill { control_days: i64, append_hours: bool },
}

/// Counts for display
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LedgerSummary {
    pub days: usize,
    pub slots: usize,
    pub succeeded: usize,
    pub outstanding: usize,
}

/// The persisted day/hour ledger
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ledger {
    days: Vec<Day>,
}

impl Ledger {
    /// Build a ledger from already validated days
    pub fn from_days(days: Vec<Day>) -> Result<Self, LedgerError> {
        validate(&days)?;
        Ok(Self { days })
    }

    /// First-run ledger for the given mode
    pub fn seed(mode: &LedgerMode, now: NaiveDateTime) -> Self {
        debug!(?mode, %now, "Ledger::seed: called");
        let today = now.date();
        let hour = now.hour();
        let day = match mode {
            LedgerMode::Disabled => Day::single(today, hour),
            LedgerMode::Backfill {
                control_days,
                append_hours,
            } => new_day(today + Duration::days(*control_days), hour, *append_hours),
        };
        info!(date = %day.date, slots = day.hours.len(), "Seeded new ledger");
        Self { days: vec![day] }
    }

    /// Seed when there is no usable prior ledger, otherwise extend it
    pub fn load(existing: Option<Ledger>, mode: &LedgerMode, now: NaiveDateTime) -> Self {
        debug!(has_existing = existing.is_some(), "Ledger::load: called");
        match existing {
            Some(mut ledger) if !ledger.days.is_empty() => {
                ledger.extend(mode, now);
                ledger
            }
            _ => {
                debug!("Ledger::load: no prior days, seeding");
                Self::seed(mode, now)
            }
        }
    }

    /// Grow the ledger forward for this run; returns the number of hour slots added
    pub fn extend(&mut self, mode: &LedgerMode, now: NaiveDateTime) -> usize {
        debug!(?mode, %now, "Ledger::extend: called");
        let today = now.date();
        let hour = now.hour();

        let Some(last) = self.days.last_mut() else {
            debug!("Ledger::extend: empty ledger, seeding");
            *self = Self::seed(mode, now);
            return self.days[0].hours.len();
        };

        match mode {
            LedgerMode::Disabled => {
                if last.date == today {
                    if last.has_hour(hour) {
                        debug!(hour, "Ledger::extend: current hour already recorded");
                        return 0;
                    }
                    last.hours.push(HourSlot::new(hour));
                    info!(date = %today, hour, "Appended hour slot");
                    1
                } else if last.date < today {
                    self.days.push(Day::single(today, hour));
                    info!(date = %today, hour, "Appended day");
                    1
                } else {
                    warn!(last = %last.date, %today, "Last recorded day is in the future, leaving ledger unchanged");
                    0
                }
            }
            LedgerMode::Backfill {
                control_days,
                append_hours,
            } => {
                let target = today + Duration::days(*control_days);
                let mut date = last.date;
                let mut added = 0;
                while date < target {
                    let Some(next) = date.succ_opt() else {
                        break;
                    };
                    date = next;
                    let day = new_day(date, hour, *append_hours);
                    added += day.hours.len();
                    self.days.push(day);
                }
                if added > 0 {
                    info!(until = %date, added, "Extended ledger");
                }
                added
            }
        }
    }

    /// Every slot not yet succeeded, in day then hour order
    pub fn outstanding(&self) -> impl Iterator<Item = (NaiveDate, &HourSlot)> + '_ {
        self.days
            .iter()
            .flat_map(|day| day.hours.iter().map(move |slot| (day.date, slot)))
            .filter(|(_, slot)| slot.state.is_outstanding())
    }

    pub fn days(&self) -> &[Day] {
        &self.days
    }

    pub fn slot(&self, date: NaiveDate, hour: u32) -> Option<&HourSlot> {
        self.days.iter().find(|d| d.date == date).and_then(|d| d.slot(hour))
    }

    fn slot_mut(&mut self, slot: SlotRef) -> Result<&mut HourSlot, LedgerError> {
        self.days
            .iter_mut()
            .find(|d| d.date == slot.date)
            .and_then(|d| d.slot_mut(slot.hour))
            .ok_or(LedgerError::SlotNotFound {
                date: slot.date,
                hour: slot.hour,
            })
    }

    /// Mark a slot as submitted under `remote_id`
    pub fn record_submitted(&mut self, slot: SlotRef, remote_id: &str) -> Result<bool, LedgerError> {
        debug!(%slot, %remote_id, "Ledger::record_submitted: called");
        let entry = self.slot_mut(slot)?;
        if entry.state == SlotState::Succeeded {
            return Err(LedgerError::AlreadySucceeded {
                date: slot.date,
                hour: slot.hour,
            });
        }
        let changed = entry.state != SlotState::Submitted || entry.remote_id.as_deref() != Some(remote_id);
        entry.state = SlotState::Submitted;
        entry.remote_id = Some(remote_id.to_string());
        Ok(changed)
    }

    /// Fold an observed status into a slot; a succeeded slot keeps its state
    pub fn record_progress(&mut self, slot: SlotRef, progress: &SlotProgress) -> Result<bool, LedgerError> {
        debug!(%slot, ?progress.state, "Ledger::record_progress: called");
        let entry = self.slot_mut(slot)?;
        let mut changed = entry.stats.merge(&progress.stats);
        if let Some(state) = progress.state {
            if entry.state != SlotState::Succeeded && entry.state != state {
                entry.state = state;
                changed = true;
            }
        }
        Ok(changed)
    }

    /// Mark a slot succeeded; recording it again is a no-op
    pub fn record_success(&mut self, slot: SlotRef) -> Result<bool, LedgerError> {
        debug!(%slot, "Ledger::record_success: called");
        let entry = self.slot_mut(slot)?;
        if entry.state == SlotState::Succeeded {
            debug!(%slot, "Ledger::record_success: already succeeded");
            return Ok(false);
        }
        entry.state = SlotState::Succeeded;
        Ok(true)
    }

    /// Mark a slot with the terminal failure marker
    pub fn record_failure(&mut self, slot: SlotRef) -> Result<bool, LedgerError> {
        debug!(%slot, "Ledger::record_failure: called");
        let entry = self.slot_mut(slot)?;
        if matches!(entry.state, SlotState::Succeeded | SlotState::Failed) {
            return Ok(false);
        }
        entry.state = SlotState::Failed;
        Ok(true)
    }

    pub fn summary(&self) -> LedgerSummary {
        let slots = self.days.iter().map(|d| d.hours.len()).sum();
        let outstanding = self.outstanding().count();
        LedgerSummary {
            days: self.days.len(),
            slots,
            succeeded: slots - outstanding,
            outstanding,
        }
    }

    /// Serialize the whole ledger as a snapshot document
    pub fn to_json(&self) -> Result<Vec<u8>, LedgerError> {
        let snapshot = Snapshot {
            days: self.days.clone(),
        };
        Ok(serde_json::to_vec_pretty(&snapshot)?)
    }

    /// Parse and validate a snapshot document
    pub fn from_json(bytes: &[u8]) -> Result<Self, LedgerError> {
        debug!(len = bytes.len(), "Ledger::from_json: called");
        let snapshot: Snapshot = serde_json::from_slice(bytes)?;
        Self::from_days(snapshot.days)
    }
}

fn new_day(date: NaiveDate, hour: u32, append_hours: bool) -> Day {
    if append_hours {
        Day::full(date)
    } else {
        Day::single(date, hour)
    }
}

fn validate(days: &[Day]) -> Result<(), LedgerError> {
    for pair in days.windows(2) {
        if pair[1].date == pair[0].date {
            return Err(LedgerError::DuplicateDay { date: pair[1].date });
        }
        if pair[1].date < pair[0].date {
            return Err(LedgerError::OutOfOrder {
                previous: pair[0].date,
                date: pair[1].date,
            });
        }
    }
    for day in days {
        let mut seen = [false; crate::HOURS_PER_DAY as usize];
        for slot in &day.hours {
            if slot.hour >= crate::HOURS_PER_DAY {
                return Err(LedgerError::InvalidHour {
                    date: day.date,
                    hour: slot.hour,
                });
            }
            if std::mem::replace(&mut seen[slot.hour as usize], true) {
                return Err(LedgerError::DuplicateHour {
                    date: day.date,
                    hour: slot.hour,
                });
            }
        }
    }
    Ok(())
}
