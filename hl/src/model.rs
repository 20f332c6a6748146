//! Day and hour-slot records

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::snapshot::{RawDay, empty_as_none};

/// Execution state of one hour slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SlotState {
    /// Never submitted
    #[default]
    #[serde(rename = "")]
    Unstarted,
    /// Submitted to the remote service, no status observed yet
    Submitted,
    Queued,
    Running,
    Succeeded,
    /// Terminal failure marker; resubmitted on the next run
    Failed,
    /// Cancelled remotely or by an abort; resubmitted on the next run
    Cancelled,
}

impl SlotState {
    /// Whether the slot still needs to be (re)submitted
    pub fn is_outstanding(&self) -> bool {
        !matches!(self, Self::Succeeded)
    }
}

impl std::fmt::Display for SlotState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unstarted => write!(f, "unstarted"),
            Self::Submitted => write!(f, "submitted"),
            Self::Queued => write!(f, "queued"),
            Self::Running => write!(f, "running"),
            Self::Succeeded => write!(f, "succeeded"),
            Self::Failed => write!(f, "failed"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Observability fields reported by the remote service
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotStats {
    #[serde(rename = "dataScannedInBytes", default)]
    pub bytes_scanned: Option<u64>,

    #[serde(rename = "runTimeInMillis", default)]
    pub run_time_ms: Option<u64>,

    #[serde(rename = "startTime", default)]
    pub start_time: Option<DateTime<Utc>>,

    #[serde(default)]
    pub workgroup: Option<String>,
}

impl SlotStats {
    /// Overwrite every field that `other` carries; returns true if anything changed
    pub fn merge(&mut self, other: &SlotStats) -> bool {
        let before = self.clone();
        if other.bytes_scanned.is_some() {
            self.bytes_scanned = other.bytes_scanned;
        }
        if other.run_time_ms.is_some() {
            self.run_time_ms = other.run_time_ms;
        }
        if other.start_time.is_some() {
            self.start_time = other.start_time;
        }
        if other.workgroup.is_some() {
            self.workgroup.clone_from(&other.workgroup);
        }
        *self != before
    }
}

/// One hourly job record within a day
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HourSlot {
    pub hour: u32,

    /// Remote job id of the latest submission
    #[serde(rename = "queryid", default, with = "empty_as_none")]
    pub remote_id: Option<String>,

    #[serde(default)]
    pub state: SlotState,

    #[serde(flatten)]
    pub stats: SlotStats,
}

impl HourSlot {
    /// Create an unstarted slot for the given hour
    pub fn new(hour: u32) -> Self {
        Self {
            hour,
            remote_id: None,
            state: SlotState::Unstarted,
            stats: SlotStats::default(),
        }
    }
}

/// One calendar day and its hour slots, ordered by hour of day
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawDay", into = "RawDay")]
pub struct Day {
    pub date: NaiveDate,
    pub hours: Vec<HourSlot>,
}

impl Day {
    pub fn new(date: NaiveDate, hours: Vec<HourSlot>) -> Self {
        Self { date, hours }
    }

    /// A day holding every hour 0..24
    pub fn full(date: NaiveDate) -> Self {
        Self::new(date, (0..crate::HOURS_PER_DAY).map(HourSlot::new).collect())
    }

    /// A day holding a single hour
    pub fn single(date: NaiveDate, hour: u32) -> Self {
        Self::new(date, vec![HourSlot::new(hour)])
    }

    pub fn slot(&self, hour: u32) -> Option<&HourSlot> {
        self.hours.iter().find(|s| s.hour == hour)
    }

    pub fn slot_mut(&mut self, hour: u32) -> Option<&mut HourSlot> {
        self.hours.iter_mut().find(|s| s.hour == hour)
    }

    pub fn has_hour(&self, hour: u32) -> bool {
        self.slot(hour).is_some()
    }
}

/// Address of one hour slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotRef {
    pub date: NaiveDate,
    pub hour: u32,
}

impl SlotRef {
    pub fn new(date: NaiveDate, hour: u32) -> Self {
        Self { date, hour }
    }
}

impl std::fmt::Display for SlotRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}T{:02}", self.date, self.hour)
    }
}

/// A status observation to fold into a slot
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SlotProgress {
    pub state: Option<SlotState>,
    pub stats: SlotStats,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_state_serde() {
        assert_eq!(serde_json::to_string(&SlotState::Unstarted).unwrap(), "\"\"");
        assert_eq!(serde_json::to_string(&SlotState::Succeeded).unwrap(), "\"SUCCEEDED\"");

        let state: SlotState = serde_json::from_str("\"RUNNING\"").unwrap();
        assert_eq!(state, SlotState::Running);
        let state: SlotState = serde_json::from_str("\"\"").unwrap();
        assert_eq!(state, SlotState::Unstarted);
    }

    #[test]
    fn test_only_succeeded_is_done() {
        assert!(SlotState::Unstarted.is_outstanding());
        assert!(SlotState::Failed.is_outstanding());
        assert!(SlotState::Running.is_outstanding());
        assert!(!SlotState::Succeeded.is_outstanding());
    }

    #[test]
    fn test_full_day_has_every_hour() {
        let day = Day::full(NaiveDate::from_ymd_opt(2026, 10, 14).unwrap());
        assert_eq!(day.hours.len(), 24);
        assert_eq!(day.hours.first().map(|s| s.hour), Some(0));
        assert_eq!(day.hours.last().map(|s| s.hour), Some(23));
    }

    #[test]
    fn test_stats_merge_keeps_unreported_fields() {
        let mut stats = SlotStats {
            bytes_scanned: Some(10),
            workgroup: Some("primary".to_string()),
            ..Default::default()
        };
        let changed = stats.merge(&SlotStats {
            run_time_ms: Some(1500),
            ..Default::default()
        });
        assert!(changed);
        assert_eq!(stats.bytes_scanned, Some(10));
        assert_eq!(stats.run_time_ms, Some(1500));

        assert!(!stats.merge(&SlotStats::default()));
    }

    #[test]
    fn test_slot_ref_display() {
        let slot = SlotRef::new(NaiveDate::from_ymd_opt(2026, 3, 9).unwrap(), 4);
        assert_eq!(slot.to_string(), "2026-03-09T04");
    }
}
