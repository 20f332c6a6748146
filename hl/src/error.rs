//! Ledger error types

use chrono::NaiveDate;
use thiserror::Error;

/// Errors raised while loading or mutating a ledger
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("No hour slot {hour:02} recorded for {date}")]
    SlotNotFound { date: NaiveDate, hour: u32 },

    #[error("Hour slot {hour:02} on {date} already succeeded")]
    AlreadySucceeded { date: NaiveDate, hour: u32 },

    #[error("Day {date} is recorded after {previous}")]
    OutOfOrder { previous: NaiveDate, date: NaiveDate },

    #[error("Day {date} is recorded more than once")]
    DuplicateDay { date: NaiveDate },

    #[error("Invalid hour {hour} on {date}")]
    InvalidHour { date: NaiveDate, hour: u32 },

    #[error("Hour {hour:02} appears more than once on {date}")]
    DuplicateHour { date: NaiveDate, hour: u32 },

    #[error("Invalid date {year}-{month}-{day}")]
    InvalidDate { year: String, month: String, day: String },

    #[error("Snapshot serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl LedgerError {
    /// True when the snapshot itself is malformed (as opposed to a bad lookup)
    pub fn is_corrupt_snapshot(&self) -> bool {
        matches!(
            self,
            LedgerError::OutOfOrder { .. }
                | LedgerError::DuplicateDay { .. }
                | LedgerError::InvalidHour { .. }
                | LedgerError::DuplicateHour { .. }
                | LedgerError::InvalidDate { .. }
                | LedgerError::Json(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_corrupt_snapshot() {
        let date = NaiveDate::from_ymd_opt(2026, 10, 14).unwrap();
        assert!(!LedgerError::SlotNotFound { date, hour: 3 }.is_corrupt_snapshot());
        assert!(LedgerError::InvalidHour { date, hour: 24 }.is_corrupt_snapshot());
        assert!(LedgerError::DuplicateDay { date }.is_corrupt_snapshot());
    }

    #[test]
    fn test_display() {
        let date = NaiveDate::from_ymd_opt(2026, 1, 2).unwrap();
        let err = LedgerError::SlotNotFound { date, hour: 7 };
        assert_eq!(err.to_string(), "No hour slot 07 recorded for 2026-01-02");
    }
}
