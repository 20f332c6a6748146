//! On-disk snapshot representation

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::LedgerError;
use crate::model::{Day, HourSlot};

/// Top-level snapshot document
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct Snapshot {
    #[serde(rename = "datelist", default)]
    pub days: Vec<Day>,
}

/// Day as stored: date split into string components, month zero-padded
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct RawDay {
    year: String,
    month: String,
    day: String,
    #[serde(rename = "hourlist", default)]
    hours: Vec<HourSlot>,
}

impl TryFrom<RawDay> for Day {
    type Error = LedgerError;

    fn try_from(raw: RawDay) -> Result<Self, Self::Error> {
        let invalid = || LedgerError::InvalidDate {
            year: raw.year.clone(),
            month: raw.month.clone(),
            day: raw.day.clone(),
        };
        let year = raw.year.trim().parse::<i32>().map_err(|_| invalid())?;
        let month = raw.month.trim().parse::<u32>().map_err(|_| invalid())?;
        let day = raw.day.trim().parse::<u32>().map_err(|_| invalid())?;
        let date = NaiveDate::from_ymd_opt(year, month, day).ok_or_else(invalid)?;
        Ok(Day::new(date, raw.hours))
    }
}

impl From<Day> for RawDay {
    fn from(day: Day) -> Self {
        Self {
            year: day.date.year().to_string(),
            month: format!("{:02}", day.date.month()),
            day: day.date.day().to_string(),
            hours: day.hours,
        }
    }
}

/// `Option<String>` stored as a plain string, empty meaning `None`
pub(crate) mod empty_as_none {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<String>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(value.as_deref().unwrap_or(""))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
        let value = Option::<String>::deserialize(deserializer)?;
        Ok(value.filter(|s| !s.is_empty()))
    }
}
