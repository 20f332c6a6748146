//! HourLedger - persistent progress ledger for hourly batch jobs
//!
//! Tracks which time-bucketed job (one per hour of a calendar day) has
//! completed, so a batch runner only resubmits outstanding work on each run.
//!
//! # Snapshot layout
//!
//! ```text
//! {"datelist": [
//!   {"year": "2026", "month": "10", "day": "4",
//!    "hourlist": [{"hour": 7, "queryid": "", "state": "", ...}]}
//! ]}
//! ```
//!
//! # Example
//!
//! ```ignore
//! use hourledger::{Ledger, LedgerMode};
//!
//! let mut ledger = Ledger::load(previous, &LedgerMode::Disabled, now)?;
//! for (date, slot) in ledger.outstanding() {
//!     println!("{} {:02}", date, slot.hour);
//! }
//! ledger.record_success(date, hour)?;
//! store.put(ledger.to_json()?)?;
//! ```

mod error;
mod ledger;
mod model;
mod snapshot;

pub use error::LedgerError;
pub use ledger::{Ledger, LedgerMode, LedgerSummary};
pub use model::{Day, HourSlot, SlotProgress, SlotRef, SlotState, SlotStats};

/// Number of hour slots in a fully populated day
pub const HOURS_PER_DAY: u32 = 24;
