//! Counseling-session availability calendar.
//!
//! Built once per load from the schedule endpoint's day list and held in
//! memory only. Each date maps to a `DaySummary`, whose counts drive the
//! status dot. Date rules (past, more than 30 days ahead, weekends) disable
//! a day regardless of what the schedule says about it.

pub mod day;
pub mod grid;
pub mod rules;

use std::collections::BTreeMap;

use chrono::NaiveDate;
use thiserror::Error;
use tracing::debug;

use crate::models::{AvailabilityResponse, DateRange};

pub use day::{AvailabilityStatus, DaySummary, Session, PLENTIFUL_THRESHOLD};
pub use grid::{CalendarCell, Week};
pub use rules::{
    disabled_reason, is_date_disabled, is_weekend, selectable_range, DisabledReason,
    BOOKING_WINDOW_DAYS,
};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SelectionError {
    #[error("{date} cannot be selected: {reason}")]
    Disabled { date: NaiveDate, reason: DisabledReason },

    #[error("No counseling schedule for {0}")]
    NoData(NaiveDate),
}

#[derive(Debug, Clone, Default)]
pub struct AvailabilityCalendar {
    days: BTreeMap<NaiveDate, DaySummary>,
    range: Option<DateRange>,
}

impl AvailabilityCalendar {
    /// Later entries for the same date replace earlier ones.
    pub fn from_response(response: AvailabilityResponse) -> Self {
        let mut days = BTreeMap::new();
        for payload in response.days {
            let summary = DaySummary::from_payload(payload);
            if let Some(previous) = days.insert(summary.date, summary) {
                debug!(date = %previous.date, "Duplicate schedule date, keeping the later entry");
            }
        }
        Self {
            days,
            range: response.range,
        }
    }

    pub fn len(&self) -> usize {
        self.days.len()
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    /// The range the endpoint says it covers.
    pub fn range(&self) -> Option<DateRange> {
        self.range
    }

    pub fn get(&self, date: NaiveDate) -> Option<&DaySummary> {
        self.days.get(&date)
    }

    /// Look up by ISO 8601 date string (`YYYY-MM-DD`).
    pub fn get_iso(&self, date: &str) -> Option<&DaySummary> {
        NaiveDate::parse_from_str(date, "%Y-%m-%d")
            .ok()
            .and_then(|d| self.get(d))
    }

    pub fn status(&self, date: NaiveDate) -> Option<AvailabilityStatus> {
        self.get(date).map(DaySummary::status)
    }

    pub fn days(&self) -> impl Iterator<Item = &DaySummary> {
        self.days.values()
    }

    /// Select a date for booking. Date rules win over schedule data.
    pub fn select(&self, date: NaiveDate, today: NaiveDate) -> Result<&DaySummary, SelectionError> {
        if let Some(reason) = disabled_reason(date, today) {
            return Err(SelectionError::Disabled { date, reason });
        }
        self.get(date).ok_or(SelectionError::NoData(date))
    }

    pub fn month_grid(&self, year: i32, month: u32, today: NaiveDate) -> Option<Vec<Week>> {
        grid::build_month(year, month, |date, in_month| CalendarCell {
            date,
            in_month,
            disabled: is_date_disabled(date, today),
            status: self.status(date),
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
