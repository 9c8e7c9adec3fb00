use std::fmt;

use chrono::{Datelike, Duration, NaiveDate, Weekday};

/// Counseling can be booked at most this many days ahead.
pub const BOOKING_WINDOW_DAYS: i64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisabledReason {
    Past,
    BeyondWindow,
    Weekend,
}

impl fmt::Display for DisabledReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisabledReason::Past => write!(f, "date has passed"),
            DisabledReason::BeyondWindow => {
                write!(f, "more than {} days ahead", BOOKING_WINDOW_DAYS)
            }
            DisabledReason::Weekend => write!(f, "clinic is closed on weekends"),
        }
    }
}

pub fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// First and last selectable dates, inclusive.
pub fn selectable_range(today: NaiveDate) -> (NaiveDate, NaiveDate) {
    (today, today + Duration::days(BOOKING_WINDOW_DAYS))
}

/// Why a date cannot be selected, independent of any schedule data.
pub fn disabled_reason(date: NaiveDate, today: NaiveDate) -> Option<DisabledReason> {
    let (first, last) = selectable_range(today);
    if date < first {
        Some(DisabledReason::Past)
    } else if date > last {
        Some(DisabledReason::BeyondWindow)
    } else if is_weekend(date) {
        Some(DisabledReason::Weekend)
    } else {
        None
    }
}

pub fn is_date_disabled(date: NaiveDate, today: NaiveDate) -> bool {
    disabled_reason(date, today).is_some()
}
