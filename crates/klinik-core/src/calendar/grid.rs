use chrono::{Datelike, Duration, NaiveDate};
use serde::Serialize;

use super::day::AvailabilityStatus;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CalendarCell {
    pub date: NaiveDate,
    /// False for the leading/trailing days borrowed from adjacent months.
    pub in_month: bool,
    pub disabled: bool,
    /// Only set for days the schedule has data for.
    pub status: Option<AvailabilityStatus>,
}

pub type Week = [CalendarCell; 7];

/// Monday-first weeks covering the whole month, or `None` for an invalid month.
pub(crate) fn build_month(
    year: i32,
    month: u32,
    mut cell: impl FnMut(NaiveDate, bool) -> CalendarCell,
) -> Option<Vec<Week>> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let next_month = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)?
    };
    let last = next_month - Duration::days(1);

    let start = first - Duration::days(i64::from(first.weekday().num_days_from_monday()));
    let end = last + Duration::days(i64::from(6 - last.weekday().num_days_from_monday()));

    let mut weeks = Vec::new();
    let mut day = start;
    while day <= end {
        let week: Week = std::array::from_fn(|offset| {
            let date = day + Duration::days(offset as i64);
            cell(date, date.month() == month)
        });
        weeks.push(week);
        day += Duration::days(7);
    }
    Some(weeks)
}
