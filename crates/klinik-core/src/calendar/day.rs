//! Per-day session aggregation and the status indicator derived from it.

use std::fmt;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::debug;

use crate::models::{DayPayload, SessionStatus};

/// Days with at least this many open sessions show as plentiful.
pub const PLENTIFUL_THRESHOLD: u32 = 4;

/// The dot shown on a calendar day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum AvailabilityStatus {
    /// No sessions at all, or every session unavailable.
    Closed,
    /// Sessions exist but none is open.
    Full,
    /// One to three open sessions.
    Limited,
    Plentiful,
}

impl AvailabilityStatus {
    pub fn label(&self) -> &'static str {
        match self {
            AvailabilityStatus::Closed => "Tutup",
            AvailabilityStatus::Full => "Penuh",
            AvailabilityStatus::Limited => "Terbatas",
            AvailabilityStatus::Plentiful => "Tersedia banyak",
        }
    }

    /// Single-character marker for plain-text rendering.
    pub fn marker(&self) -> char {
        match self {
            AvailabilityStatus::Closed => '-',
            AvailabilityStatus::Full => 'x',
            AvailabilityStatus::Limited => '~',
            AvailabilityStatus::Plentiful => '+',
        }
    }

    pub fn is_bookable(&self) -> bool {
        matches!(self, AvailabilityStatus::Limited | AvailabilityStatus::Plentiful)
    }
}

impl fmt::Display for AvailabilityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Session {
    pub index: u32,
    pub start_time: String,
    pub end_time: String,
    pub status: SessionStatus,
    pub note: Option<String>,
}

impl Session {
    pub fn time_range(&self) -> String {
        format!("{}–{}", self.start_time, self.end_time)
    }
}

/// Aggregated sessions for one date.
///
/// When sessions are present the counts always sum to `sessions.len()`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DaySummary {
    pub date: NaiveDate,
    pub available: u32,
    pub occupied: u32,
    pub pending: u32,
    pub unavailable: u32,
    pub sessions: Vec<Session>,
}

impl DaySummary {
    /// Counts come from the session list when there is one, otherwise from
    /// the endpoint's own summary.
    pub fn from_payload(payload: DayPayload) -> Self {
        let mut sessions: Vec<Session> = payload
            .sessions
            .into_iter()
            .map(|s| Session {
                index: s.index,
                start_time: s.start_time,
                end_time: s.end_time,
                status: s.status,
                note: s.note.filter(|n| !n.trim().is_empty()),
            })
            .collect();
        sessions.sort_by_key(|s| s.index);

        let mut summary = Self {
            date: payload.date,
            available: 0,
            occupied: 0,
            pending: 0,
            unavailable: 0,
            sessions,
        };

        if summary.sessions.is_empty() {
            summary.available = payload.summary.available;
            summary.unavailable = payload.summary.unavailable;
            summary.occupied = payload.summary.occupied.unwrap_or(0);
            summary.pending = payload.summary.pending.unwrap_or(0);
            return summary;
        }

        for session in &summary.sessions {
            match session.status {
                SessionStatus::Available => summary.available += 1,
                SessionStatus::Occupied => summary.occupied += 1,
                SessionStatus::Pending => summary.pending += 1,
                SessionStatus::Unavailable => summary.unavailable += 1,
            }
        }
        if summary.available != payload.summary.available {
            debug!(
                date = %summary.date,
                reported = payload.summary.available,
                counted = summary.available,
                "Schedule summary disagrees with sessions, using sessions"
            );
        }
        summary
    }

    pub fn total(&self) -> u32 {
        self.available + self.occupied + self.pending + self.unavailable
    }

    pub fn status(&self) -> AvailabilityStatus {
        let total = self.total();
        if total == 0 || self.unavailable == total {
            AvailabilityStatus::Closed
        } else if self.available == 0 {
            AvailabilityStatus::Full
        } else if self.available >= PLENTIFUL_THRESHOLD {
            AvailabilityStatus::Plentiful
        } else {
            AvailabilityStatus::Limited
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PayloadSummary, SessionPayload};

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 20).unwrap()
    }

    fn session(index: u32, status: SessionStatus) -> SessionPayload {
        SessionPayload {
            index,
            start_time: format!("{:02}:00", 7 + index),
            end_time: format!("{:02}:00", 8 + index),
            status,
            note: None,
        }
    }

    fn day(statuses: &[SessionStatus]) -> DaySummary {
        DaySummary::from_payload(DayPayload {
            date: date(),
            summary: PayloadSummary::default(),
            sessions: statuses
                .iter()
                .enumerate()
                .map(|(i, s)| session(i as u32 + 1, *s))
                .collect(),
        })
    }

    #[test]
    fn test_summary_only_zero_available_is_closed() {
        let summary = DaySummary::from_payload(DayPayload {
            date: date(),
            summary: PayloadSummary {
                available: 0,
                unavailable: 3,
                ..PayloadSummary::default()
            },
            sessions: Vec::new(),
        });
        assert_eq!(summary.total(), 3);
        assert_eq!(summary.status(), AvailabilityStatus::Closed);
        assert!(!summary.status().is_bookable());
    }

    #[test]
    fn test_status_thresholds() {
        use SessionStatus::*;
        assert_eq!(day(&[]).status(), AvailabilityStatus::Closed);
        assert_eq!(day(&[Unavailable, Unavailable]).status(), AvailabilityStatus::Closed);
        assert_eq!(day(&[Occupied, Pending, Unavailable]).status(), AvailabilityStatus::Full);
        assert_eq!(day(&[Available, Occupied]).status(), AvailabilityStatus::Limited);
        assert_eq!(
            day(&[Available, Available, Available, Occupied]).status(),
            AvailabilityStatus::Limited
        );
        assert_eq!(
            day(&[Available, Available, Available, Available]).status(),
            AvailabilityStatus::Plentiful
        );
    }

    #[test]
    fn test_counts_sum_to_session_total() {
        use SessionStatus::*;
        let summary = day(&[Available, Occupied, Pending, Unavailable, Available]);
        assert_eq!(summary.available, 2);
        assert_eq!(summary.occupied, 1);
        assert_eq!(summary.pending, 1);
        assert_eq!(summary.unavailable, 1);
        assert_eq!(summary.total() as usize, summary.sessions.len());
    }

    #[test]
    fn test_sessions_sorted_and_blank_notes_dropped() {
        let mut late = session(3, SessionStatus::Available);
        late.note = Some("  ".to_string());
        let summary = DaySummary::from_payload(DayPayload {
            date: date(),
            summary: PayloadSummary::default(),
            sessions: vec![late, session(1, SessionStatus::Occupied)],
        });
        let order: Vec<u32> = summary.sessions.iter().map(|s| s.index).collect();
        assert_eq!(order, vec![1, 3]);
        assert!(summary.sessions[1].note.is_none());
        assert_eq!(summary.sessions[0].time_range(), "08:00–09:00");
    }
}
