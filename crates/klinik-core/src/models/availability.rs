//! Wire types for the counseling-session availability endpoint.
//!
//! The endpoint is a spreadsheet-backed script returning Indonesian field
//! names; they are mapped onto English Rust names here.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Top-level response: `{ "days": [...], "range": { "start", "end" } }`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct AvailabilityResponse {
    #[serde(default)]
    pub days: Vec<DayPayload>,
    #[serde(default)]
    pub range: Option<DateRange>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct DayPayload {
    pub date: NaiveDate,
    #[serde(default)]
    pub summary: PayloadSummary,
    #[serde(default)]
    pub sessions: Vec<SessionPayload>,
}

/// Per-day counts as reported by the endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct PayloadSummary {
    #[serde(rename = "tersedia", default)]
    pub available: u32,
    #[serde(rename = "tidak_tersedia", default)]
    pub unavailable: u32,
    #[serde(rename = "terisi", default)]
    pub occupied: Option<u32>,
    #[serde(default)]
    pub pending: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct SessionPayload {
    #[serde(rename = "sesi")]
    pub index: u32,
    #[serde(rename = "jam_mulai", default)]
    pub start_time: String,
    #[serde(rename = "jam_selesai", default)]
    pub end_time: String,
    #[cfg_attr(feature = "ts", ts(type = "string"))]
    pub status: SessionStatus,
    #[serde(rename = "keterangan", default)]
    pub note: Option<String>,
}

/// Booking state of a single counseling session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SessionStatus {
    Available,
    Occupied,
    Pending,
    Unavailable,
}

impl SessionStatus {
    pub fn as_wire(&self) -> &'static str {
        match self {
            SessionStatus::Available => "tersedia",
            SessionStatus::Occupied => "terisi",
            SessionStatus::Pending => "pending",
            SessionStatus::Unavailable => "tidak_tersedia",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SessionStatus::Available => "Tersedia",
            SessionStatus::Occupied => "Terisi",
            SessionStatus::Pending => "Menunggu konfirmasi",
            SessionStatus::Unavailable => "Tidak tersedia",
        }
    }
}

impl From<String> for SessionStatus {
    fn from(raw: String) -> Self {
        let normalized = raw.trim().to_ascii_lowercase().replace([' ', '-'], "_");
        match normalized.as_str() {
            "tersedia" | "available" => SessionStatus::Available,
            "terisi" | "penuh" | "occupied" | "booked" => SessionStatus::Occupied,
            "pending" | "menunggu" => SessionStatus::Pending,
            "tidak_tersedia" | "unavailable" | "libur" => SessionStatus::Unavailable,
            _ => {
                debug!(status = %raw, "Unknown session status, treating as unavailable");
                SessionStatus::Unavailable
            }
        }
    }
}

impl From<SessionStatus> for String {
    fn from(status: SessionStatus) -> Self {
        status.as_wire().to_string()
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
