//! HTTP client for the counseling schedule endpoint.
//!
//! The endpoint is a spreadsheet-backed script that returns the bookable
//! days and their sessions as JSON. It is fetched once per load with no
//! retry; any failure becomes one user-visible message.

pub mod client;
pub mod error;

pub use client::AvailabilityClient;
pub use error::{ApiError, SCHEDULE_UNAVAILABLE_MESSAGE};
