//! Data models shared across the crate.
//!
//! - `Request`, `Response`, `RequestKey`: the intercepted fetch boundary
//! - `AvailabilityResponse` and friends: the counseling schedule endpoint

pub mod availability;
pub mod http;

pub use availability::{
    AvailabilityResponse, DateRange, DayPayload, PayloadSummary, SessionPayload, SessionStatus,
};
pub use http::{Request, RequestKey, Response};
