//! klinik-core - offline support and schedule data for the clinic site.
//!
//! Two parts:
//!
//! - The offline worker: `CacheStorage` holds versioned caches,
//!   `FetchRouter` serves each request by policy (cache-first assets,
//!   stale-while-revalidate pages, network-first everything else), and
//!   `Registration` installs and activates new versions.
//! - The counseling calendar: `AvailabilityClient` loads the schedule once and
//!   `AvailabilityCalendar` answers per-date status and selection questions.

pub mod api;
pub mod cache;
pub mod calendar;
pub mod config;
pub mod fetch;
pub mod lifecycle;
pub mod models;
pub mod policy;
pub mod router;
pub mod utils;

pub use api::{ApiError, AvailabilityClient};
pub use cache::{Cache, CacheError, CacheStorage, CachedData};
pub use calendar::{AvailabilityCalendar, AvailabilityStatus, DaySummary, SelectionError};
pub use config::{Config, WorkerConfig};
pub use fetch::{FetchError, Fetcher, HttpFetcher};
pub use lifecycle::{InstallError, Registration, RegistrationOutcome, ServiceWorker, WorkerState};
pub use models::{Request, RequestKey, Response};
pub use policy::{classify, Policy};
pub use router::{CacheWriteFailure, CacheWriteHook, FetchRouter, ResponseSource, Routed};
