//! Versioned request→response cache storage.
//!
//! `CacheStorage` holds any number of named `Cache` instances. The worker
//! keeps exactly one of them, named by the current version tag, and deletes
//! the rest on activation. Storage is either in-memory or persisted as a
//! JSON metadata index per cache plus one file per response body, so pages
//! stay available across restarts.

pub mod data;
pub mod store;

pub use data::CachedData;
pub use store::{Cache, CacheError, CacheResult, CacheStorage};
