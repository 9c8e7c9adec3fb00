//! Utility functions for display formatting.

pub mod format;

// Re-export commonly used functions at module level
pub use format::{format_bytes, format_date_long, month_name, truncate_string, weekday_headers};
