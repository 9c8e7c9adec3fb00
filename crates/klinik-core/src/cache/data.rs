use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const MINUTES_PER_HOUR: i64 = 60;
const MINUTES_PER_DAY: i64 = 24 * MINUTES_PER_HOUR;

/// A cached value stamped with the time it was written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedData<T> {
    pub data: T,
    pub cached_at: DateTime<Utc>,
}

/// Round to the nearest whole `unit`, halves up.
fn round_to(minutes: i64, unit: i64) -> i64 {
    (minutes + unit / 2) / unit
}

impl<T> CachedData<T> {
    pub fn new(data: T) -> Self {
        Self {
            data,
            cached_at: Utc::now(),
        }
    }

    pub fn age_minutes(&self) -> i64 {
        (Utc::now() - self.cached_at).num_minutes()
    }

    /// Short relative age for listings, e.g. `5m ago` or `2d ago`.
    pub fn age_display(&self) -> String {
        match self.age_minutes() {
            // Negative ages come from clock skew
            m if m < 1 => "just now".to_string(),
            m if m < MINUTES_PER_HOUR => format!("{}m ago", m),
            m if m < MINUTES_PER_DAY => format!("{}h ago", round_to(m, MINUTES_PER_HOUR)),
            m => format!("{}d ago", round_to(m, MINUTES_PER_DAY)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn written_minutes_ago(minutes: i64) -> CachedData<&'static str> {
        let mut cached = CachedData::new("<html>");
        cached.cached_at = Utc::now() - Duration::minutes(minutes);
        cached
    }

    #[test]
    fn test_fresh_response_reads_just_now() {
        assert_eq!(CachedData::new("logo").age_display(), "just now");
        assert_eq!(written_minutes_ago(-10).age_display(), "just now");
    }

    #[test]
    fn test_age_rounds_to_nearest_unit() {
        assert_eq!(written_minutes_ago(5).age_display(), "5m ago");
        assert_eq!(written_minutes_ago(70).age_display(), "1h ago");
        assert_eq!(written_minutes_ago(90).age_display(), "2h ago");
        assert_eq!(written_minutes_ago(1439).age_display(), "24h ago");
        assert_eq!(written_minutes_ago(MINUTES_PER_DAY + 11 * 60).age_display(), "1d ago");
        assert_eq!(written_minutes_ago(MINUTES_PER_DAY + 13 * 60).age_display(), "2d ago");
    }
}
