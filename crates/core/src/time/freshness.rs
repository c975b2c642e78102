use chrono::{DateTime, Duration, Utc};

pub const DEFAULT_WINDOW_HOURS: i64 = 24;

pub fn default_window() -> Duration {
    Duration::hours(DEFAULT_WINDOW_HOURS)
}

// Rolling window anchored at `now`, not at calendar-day boundaries.
pub fn cutoff(now: DateTime<Utc>, window: Duration) -> DateTime<Utc> {
    now - window
}

pub fn is_fresh(created_at: DateTime<Utc>, now: DateTime<Utc>, window: Duration) -> bool {
    created_at >= cutoff(now, window)
}
