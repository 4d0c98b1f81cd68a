use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::core::config::ConfigError;

/// Storage is billed per month; the engine treats a month as 30 days.
pub const HOURS_PER_MONTH: f64 = 24.0 * 30.0;

/// Longest lookback accepted from config or the command line. Hourly metric
/// datapoints are kept for 455 days.
pub const MAX_LOOKBACK_HOURS: u32 = 24 * 455;

/// Half-open interval `[start, end)` shared by every query in one pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UsageWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl UsageWindow {
    /// The `lookback_hours` leading up to `now`.
    pub fn trailing(lookback_hours: u32, now: DateTime<Utc>) -> Result<Self, ConfigError> {
        let start = now
            .checked_sub_signed(Duration::hours(i64::from(lookback_hours)))
            .ok_or(ConfigError::InvalidLookback(lookback_hours))?;
        Ok(Self { start, end: now })
    }

    pub fn hours(&self) -> f64 {
        (self.end - self.start).num_milliseconds().max(0) as f64 / 3_600_000.0
    }

    /// Share of a billing month covered by this window.
    pub fn month_fraction(&self) -> f64 {
        self.hours() / HOURS_PER_MONTH
    }

    pub fn contains(&self, timestamp: &DateTime<Utc>) -> bool {
        *timestamp >= self.start && *timestamp < self.end
    }
}
