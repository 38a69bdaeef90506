//! Operating-day boundaries.
//!
//! An operating day runs from `day_start_hour` local time to the same instant
//! 24 hours later, so a full heating cycle and the quiet early-morning period
//! stay inside one window instead of being split at midnight.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use serde::Serialize;

use crate::config::AggregationConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DayWindow {
    pub day: NaiveDate,
    /// Inclusive.
    pub start: DateTime<Utc>,
    /// Exclusive; always `start + 24h`.
    pub end: DateTime<Utc>,
}

impl DayWindow {
    pub fn resolve(day: NaiveDate, cfg: &AggregationConfig) -> Self {
        let start_time = NaiveTime::from_hms_opt(cfg.day_start_hour, 0, 0).unwrap_or(NaiveTime::MIN);
        let start = cfg.zone.to_utc(day.and_time(start_time));
        DayWindow {
            day,
            start,
            end: start + Duration::days(1),
        }
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant < self.end
    }

    /// `[start, start + night_window)`.
    pub fn night(&self, cfg: &AggregationConfig) -> (DateTime<Utc>, DateTime<Utc>) {
        (self.start, self.start + cfg.night_window)
    }
}

/// The operating day whose window contains `instant`.
pub fn operating_day(instant: DateTime<Utc>, cfg: &AggregationConfig) -> NaiveDate {
    (cfg.zone.to_local(instant) - Duration::hours(i64::from(cfg.day_start_hour))).date()
}

/// Every day from `from` to `to`, both included. Empty when `to < from`.
pub fn days_inclusive(from: NaiveDate, to: NaiveDate) -> Vec<NaiveDate> {
    from.iter_days().take_while(|d| *d <= to).collect()
}
