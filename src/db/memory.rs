//! In-memory [`SampleSource`] + [`SummaryStore`] used by the service tests.

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use std::collections::BTreeMap;

use crate::db::models::{DailySummary, NewDailySummary, RawSample};
use crate::db::store::{SampleSource, StatsError, SummaryStore};

#[derive(Debug, Default)]
pub struct MemoryStore {
    pub samples: BTreeMap<DateTime<Utc>, RawSample>,
    pub summaries: Vec<DailySummary>,
    next_id: i64,
    /// Bumped on every write so `updated_at` is strictly increasing.
    ticks: i64,
    /// Makes the next storage call fail.
    pub fail_next: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore::default()
    }

    pub fn insert_samples(&mut self, samples: impl IntoIterator<Item = RawSample>) {
        for s in samples {
            self.samples.insert(s.time, s);
        }
    }

    fn now(&mut self) -> DateTime<Utc> {
        self.ticks += 1;
        Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap() + Duration::seconds(self.ticks)
    }

    /// Append a row without looking at existing ones, the way a writer that
    /// bypasses the per-day lock would.
    pub fn insert_raw(&mut self, row: &NewDailySummary) -> DailySummary {
        self.next_id += 1;
        let now = self.now();
        let summary = DailySummary {
            id: self.next_id,
            created_at: now,
            updated_at: now,
            ..summary_from(row)
        };
        self.summaries.push(summary.clone());
        summary
    }

    fn check_failure(&mut self) -> Result<(), StatsError> {
        if std::mem::take(&mut self.fail_next) {
            return Err(StatsError::Storage("connection reset".to_string()));
        }
        Ok(())
    }
}

impl SampleSource for MemoryStore {
    fn fetch_samples(&mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Vec<RawSample>, StatsError> {
        self.check_failure()?;
        Ok(self.samples.range(start..end).map(|(_, s)| s.clone()).collect())
    }

    fn sample_bounds(&mut self) -> Result<Option<(DateTime<Utc>, DateTime<Utc>)>, StatsError> {
        self.check_failure()?;
        Ok(self
            .samples
            .keys()
            .next()
            .copied()
            .zip(self.samples.keys().next_back().copied()))
    }
}

impl SummaryStore for MemoryStore {
    fn upsert_summary(&mut self, row: &NewDailySummary) -> Result<DailySummary, StatsError> {
        self.check_failure()?;
        let newest = self
            .summaries
            .iter()
            .enumerate()
            .filter(|(_, s)| s.day == row.day)
            .max_by_key(|(_, s)| (s.updated_at, s.id))
            .map(|(i, _)| i);
        let Some(index) = newest else {
            return Ok(self.insert_raw(row));
        };
        let now = self.now();
        let existing = &mut self.summaries[index];
        *existing = DailySummary {
            id: existing.id,
            created_at: existing.created_at,
            updated_at: now,
            ..summary_from(row)
        };
        Ok(existing.clone())
    }

    fn summary_exists(&mut self, day: NaiveDate) -> Result<bool, StatsError> {
        self.check_failure()?;
        Ok(self.summaries.iter().any(|s| s.day == day))
    }

    fn summaries_for_day(&mut self, day: NaiveDate) -> Result<Vec<DailySummary>, StatsError> {
        self.check_failure()?;
        Ok(self.summaries.iter().filter(|s| s.day == day).cloned().collect())
    }

    fn summary_days(&mut self) -> Result<Vec<NaiveDate>, StatsError> {
        self.check_failure()?;
        let mut days: Vec<NaiveDate> = self.summaries.iter().map(|s| s.day).collect();
        days.sort_unstable();
        days.dedup();
        Ok(days)
    }

    fn delete_summaries(&mut self, ids: &[i64]) -> Result<usize, StatsError> {
        self.check_failure()?;
        let before = self.summaries.len();
        self.summaries.retain(|s| !ids.contains(&s.id));
        Ok(before - self.summaries.len())
    }

    fn delete_all_summaries(&mut self) -> Result<usize, StatsError> {
        self.check_failure()?;
        Ok(std::mem::take(&mut self.summaries).len())
    }
}

/// A summary carrying `row`'s values with placeholder identity fields.
fn summary_from(row: &NewDailySummary) -> DailySummary {
    DailySummary {
        id: 0,
        day: row.day,
        window_start: row.window_start,
        window_end: row.window_end,
        sample_count: row.sample_count,
        boiler_on_seconds: row.boiler_on_seconds,
        pellet_consumed_kg: row.pellet_consumed_kg,
        ext_temp_mean: row.ext_temp_mean,
        ext_temp_night_mean: row.ext_temp_night_mean,
        boiler_water_temp_mean: row.boiler_water_temp_mean,
        supply_temp_mean: row.supply_temp_mean,
        indoor_temp_mean: row.indoor_temp_mean,
        indoor_temp_night_mean: row.indoor_temp_night_mean,
        ecs_temp_heat_mean: row.ecs_temp_heat_mean,
        ecs_temp_global_mean: row.ecs_temp_global_mean,
        created_at: DateTime::<Utc>::MIN_UTC,
        updated_at: DateTime::<Utc>::MIN_UTC,
    }
}
