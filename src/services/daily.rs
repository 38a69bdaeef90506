//! Computes daily summaries and keeps exactly one record per operating day.

use chrono::NaiveDate;
use log::{debug, info, warn};
use std::collections::BTreeSet;

use crate::config::AggregationConfig;
use crate::db::models::{DailySummary, NewDailySummary};
use crate::db::store::{SampleSource, StatsError, SummaryStore};
use crate::services::window::{DayWindow, days_inclusive, operating_day};
use crate::services::{aggregate, series};

/// Run the whole pipeline for `day` and replace its stored summary.
///
/// Idempotent: with unchanged samples a second run stores the same values.
pub fn compute_and_store<S>(store: &mut S, cfg: &AggregationConfig, day: NaiveDate) -> Result<DailySummary, StatsError>
where
    S: SampleSource + SummaryStore + ?Sized,
{
    let window = DayWindow::resolve(day, cfg);
    let day_series = series::extract(store, &window)?;
    let stats = aggregate::compute(&day_series, &window, cfg);
    let saved = store.upsert_summary(&NewDailySummary::new(&window, &stats))?;
    debug!(
        "Daily: {} stored (samples={}, boiler_on={:.0}s, pellets={:.1}kg)",
        day, saved.sample_count, saved.boiler_on_seconds, saved.pellet_consumed_kg
    );
    Ok(saved)
}

/// Compute each distinct day once, in ascending order. With `skip_existing`,
/// days that already have a record are left alone.
pub fn compute_for_days<S, I>(
    store: &mut S,
    cfg: &AggregationConfig,
    days: I,
    skip_existing: bool,
) -> Result<Vec<DailySummary>, StatsError>
where
    S: SampleSource + SummaryStore + ?Sized,
    I: IntoIterator<Item = NaiveDate>,
{
    let unique: BTreeSet<NaiveDate> = days.into_iter().collect();
    let mut results = Vec::with_capacity(unique.len());
    let mut skipped = 0usize;
    for day in unique {
        if skip_existing && store.summary_exists(day)? {
            skipped += 1;
            continue;
        }
        results.push(compute_and_store(store, cfg, day)?);
    }
    if skipped > 0 {
        debug!("Daily: skipped {} day(s) that already have a summary", skipped);
    }
    Ok(results)
}

/// [`compute_for_days`] over `from..=to`.
pub fn compute_range<S>(
    store: &mut S,
    cfg: &AggregationConfig,
    from: NaiveDate,
    to: NaiveDate,
    skip_existing: bool,
) -> Result<Vec<DailySummary>, StatsError>
where
    S: SampleSource + SummaryStore + ?Sized,
{
    if to < from {
        return Err(StatsError::InvalidInput(format!("range end {to} is before start {from}")));
    }
    compute_for_days(store, cfg, days_inclusive(from, to), skip_existing)
}

/// Recompute every operating day between the first and the last stored
/// sample. Without any sample, all summaries are dropped.
pub fn recompute_all<S>(store: &mut S, cfg: &AggregationConfig) -> Result<Vec<DailySummary>, StatsError>
where
    S: SampleSource + SummaryStore + ?Sized,
{
    let Some((first, last)) = store.sample_bounds()? else {
        let removed = store.delete_all_summaries()?;
        warn!("Daily: no raw samples stored; removed {} summary record(s)", removed);
        return Ok(Vec::new());
    };
    let from = operating_day(first, cfg);
    let to = operating_day(last, cfg);
    info!("Daily: recomputing every day from {} to {}", from, to);
    compute_for_days(store, cfg, days_inclusive(from, to), false)
}

/// Keep only the most recently updated record of each day (highest id on a
/// tie) and return how many were removed. `None` scans every stored day.
pub fn cleanup_duplicates<S>(store: &mut S, days: Option<&[NaiveDate]>) -> Result<usize, StatsError>
where
    S: SummaryStore + ?Sized,
{
    let targets: Vec<NaiveDate> = match days {
        Some(days) => days.iter().copied().collect::<BTreeSet<_>>().into_iter().collect(),
        None => store.summary_days()?,
    };

    let mut removed = 0;
    for day in targets {
        let mut rows = store.summaries_for_day(day)?;
        if rows.len() < 2 {
            continue;
        }
        rows.sort_by(|a, b| (b.updated_at, b.id).cmp(&(a.updated_at, a.id)));
        let stale: Vec<i64> = rows[1..].iter().map(|r| r.id).collect();
        let deleted = store.delete_summaries(&stale)?;
        debug!("Daily: {} kept record {}, removed {} duplicate(s)", day, rows[0].id, deleted);
        removed += deleted;
    }
    Ok(removed)
}
