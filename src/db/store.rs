//! Storage seams used by the aggregation services, and their PostgreSQL
//! implementation on a plain [`PgConnection`].

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use core::fmt;
use diesel::PgConnection;
use diesel::dsl::{exists, max, min, now};
use diesel::prelude::*;
use diesel::sql_types::BigInt;
use std::error::Error;
use std::fmt::{Display, Formatter};

use crate::db::models::{DailySummary, NewDailySummary, RawSample};
use crate::schema;

/// Advisory-lock namespace for per-day summary writes (ASCII "OKDS").
const SUMMARY_LOCK_NAMESPACE: i64 = 0x4F4B_4453;

#[derive(Debug)]
pub enum StatsError {
    /// Connection, query or transaction failure.
    Storage(String),
    /// Rejected before any computation started.
    InvalidInput(String),
}

impl Display for StatsError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            StatsError::Storage(e) => write!(f, "storage error: {}", e),
            StatsError::InvalidInput(e) => write!(f, "invalid input: {}", e),
        }
    }
}

impl Error for StatsError {}

impl From<diesel::result::Error> for StatsError {
    fn from(value: diesel::result::Error) -> Self {
        StatsError::Storage(value.to_string())
    }
}

/// Read access to raw samples.
pub trait SampleSource {
    /// Samples with `start <= time < end`, ascending by time.
    fn fetch_samples(&mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Vec<RawSample>, StatsError>;

    /// Timestamps of the earliest and latest stored sample.
    fn sample_bounds(&mut self) -> Result<Option<(DateTime<Utc>, DateTime<Utc>)>, StatsError>;
}

/// Persistence of daily summaries.
pub trait SummaryStore {
    /// Replace the newest record of `row.day` with `row`, or create one.
    /// Must not interleave with another upsert of the same day.
    fn upsert_summary(&mut self, row: &NewDailySummary) -> Result<DailySummary, StatsError>;

    fn summary_exists(&mut self, day: NaiveDate) -> Result<bool, StatsError>;

    /// Every record stored for `day`, in any order.
    fn summaries_for_day(&mut self, day: NaiveDate) -> Result<Vec<DailySummary>, StatsError>;

    /// Distinct days that have at least one record, ascending.
    fn summary_days(&mut self) -> Result<Vec<NaiveDate>, StatsError>;

    fn delete_summaries(&mut self, ids: &[i64]) -> Result<usize, StatsError>;

    fn delete_all_summaries(&mut self) -> Result<usize, StatsError>;
}

/// `updated_at` from the database clock, the same one the column default uses on insert.
fn touch_updated_at() -> diesel::dsl::Eq<schema::daily_summaries::updated_at, now> {
    schema::daily_summaries::updated_at.eq(now)
}

fn summary_lock_key(day: NaiveDate) -> i64 {
    (SUMMARY_LOCK_NAMESPACE << 32) | i64::from(day.num_days_from_ce())
}

impl SampleSource for PgConnection {
    fn fetch_samples(&mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Vec<RawSample>, StatsError> {
        use schema::raw_samples::dsl as R;

        R::raw_samples
            .filter(R::time.ge(start).and(R::time.lt(end)))
            .order(R::time.asc())
            .select(RawSample::as_select())
            .load(self)
            .map_err(|e| StatsError::Storage(format!("fetch samples [{start}, {end}) failed: {e}")))
    }

    fn sample_bounds(&mut self) -> Result<Option<(DateTime<Utc>, DateTime<Utc>)>, StatsError> {
        use schema::raw_samples::dsl as R;

        let (first, last): (Option<DateTime<Utc>>, Option<DateTime<Utc>>) = R::raw_samples
            .select((min(R::time), max(R::time)))
            .first(self)
            .map_err(|e| StatsError::Storage(format!("sample bounds query failed: {e}")))?;
        Ok(first.zip(last))
    }
}

impl SummaryStore for PgConnection {
    fn upsert_summary(&mut self, row: &NewDailySummary) -> Result<DailySummary, StatsError> {
        use schema::daily_summaries::dsl as D;

        self.transaction::<_, diesel::result::Error, _>(|conn| {
            // Serialises writers of the same day until commit/rollback.
            diesel::sql_query("SELECT pg_advisory_xact_lock($1)")
                .bind::<BigInt, _>(summary_lock_key(row.day))
                .execute(conn)?;

            let newest: Option<i64> = D::daily_summaries
                .filter(D::day.eq(row.day))
                .order((D::updated_at.desc(), D::id.desc()))
                .select(D::id)
                .first(conn)
                .optional()?;

            match newest {
                Some(id) => diesel::update(D::daily_summaries.find(id))
                    .set((row, touch_updated_at()))
                    .returning(DailySummary::as_returning())
                    .get_result(conn),
                None => diesel::insert_into(D::daily_summaries)
                    .values(row)
                    .returning(DailySummary::as_returning())
                    .get_result(conn),
            }
        })
        .map_err(|e| StatsError::Storage(format!("upsert summary for {} failed: {}", row.day, e)))
    }

    fn summary_exists(&mut self, day: NaiveDate) -> Result<bool, StatsError> {
        use schema::daily_summaries::dsl as D;

        diesel::select(exists(D::daily_summaries.filter(D::day.eq(day))))
            .get_result(self)
            .map_err(StatsError::from)
    }

    fn summaries_for_day(&mut self, day: NaiveDate) -> Result<Vec<DailySummary>, StatsError> {
        use schema::daily_summaries::dsl as D;

        D::daily_summaries
            .filter(D::day.eq(day))
            .select(DailySummary::as_select())
            .load(self)
            .map_err(StatsError::from)
    }

    fn summary_days(&mut self) -> Result<Vec<NaiveDate>, StatsError> {
        use schema::daily_summaries::dsl as D;

        D::daily_summaries
            .select(D::day)
            .distinct()
            .order(D::day.asc())
            .load(self)
            .map_err(StatsError::from)
    }

    fn delete_summaries(&mut self, ids: &[i64]) -> Result<usize, StatsError> {
        use schema::daily_summaries::dsl as D;

        if ids.is_empty() {
            return Ok(0);
        }
        diesel::delete(D::daily_summaries.filter(D::id.eq_any(ids)))
            .execute(self)
            .map_err(|e| StatsError::Storage(format!("delete summaries failed: {e}")))
    }

    fn delete_all_summaries(&mut self) -> Result<usize, StatsError> {
        use schema::daily_summaries::dsl as D;

        diesel::delete(D::daily_summaries)
            .execute(self)
            .map_err(|e| StatsError::Storage(format!("delete all summaries failed: {e}")))
    }
}
