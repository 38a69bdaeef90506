use crate::db::models::RawSample;
use crate::schema;
use diesel::PgConnection;
use diesel::prelude::*;

/// Rows per INSERT; 20 bind parameters each keeps a batch well under PostgreSQL's 65535 limit.
pub const INSERT_BATCH: usize = 1_000;

/// Insert samples, leaving already stored timestamps untouched. Returns the number of new rows.
pub fn insert_raw_samples(conn: &mut PgConnection, rows: &[RawSample]) -> Result<usize, String> {
    use schema::raw_samples::dsl as R;

    let mut inserted = 0;
    for chunk in rows.chunks(INSERT_BATCH) {
        inserted += diesel::insert_into(R::raw_samples)
            .values(chunk)
            .on_conflict(R::time)
            .do_nothing()
            .execute(conn)
            .map_err(|e| format!("insert raw samples failed: {}", e))?;
    }
    Ok(inserted)
}
