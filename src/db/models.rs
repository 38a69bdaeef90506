//! Diesel model structs for raw boiler readings and the per-day summaries
//! derived from them.
//!
//! `raw_samples` is written by the ingestion side (or the synthetic generator)
//! and only ever read here; `daily_summaries` is owned by the aggregation code.

use chrono::{DateTime, NaiveDate, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use crate::schema;
use crate::services::aggregate::DayStats;
use crate::services::window::DayWindow;

/// One boiler reading. Every channel is nullable; only the timestamp is mandatory.
#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Insertable, Serialize, Deserialize)]
#[diesel(table_name = schema::raw_samples)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct RawSample {
    pub time: DateTime<Utc>,
    pub ext_temp_c: Option<f64>,
    pub indoor_temp_c: Option<f64>,
    pub indoor_setpoint_c: Option<f64>,
    pub silo_level_kg: Option<f64>,
    pub hopper_level_kg: Option<f64>,
    pub boiler_temp_c: Option<f64>,
    pub boiler_setpoint_c: Option<f64>,
    pub boiler_modulation_pct: Option<f64>,
    pub flame_temp_c: Option<f64>,
    pub flame_setpoint_c: Option<f64>,
    pub supply_temp_c: Option<f64>,
    pub supply_setpoint_c: Option<f64>,
    pub heating_pump: Option<f64>,
    pub heating_status: Option<i32>,
    pub ecs_temp_c: Option<f64>,
    pub ecs_stop_temp_c: Option<f64>,
    pub ecs_setpoint_c: Option<f64>,
    pub ecs_pump: Option<f64>,
    pub ecs_status: Option<i32>,
}

impl RawSample {
    /// A reading at `time` with every channel unset.
    pub fn new(time: DateTime<Utc>) -> Self {
        RawSample {
            time,
            ext_temp_c: None,
            indoor_temp_c: None,
            indoor_setpoint_c: None,
            silo_level_kg: None,
            hopper_level_kg: None,
            boiler_temp_c: None,
            boiler_setpoint_c: None,
            boiler_modulation_pct: None,
            flame_temp_c: None,
            flame_setpoint_c: None,
            supply_temp_c: None,
            supply_setpoint_c: None,
            heating_pump: None,
            heating_status: None,
            ecs_temp_c: None,
            ecs_stop_temp_c: None,
            ecs_setpoint_c: None,
            ecs_pump: None,
            ecs_status: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Queryable, Identifiable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = schema::daily_summaries)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct DailySummary {
    pub id: i64,
    pub day: NaiveDate,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub sample_count: i32,
    pub boiler_on_seconds: f64,
    pub pellet_consumed_kg: f64,
    pub ext_temp_mean: Option<f64>,
    pub ext_temp_night_mean: Option<f64>,
    pub boiler_water_temp_mean: Option<f64>,
    pub supply_temp_mean: Option<f64>,
    pub indoor_temp_mean: Option<f64>,
    pub indoor_temp_night_mean: Option<f64>,
    pub ecs_temp_heat_mean: Option<f64>,
    pub ecs_temp_global_mean: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Insert/replace payload for `daily_summaries`.
///
/// `treat_none_as_null` makes an update overwrite every mean, so a recomputed
/// day never keeps a stale value from an earlier run.
#[derive(Debug, Clone, PartialEq, Insertable, AsChangeset, Serialize, Deserialize)]
#[diesel(table_name = schema::daily_summaries)]
#[diesel(treat_none_as_null = true)]
pub struct NewDailySummary {
    pub day: NaiveDate,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub sample_count: i32,
    pub boiler_on_seconds: f64,
    pub pellet_consumed_kg: f64,
    pub ext_temp_mean: Option<f64>,
    pub ext_temp_night_mean: Option<f64>,
    pub boiler_water_temp_mean: Option<f64>,
    pub supply_temp_mean: Option<f64>,
    pub indoor_temp_mean: Option<f64>,
    pub indoor_temp_night_mean: Option<f64>,
    pub ecs_temp_heat_mean: Option<f64>,
    pub ecs_temp_global_mean: Option<f64>,
}

impl NewDailySummary {
    pub fn new(window: &DayWindow, stats: &DayStats) -> Self {
        NewDailySummary {
            day: window.day,
            window_start: window.start,
            window_end: window.end,
            sample_count: i32::try_from(stats.sample_count).unwrap_or(i32::MAX),
            boiler_on_seconds: stats.boiler_on_seconds,
            pellet_consumed_kg: stats.pellet_consumed_kg,
            ext_temp_mean: stats.ext_temp_mean,
            ext_temp_night_mean: stats.ext_temp_night_mean,
            boiler_water_temp_mean: stats.boiler_water_temp_mean,
            supply_temp_mean: stats.supply_temp_mean,
            indoor_temp_mean: stats.indoor_temp_mean,
            indoor_temp_night_mean: stats.indoor_temp_night_mean,
            ecs_temp_heat_mean: stats.ecs_temp_heat_mean,
            ecs_temp_global_mean: stats.ecs_temp_global_mean,
        }
    }
}

impl DailySummary {
    /// The computed part of the row, without identity and bookkeeping timestamps.
    #[cfg(test)]
    pub fn values(&self) -> NewDailySummary {
        NewDailySummary {
            day: self.day,
            window_start: self.window_start,
            window_end: self.window_end,
            sample_count: self.sample_count,
            boiler_on_seconds: self.boiler_on_seconds,
            pellet_consumed_kg: self.pellet_consumed_kg,
            ext_temp_mean: self.ext_temp_mean,
            ext_temp_night_mean: self.ext_temp_night_mean,
            boiler_water_temp_mean: self.boiler_water_temp_mean,
            supply_temp_mean: self.supply_temp_mean,
            indoor_temp_mean: self.indoor_temp_mean,
            indoor_temp_night_mean: self.indoor_temp_night_mean,
            ecs_temp_heat_mean: self.ecs_temp_heat_mean,
            ecs_temp_global_mean: self.ecs_temp_global_mean,
        }
    }
}
