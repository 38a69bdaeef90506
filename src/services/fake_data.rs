//! Synthetic boiler history for development databases.
//!
//! The simulation runs at the appliance's one-minute export cadence: outdoor
//! temperature follows season and time of day, the heating circuit asks for
//! heat below a comfort limit (with a night setback), hot water is reheated
//! twice a day, and the burner cycles to keep the boiler water warm while
//! draining the hopper, which is refilled from the silo.

use crate::config::AggregationConfig;
use crate::db::models::RawSample;
use crate::services::ingest::insert_raw_samples;
use crate::services::window::{DayWindow, operating_day};
use chrono::{DateTime, Datelike, Days, Duration, Timelike, Utc};
use diesel::PgConnection;
use log::info;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use std::f64::consts::PI;

const SEED: u64 = 0x0C0F_E200_2024_0103;
const STEP_MINUTES: i64 = 1;
const HOPPER_CAPACITY_KG: f64 = 120.0;
const HOPPER_REFILL_BELOW_KG: f64 = 25.0;
const SILO_CAPACITY_KG: f64 = 3_000.0;
const SILO_DELIVERY_BELOW_KG: f64 = 300.0;
const BURN_RATE_KG_PER_MIN: f64 = 0.03;
const HEATING_LIMIT_C: f64 = 15.0;
const ECS_SETPOINT_C: f64 = 55.0;
const ECS_IDLE_SETPOINT_C: f64 = 10.0;
const BOILER_TARGET_C: f64 = 70.0;

/// Seed `days` operating days, up to now, and return the number of inserted rows.
pub fn run(conn: &mut PgConnection, cfg: &AggregationConfig, days: u32) -> Result<usize, String> {
    if days == 0 {
        return Err("fake data needs at least one day".to_string());
    }
    let now = Utc::now();
    let first_day = operating_day(now, cfg)
        .checked_sub_days(Days::new(u64::from(days - 1)))
        .ok_or_else(|| format!("fake data: {days} day(s) reach before the first representable date"))?;
    let mut day_start = DayWindow::resolve(first_day, cfg).start;
    let mut rng = SmallRng::seed_from_u64(SEED);
    let mut boiler = BoilerState::default();
    let mut inserted = 0;

    info!("Fake data: generating {} day(s) from {} to {}", days, day_start, now);
    while day_start < now {
        let day_end = (day_start + Duration::days(1)).min(now);
        let rows = synthesize(&mut boiler, day_start, day_end, cfg, &mut rng);
        inserted += insert_raw_samples(conn, &rows)?;
        day_start = day_end;
    }
    info!("Fake data: complete (inserted={})", inserted);
    Ok(inserted)
}

#[derive(Debug, Clone)]
pub struct BoilerState {
    hopper_kg: f64,
    silo_kg: f64,
    boiler_c: f64,
    flame_c: f64,
    ecs_c: f64,
    indoor_c: f64,
    burn_minutes_left: i64,
}

impl Default for BoilerState {
    fn default() -> Self {
        BoilerState {
            hopper_kg: 90.0,
            silo_kg: 2_000.0,
            boiler_c: 55.0,
            flame_c: 60.0,
            ecs_c: 45.0,
            indoor_c: 19.5,
            burn_minutes_left: 0,
        }
    }
}

/// One-minute samples in `[start, end)`, advancing `state`.
pub fn synthesize(
    state: &mut BoilerState,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    cfg: &AggregationConfig,
    rng: &mut SmallRng,
) -> Vec<RawSample> {
    let step = Duration::minutes(STEP_MINUTES);
    let mut rows = Vec::with_capacity(((end - start).num_minutes() / STEP_MINUTES).max(0) as usize);
    let mut ts = start;
    while ts < end {
        rows.push(state.step(ts, cfg, rng));
        ts += step;
    }
    rows
}

impl BoilerState {
    fn step(&mut self, ts: DateTime<Utc>, cfg: &AggregationConfig, rng: &mut SmallRng) -> RawSample {
        let local = cfg.zone.to_local(ts);
        let hour = local.hour();
        let day_fraction = f64::from(local.num_seconds_from_midnight()) / 86_400.0;
        let annual_fraction = f64::from(local.ordinal0()) / 365.0;

        let outside = outside_temp(day_fraction, annual_fraction, rng);
        let setback = !(6..22).contains(&hour);
        let indoor_setpoint = if setback { 18.0 } else { 20.5 };

        let heating = outside < HEATING_LIMIT_C && self.indoor_c < indoor_setpoint + 0.5;
        let supply_setpoint = if heating {
            (30.0 + (HEATING_LIMIT_C - outside) * 1.2).min(60.0)
        } else {
            0.0
        };
        let ecs_setpoint = if matches!(hour, 5 | 6 | 17 | 18) {
            ECS_SETPOINT_C
        } else {
            ECS_IDLE_SETPOINT_C
        };
        let ecs_demand = self.ecs_c < ecs_setpoint - 3.0;

        if self.burn_minutes_left == 0 && (heating || ecs_demand) && self.boiler_c < BOILER_TARGET_C - 8.0 {
            self.burn_minutes_left = rng.random_range(20..=50);
        }
        let burning = self.burn_minutes_left > 0;
        if burning {
            self.burn_minutes_left -= 1;
            self.flame_c = (self.flame_c + 45.0).min(rng.random_range(380.0..=460.0));
            self.boiler_c = (self.boiler_c + 0.6).min(BOILER_TARGET_C + 10.0);
            self.hopper_kg -= BURN_RATE_KG_PER_MIN * rng.random_range(0.8..=1.2);
        } else {
            self.flame_c = 40.0 + (self.flame_c - 40.0) * 0.88;
            self.boiler_c = (self.boiler_c - 0.12).max(outside.max(15.0));
        }
        if self.hopper_kg < HOPPER_REFILL_BELOW_KG {
            let transfer = (HOPPER_CAPACITY_KG - self.hopper_kg).min(self.silo_kg);
            self.hopper_kg += transfer;
            self.silo_kg -= transfer;
        }
        if self.silo_kg < SILO_DELIVERY_BELOW_KG {
            self.silo_kg = SILO_CAPACITY_KG;
        }

        let ecs_pump = ecs_demand && self.boiler_c > self.ecs_c + 5.0;
        if ecs_pump {
            self.ecs_c = (self.ecs_c + 0.4).min(ECS_SETPOINT_C + 2.0);
            self.boiler_c -= 0.2;
        } else {
            self.ecs_c = (self.ecs_c - 0.01).max(20.0);
        }

        let supply = if heating {
            supply_setpoint.min(self.boiler_c) + rng.random_range(-0.5..=0.5)
        } else {
            self.indoor_c + 2.0
        };
        self.indoor_c += if heating { 0.01 } else { (outside - self.indoor_c) * 0.0004 };

        let mut row = RawSample::new(ts);
        // the outdoor probe drops a reading now and then
        row.ext_temp_c = (!rng.random_bool(0.002)).then_some(round1(outside));
        row.indoor_temp_c = Some(round1(self.indoor_c + rng.random_range(-0.1..=0.1)));
        row.indoor_setpoint_c = Some(indoor_setpoint);
        row.silo_level_kg = Some(self.silo_kg.round());
        row.hopper_level_kg = Some(round1(self.hopper_kg));
        row.boiler_temp_c = Some(round1(self.boiler_c));
        row.boiler_setpoint_c = Some(BOILER_TARGET_C);
        row.boiler_modulation_pct = Some(if burning { rng.random_range(30.0..=100.0_f64).round() } else { 0.0 });
        row.flame_temp_c = Some(round1(self.flame_c));
        row.flame_setpoint_c = Some(if burning { 420.0 } else { 0.0 });
        row.supply_temp_c = Some(round1(supply));
        row.supply_setpoint_c = Some(round1(supply_setpoint));
        row.heating_pump = Some(if heating { 1.0 } else { 0.0 });
        row.heating_status = Some(if heating { 1 } else { 0 });
        row.ecs_temp_c = Some(round1(self.ecs_c));
        row.ecs_stop_temp_c = Some(round1(self.ecs_c - 1.5));
        row.ecs_setpoint_c = Some(ecs_setpoint);
        row.ecs_pump = Some(if ecs_pump { 1.0 } else { 0.0 });
        row.ecs_status = Some(if ecs_setpoint > ECS_IDLE_SETPOINT_C { 1 } else { 0 });
        row
    }
}

fn outside_temp(day_fraction: f64, annual_fraction: f64, rng: &mut SmallRng) -> f64 {
    // coldest mid-January, warmest mid-July
    let seasonal = -((annual_fraction - 0.04) * 2.0 * PI).cos() * 9.0;
    let diurnal = ((day_fraction - 0.35) * 2.0 * PI).sin() * 4.0;
    let noise = rng.random_range(-0.4..=0.4);
    (10.0 + seasonal + diurnal + noise).clamp(-15.0, 35.0)
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ZoneSpec;
    use crate::services::aggregate;
    use crate::services::series::DaySeries;
    use chrono::{FixedOffset, NaiveDate};

    fn cfg() -> AggregationConfig {
        AggregationConfig {
            zone: ZoneSpec::Fixed(FixedOffset::east_opt(3600).unwrap()),
            ..AggregationConfig::default()
        }
    }

    fn winter_day() -> (DayWindow, Vec<RawSample>) {
        let cfg = cfg();
        let window = DayWindow::resolve(NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(), &cfg);
        let mut rng = SmallRng::seed_from_u64(SEED);
        let rows = synthesize(&mut BoilerState::default(), window.start, window.end, &cfg, &mut rng);
        (window, rows)
    }

    #[test]
    fn one_sample_per_minute() {
        let (window, rows) = winter_day();
        assert_eq!(rows.len(), 24 * 60);
        assert_eq!(rows[0].time, window.start);
        assert!(rows.windows(2).all(|w| w[1].time - w[0].time == Duration::minutes(1)));
        assert!(rows.iter().all(|r| window.contains(r.time)));
    }

    #[test]
    fn generation_is_deterministic() {
        assert_eq!(winter_day().1, winter_day().1);
    }

    #[test]
    fn winter_day_burns_pellets() {
        let (window, rows) = winter_day();
        assert!(rows.iter().all(|r| r.hopper_level_kg.is_some_and(|h| h >= 0.0)));
        let stats = aggregate::compute(&DaySeries::new(rows), &window, &cfg());
        assert!(stats.boiler_on_seconds > 0.0);
        assert!(stats.boiler_on_seconds < 86_400.0);
        assert!(stats.pellet_consumed_kg > 0.0);
        assert!(stats.ext_temp_mean.is_some());
        assert!(stats.ecs_temp_heat_mean.is_some());
        assert!(stats.indoor_temp_night_mean.is_some());
    }
}
