//! Daily metrics computed from one operating day of samples.
//!
//! Every metric is computed on its own and degrades to `0.0` or `None` when its
//! channel is missing, so a partial day never aborts the whole summary.

use chrono::{DateTime, Utc};
use log::debug;
use serde::Serialize;

use crate::config::AggregationConfig;
use crate::services::series::{Channel, DaySeries};
use crate::services::window::DayWindow;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DayStats {
    pub sample_count: usize,
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

pub fn compute(series: &DaySeries, window: &DayWindow, cfg: &AggregationConfig) -> DayStats {
    if series.is_empty() {
        return DayStats::default();
    }

    let heating = heating_mask(series);
    match &heating {
        Some((signal, mask)) => debug!(
            "Aggregate: day {} heating detected from {:?} on {}/{} sample(s)",
            window.day,
            signal,
            mask.iter().filter(|m| **m).count(),
            mask.len()
        ),
        None => debug!("Aggregate: day {} has no heating signal; means use the whole day", window.day),
    }
    let mask = heating.as_ref().map(|(_, m)| m.as_slice());
    let (night_start, night_end) = window.night(cfg);
    let ecs = ecs_means(series, cfg.ecs_heating_setpoint_c);

    DayStats {
        sample_count: series.len(),
        boiler_on_seconds: boiler_on_seconds(series, cfg.flame_on_threshold_c),
        pellet_consumed_kg: descent_sum(series.points(Channel::HopperLevel).map(|(_, v)| v)),
        ext_temp_mean: masked_mean(series, Channel::ExteriorTemp, mask),
        ext_temp_night_mean: window_mean(series, Channel::ExteriorTemp, night_start, night_end),
        boiler_water_temp_mean: masked_mean(series, Channel::BoilerTemp, mask),
        supply_temp_mean: masked_mean(series, Channel::SupplyTemp, mask),
        indoor_temp_mean: masked_mean(series, Channel::IndoorTemp, mask),
        indoor_temp_night_mean: window_mean(series, Channel::IndoorTemp, night_start, night_end),
        ecs_temp_heat_mean: ecs.heating,
        ecs_temp_global_mean: ecs.global,
    }
}

/// Seconds during which the flame was at or above `threshold_c`.
///
/// Each reading is held until the next one (zero-order hold); the last reading
/// of the day opens no interval.
pub fn boiler_on_seconds(series: &DaySeries, threshold_c: f64) -> f64 {
    let points: Vec<(DateTime<Utc>, f64)> = series.points(Channel::FlameTemp).collect();
    points
        .iter()
        .zip(points.iter().skip(1))
        .filter(|((_, flame), _)| *flame >= threshold_c)
        .map(|((current, _), (next, _))| (*next - *current).num_milliseconds() as f64 / 1000.0)
        .filter(|secs| *secs > 0.0)
        .sum()
}

/// Total of all drops between successive values, as a positive quantity.
/// Rises (refills) are ignored rather than netted against the drops.
pub fn descent_sum(values: impl IntoIterator<Item = f64>) -> f64 {
    let mut values = values.into_iter().filter(|v| !v.is_nan());
    let Some(mut previous) = values.next() else {
        return 0.0;
    };
    let mut consumed = 0.0;
    for value in values {
        let diff = value - previous;
        if diff < 0.0 {
            consumed -= diff;
        }
        previous = value;
    }
    if consumed.is_nan() { 0.0 } else { consumed }
}

/// Channels that can tell whether the heating circuit is active, in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeatingSignal {
    StatusCode,
    SupplySetpoint,
    CirculationPump,
}

impl HeatingSignal {
    pub const PRIORITY: [HeatingSignal; 3] = [
        HeatingSignal::StatusCode,
        HeatingSignal::SupplySetpoint,
        HeatingSignal::CirculationPump,
    ];

    pub fn channel(self) -> Channel {
        match self {
            HeatingSignal::StatusCode => Channel::HeatingStatus,
            HeatingSignal::SupplySetpoint => Channel::SupplySetpoint,
            HeatingSignal::CirculationPump => Channel::HeatingPump,
        }
    }

    /// Per-sample "heating" flags, or `None` when the signal never fires.
    /// Missing values count as not heating.
    pub fn mask(self, series: &DaySeries) -> Option<Vec<bool>> {
        let mask: Vec<bool> = series.column(self.channel()).map(|v| v.unwrap_or(0.0) > 0.0).collect();
        mask.iter().any(|m| *m).then_some(mask)
    }
}

/// First signal in [`HeatingSignal::PRIORITY`] that yields a non-trivial mask.
pub fn heating_mask(series: &DaySeries) -> Option<(HeatingSignal, Vec<bool>)> {
    HeatingSignal::PRIORITY
        .iter()
        .find_map(|signal| signal.mask(series).map(|mask| (*signal, mask)))
}

fn mean(values: impl IntoIterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values.into_iter().fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    (count > 0).then(|| sum / count as f64)
}

/// Mean of `channel` over the samples selected by `mask`, falling back to the
/// whole day when there is no mask or it selects no value.
pub fn masked_mean(series: &DaySeries, channel: Channel, mask: Option<&[bool]>) -> Option<f64> {
    if let Some(mask) = mask {
        let selected = series
            .column(channel)
            .zip(mask.iter())
            .filter_map(|(value, keep)| if *keep { value } else { None });
        if let Some(m) = mean(selected) {
            return Some(m);
        }
    }
    mean(series.points(channel).map(|(_, v)| v))
}

/// Mean of `channel` over samples with `start <= time < end`.
pub fn window_mean(series: &DaySeries, channel: Channel, start: DateTime<Utc>, end: DateTime<Utc>) -> Option<f64> {
    mean(
        series
            .points(channel)
            .filter(|(t, _)| *t >= start && *t < end)
            .map(|(_, v)| v),
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EcsMeans {
    /// While the hot-water setpoint is above the heating threshold.
    pub heating: Option<f64>,
    pub global: Option<f64>,
}

pub fn ecs_means(series: &DaySeries, setpoint_threshold_c: f64) -> EcsMeans {
    let global = mean(series.points(Channel::EcsTemp).map(|(_, v)| v));
    if global.is_none() {
        return EcsMeans::default();
    }
    let heating = mean(
        series
            .column(Channel::EcsTemp)
            .zip(series.column(Channel::EcsSetpoint))
            .filter_map(|(temp, setpoint)| match setpoint {
                Some(sp) if sp > setpoint_threshold_c => temp,
                _ => None,
            }),
    );
    EcsMeans { heating, global }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ZoneSpec;
    use crate::db::models::RawSample;
    use chrono::{Duration, FixedOffset, NaiveDate, TimeZone};

    fn cfg() -> AggregationConfig {
        AggregationConfig {
            zone: ZoneSpec::Fixed(FixedOffset::east_opt(0).unwrap()),
            ..AggregationConfig::default()
        }
    }

    fn window() -> DayWindow {
        DayWindow::resolve(NaiveDate::from_ymd_opt(2024, 1, 10).unwrap(), &cfg())
    }

    fn at(minutes: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 10, 3, 0, 0).unwrap() + Duration::minutes(minutes)
    }

    fn series_of(samples: impl IntoIterator<Item = RawSample>) -> DaySeries {
        DaySeries::new(samples.into_iter().collect())
    }

    fn flame_series(points: &[(i64, f64)]) -> DaySeries {
        series_of(points.iter().map(|(m, flame)| {
            let mut s = RawSample::new(at(*m));
            s.flame_temp_c = Some(*flame);
            s
        }))
    }

    #[test]
    fn alternating_flame_hours_sum_to_four_hours() {
        // 250 for an hour, 100 for an hour, four times, plus the closing point at 03:00 next day
        let mut points = Vec::new();
        for cycle in 0..4 {
            let base = cycle * 120;
            for m in (0..60).step_by(10) {
                points.push((base + m, 250.0));
            }
            for m in (60..120).step_by(10) {
                points.push((base + m, 100.0));
            }
        }
        points.push((480, 100.0));
        let series = flame_series(&points);
        assert_eq!(boiler_on_seconds(&series, 200.0), 14_400.0);
    }

    #[test]
    fn last_sample_opens_no_interval() {
        assert_eq!(boiler_on_seconds(&flame_series(&[(0, 300.0)]), 200.0), 0.0);
        assert_eq!(boiler_on_seconds(&flame_series(&[(0, 100.0), (5, 300.0)]), 200.0), 0.0);
        assert_eq!(boiler_on_seconds(&flame_series(&[(0, 300.0), (5, 100.0)]), 200.0), 300.0);
    }

    #[test]
    fn threshold_is_inclusive_and_gaps_are_skipped() {
        let mut missing = RawSample::new(at(5));
        missing.ext_temp_c = Some(3.0);
        let mut on = RawSample::new(at(0));
        on.flame_temp_c = Some(200.0);
        let mut off = RawSample::new(at(10));
        off.flame_temp_c = Some(20.0);
        // the null flame at minute 5 is dropped, so the hold runs 0 -> 10
        let series = series_of([on, missing, off]);
        assert_eq!(boiler_on_seconds(&series, 200.0), 600.0);
        assert_eq!(boiler_on_seconds(&DaySeries::default(), 200.0), 0.0);
    }

    #[test]
    fn longer_flame_never_shortens_duration() {
        let mut previous = 0.0;
        for on_minutes in [0, 10, 20, 30, 60, 90] {
            let mut points: Vec<(i64, f64)> = (0..=120).step_by(10).map(|m| (m, 50.0)).collect();
            for point in points.iter_mut().filter(|(m, _)| *m < on_minutes) {
                point.1 = 260.0;
            }
            let secs = boiler_on_seconds(&flame_series(&points), 200.0);
            assert!(secs >= previous);
            assert_eq!(secs, on_minutes as f64 * 60.0);
            previous = secs;
        }
    }

    #[test]
    fn refills_do_not_offset_consumption() {
        assert_eq!(descent_sum([80.0, 75.0, 90.0, 70.0]), 25.0);
        assert_eq!(descent_sum([80.0, 75.0, 70.0]), 10.0);
        // a refill jump in the middle of a steady burn changes nothing
        assert_eq!(descent_sum([80.0, 75.0, 95.0, 95.0, 70.0]), 30.0);
        assert_eq!(descent_sum([80.0, 75.0, 75.0, 70.0, 70.0]), 10.0);
        assert_eq!(descent_sum(Vec::<f64>::new()), 0.0);
        assert_eq!(descent_sum([42.0]), 0.0);
        assert_eq!(descent_sum([f64::NAN, 10.0, f64::NAN, 4.0]), 6.0);
    }

    fn heating_sample(m: i64, status: Option<i32>, setpoint: Option<f64>, pump: Option<f64>) -> RawSample {
        let mut s = RawSample::new(at(m));
        s.heating_status = status;
        s.supply_setpoint_c = setpoint;
        s.heating_pump = pump;
        s
    }

    #[test]
    fn heating_mask_prefers_status_code() {
        let series = series_of([
            heating_sample(0, Some(1), Some(0.0), Some(1.0)),
            heating_sample(1, Some(0), Some(45.0), Some(1.0)),
        ]);
        let (signal, mask) = heating_mask(&series).unwrap();
        assert_eq!(signal, HeatingSignal::StatusCode);
        assert_eq!(mask, vec![true, false]);
    }

    #[test]
    fn heating_mask_falls_through_trivial_candidates() {
        let series = series_of([
            heating_sample(0, Some(0), None, Some(0.0)),
            heating_sample(1, Some(0), None, Some(1.0)),
        ]);
        let (signal, mask) = heating_mask(&series).unwrap();
        assert_eq!(signal, HeatingSignal::CirculationPump);
        assert_eq!(mask, vec![false, true]);

        let series = series_of([heating_sample(0, None, Some(38.0), None), heating_sample(1, None, None, None)]);
        assert_eq!(heating_mask(&series).unwrap().0, HeatingSignal::SupplySetpoint);

        let idle = series_of([heating_sample(0, Some(0), Some(0.0), Some(0.0))]);
        assert_eq!(heating_mask(&idle), None);
        assert_eq!(heating_mask(&DaySeries::default()), None);
    }

    fn temp_sample(m: i64, ext: Option<f64>, status: i32) -> RawSample {
        let mut s = RawSample::new(at(m));
        s.ext_temp_c = ext;
        s.heating_status = Some(status);
        s
    }

    #[test]
    fn masked_mean_restricts_then_falls_back() {
        let series = series_of([
            temp_sample(0, Some(2.0), 1),
            temp_sample(1, Some(4.0), 1),
            temp_sample(2, Some(10.0), 0),
            temp_sample(3, None, 1),
        ]);
        let mask = heating_mask(&series).map(|(_, m)| m);
        assert_eq!(masked_mean(&series, Channel::ExteriorTemp, mask.as_deref()), Some(3.0));
        assert_eq!(masked_mean(&series, Channel::ExteriorTemp, None), Some(16.0 / 3.0));

        // mask only selects rows where the channel is null
        let sparse = series_of([temp_sample(0, None, 1), temp_sample(1, Some(8.0), 0), temp_sample(2, Some(6.0), 0)]);
        let mask = heating_mask(&sparse).map(|(_, m)| m);
        assert_eq!(masked_mean(&sparse, Channel::ExteriorTemp, mask.as_deref()), Some(7.0));

        assert_eq!(masked_mean(&sparse, Channel::IndoorTemp, mask.as_deref()), None);
    }

    #[test]
    fn night_window_excludes_its_end() {
        let w = window();
        let (start, end) = w.night(&cfg());
        let mut samples = Vec::new();
        for (m, t) in [(0, 1.0), (60, 3.0), (119, 5.0), (120, 100.0), (240, 100.0)] {
            let mut s = RawSample::new(start + Duration::minutes(m));
            s.indoor_temp_c = Some(t);
            samples.push(s);
        }
        let series = DaySeries::new(samples);
        assert_eq!(window_mean(&series, Channel::IndoorTemp, start, end), Some(3.0));
        assert_eq!(window_mean(&series, Channel::ExteriorTemp, start, end), None);
        assert_eq!(window_mean(&series, Channel::IndoorTemp, end + Duration::hours(5), w.end), None);
    }

    fn ecs_sample(m: i64, temp: Option<f64>, setpoint: Option<f64>) -> RawSample {
        let mut s = RawSample::new(at(m));
        s.ecs_temp_c = temp;
        s.ecs_setpoint_c = setpoint;
        s
    }

    #[test]
    fn ecs_means_split_heating_and_global() {
        let series = series_of([
            ecs_sample(0, Some(50.0), Some(55.0)),
            ecs_sample(1, Some(54.0), Some(55.0)),
            ecs_sample(2, Some(38.0), Some(40.0)),
            ecs_sample(3, None, Some(55.0)),
        ]);
        let means = ecs_means(&series, 40.0);
        assert_eq!(means.heating, Some(52.0));
        assert_eq!(means.global, Some(142.0 / 3.0));
    }

    #[test]
    fn ecs_heating_mean_needs_setpoint() {
        let series = series_of([ecs_sample(0, Some(50.0), None), ecs_sample(1, Some(40.0), None)]);
        assert_eq!(ecs_means(&series, 40.0), EcsMeans { heating: None, global: Some(45.0) });

        let cold = series_of([ecs_sample(0, Some(30.0), Some(35.0))]);
        assert_eq!(ecs_means(&cold, 40.0), EcsMeans { heating: None, global: Some(30.0) });

        let no_temp = series_of([ecs_sample(0, None, Some(55.0))]);
        assert_eq!(ecs_means(&no_temp, 40.0), EcsMeans::default());
    }

    #[test]
    fn empty_day_is_all_zero_and_null() {
        let stats = compute(&DaySeries::default(), &window(), &cfg());
        assert_eq!(stats, DayStats::default());
        assert_eq!(stats.sample_count, 0);
        assert_eq!(stats.boiler_on_seconds, 0.0);
        assert_eq!(stats.pellet_consumed_kg, 0.0);
        assert!(stats.ext_temp_mean.is_none() && stats.ecs_temp_global_mean.is_none());
    }

    #[test]
    fn full_day_maps_metrics_to_fields() {
        let w = window();
        let mut samples = Vec::new();
        for (i, m) in (0..=180).step_by(30).enumerate() {
            let mut s = RawSample::new(w.start + Duration::minutes(m));
            let burning = i % 2 == 0;
            s.flame_temp_c = Some(if burning { 240.0 } else { 90.0 });
            s.heating_status = Some(i32::from(burning));
            s.hopper_level_kg = Some(50.0 - i as f64);
            s.ext_temp_c = Some(i as f64);
            s.indoor_temp_c = Some(19.0);
            s.boiler_temp_c = Some(if burning { 70.0 } else { 60.0 });
            s.supply_temp_c = Some(if burning { 45.0 } else { 30.0 });
            samples.push(s);
        }
        let stats = compute(&DaySeries::new(samples), &w, &cfg());

        assert_eq!(stats.sample_count, 7);
        // burning at 0, 60, 120, 180 (last opens no interval)
        assert_eq!(stats.boiler_on_seconds, 3.0 * 1800.0);
        assert_eq!(stats.pellet_consumed_kg, 6.0);
        assert_eq!(stats.ext_temp_mean, Some(3.0)); // 0, 2, 4, 6
        assert_eq!(stats.ext_temp_night_mean, Some(1.5)); // 0..=3 before 05:00
        assert_eq!(stats.boiler_water_temp_mean, Some(70.0));
        assert_eq!(stats.supply_temp_mean, Some(45.0));
        assert_eq!(stats.indoor_temp_mean, Some(19.0));
        assert_eq!(stats.indoor_temp_night_mean, Some(19.0));
        assert_eq!(stats.ecs_temp_heat_mean, None);
        assert_eq!(stats.ecs_temp_global_mean, None);
    }
}
