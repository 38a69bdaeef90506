//! Day-bounded view over raw samples, addressed by channel.

use chrono::{DateTime, Utc};
use log::debug;

use crate::db::models::RawSample;
use crate::db::store::{SampleSource, StatsError};
use crate::services::window::DayWindow;

/// Named numeric channels of a [`RawSample`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Channel {
    ExteriorTemp,
    IndoorTemp,
    IndoorSetpoint,
    SiloLevel,
    HopperLevel,
    BoilerTemp,
    BoilerSetpoint,
    BoilerModulation,
    FlameTemp,
    FlameSetpoint,
    SupplyTemp,
    SupplySetpoint,
    HeatingPump,
    HeatingStatus,
    EcsTemp,
    EcsStopTemp,
    EcsSetpoint,
    EcsPump,
    EcsStatus,
}

impl Channel {
    pub fn read(self, s: &RawSample) -> Option<f64> {
        match self {
            Channel::ExteriorTemp => s.ext_temp_c,
            Channel::IndoorTemp => s.indoor_temp_c,
            Channel::IndoorSetpoint => s.indoor_setpoint_c,
            Channel::SiloLevel => s.silo_level_kg,
            Channel::HopperLevel => s.hopper_level_kg,
            Channel::BoilerTemp => s.boiler_temp_c,
            Channel::BoilerSetpoint => s.boiler_setpoint_c,
            Channel::BoilerModulation => s.boiler_modulation_pct,
            Channel::FlameTemp => s.flame_temp_c,
            Channel::FlameSetpoint => s.flame_setpoint_c,
            Channel::SupplyTemp => s.supply_temp_c,
            Channel::SupplySetpoint => s.supply_setpoint_c,
            Channel::HeatingPump => s.heating_pump,
            Channel::HeatingStatus => s.heating_status.map(f64::from),
            Channel::EcsTemp => s.ecs_temp_c,
            Channel::EcsStopTemp => s.ecs_stop_temp_c,
            Channel::EcsSetpoint => s.ecs_setpoint_c,
            Channel::EcsPump => s.ecs_pump,
            Channel::EcsStatus => s.ecs_status.map(f64::from),
        }
        .filter(|v| !v.is_nan())
    }
}

/// Samples of one operating day, ascending and unique by timestamp.
#[derive(Debug, Clone, Default)]
pub struct DaySeries {
    samples: Vec<RawSample>,
}

impl DaySeries {
    pub fn new(mut samples: Vec<RawSample>) -> Self {
        samples.sort_by_key(|s| s.time);
        samples.dedup_by_key(|s| s.time);
        DaySeries { samples }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// One entry per sample, `None` where the channel was not reported.
    pub fn column(&self, channel: Channel) -> impl Iterator<Item = Option<f64>> + '_ {
        self.samples.iter().map(move |s| channel.read(s))
    }

    /// Non-null `(time, value)` pairs of a channel.
    pub fn points(&self, channel: Channel) -> impl Iterator<Item = (DateTime<Utc>, f64)> + '_ {
        self.samples.iter().filter_map(move |s| channel.read(s).map(|v| (s.time, v)))
    }
}

/// Load the samples of `window` from `source`. A day without data yields an
/// empty series.
pub fn extract<S: SampleSource + ?Sized>(source: &mut S, window: &DayWindow) -> Result<DaySeries, StatsError> {
    let mut samples = source.fetch_samples(window.start, window.end)?;
    samples.retain(|s| window.contains(s.time));
    debug!(
        "Series: day {} has {} sample(s) in [{}, {})",
        window.day,
        samples.len(),
        window.start,
        window.end
    );
    Ok(DaySeries::new(samples))
}
