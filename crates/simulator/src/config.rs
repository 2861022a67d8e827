use std::{env, str::FromStr, time::Duration};

use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationMilliSeconds, DurationSeconds};

use crate::error::SetupError;

/// Tunables of the trip simulation. The speed is a simulation constant and
/// has nothing to do with real bus speeds.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SimulatorConfig {
    pub speed_km_per_hour: f64,
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub tick_interval: Duration,
    /// Distance at which the bus counts as arrived at its target.
    pub arrival_tolerance_km: f64,
    #[serde_as(as = "DurationSeconds<u64>")]
    pub boarding_timeout: Duration,
    /// How far a stop may be from a path vertex and still match it.
    pub path_match_tolerance_km: f64,
    /// Assumed speed for the displayed ETA.
    pub eta_speed_km_per_hour: f64,
    /// Keep moving the bus to the end of its route after the rider alighted.
    pub continue_after_alight: bool,
    /// Delay between alighting and the end of the tracking session.
    #[serde_as(as = "DurationSeconds<u64>")]
    pub finish_delay: Duration,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            speed_km_per_hour: 1000.0,
            tick_interval: Duration::from_secs(1),
            arrival_tolerance_km: 0.1,
            boarding_timeout: Duration::from_secs(30),
            path_match_tolerance_km: 0.05,
            eta_speed_km_per_hour: 40.0,
            continue_after_alight: true,
            finish_delay: Duration::from_secs(3),
        }
    }
}

/// Parses an environment variable, logging values that do not parse.
pub fn env_value<T: FromStr>(key: &str) -> Option<T> {
    let raw = env::var(key).ok()?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            log::warn!("ignoring {}: can not parse {:?}", key, raw);
            None
        }
    }
}

impl SimulatorConfig {
    /// Defaults, overridden by `BUS_*` environment variables where set.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(value) = env_value("BUS_SPEED_KMH") {
            config.speed_km_per_hour = value;
        }
        if let Some(value) = env_value("BUS_TICK_MS") {
            config.tick_interval = Duration::from_millis(value);
        }
        if let Some(value) = env_value("BUS_ARRIVAL_TOLERANCE_KM") {
            config.arrival_tolerance_km = value;
        }
        if let Some(value) = env_value("BUS_BOARDING_TIMEOUT_SECS") {
            config.boarding_timeout = Duration::from_secs(value);
        }
        if let Some(value) = env_value("BUS_PATH_MATCH_TOLERANCE_KM") {
            config.path_match_tolerance_km = value;
        }
        if let Some(value) = env_value("BUS_ETA_SPEED_KMH") {
            config.eta_speed_km_per_hour = value;
        }
        if let Some(value) = env_value("BUS_CONTINUE_AFTER_ALIGHT") {
            config.continue_after_alight = value;
        }
        if let Some(value) = env_value("BUS_FINISH_DELAY_SECS") {
            config.finish_delay = Duration::from_secs(value);
        }
        config
    }

    /// Distance the bus covers in one tick.
    pub fn distance_per_tick_km(&self) -> f64 {
        self.speed_km_per_hour * (self.tick_interval.as_secs_f64() / 3600.0)
    }

    pub fn validate(&self) -> Result<(), SetupError> {
        let invalid = |reason: &str| Err(SetupError::InvalidConfig(reason.to_owned()));
        if !(self.speed_km_per_hour > 0.0) {
            return invalid("speed must be positive");
        }
        if self.tick_interval.is_zero() {
            return invalid("tick interval must be positive");
        }
        if !(self.arrival_tolerance_km >= 0.0) {
            return invalid("arrival tolerance must not be negative");
        }
        if !(self.path_match_tolerance_km >= 0.0) {
            return invalid("path match tolerance must not be negative");
        }
        if !(self.eta_speed_km_per_hour > 0.0) {
            return invalid("eta speed must be positive");
        }
        Ok(())
    }
}
