//! Background movement of the whole fleet, so search results change over
//! time the way a live bus list would.

use std::{collections::HashMap, sync::Arc, time::Duration};

use model::{
    bus::{Bus, MAX_PASSENGERS},
    route::Route,
    WithId,
};
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationMilliSeconds};
use simulator::{config::env_value, path, SetupError};
use tokio::{
    sync::RwLock,
    time::{self, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;
use utility::id::Id;

#[serde_as]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FleetConfig {
    pub speed_km_per_hour: f64,
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub tick_interval: Duration,
    /// Chance per bus and tick that passengers get on or off.
    pub passenger_change_probability: f64,
}

impl Default for FleetConfig {
    fn default() -> Self {
        Self {
            speed_km_per_hour: 1000.0,
            tick_interval: Duration::from_secs(1),
            passenger_change_probability: 0.05,
        }
    }
}

impl FleetConfig {
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(value) = env_value("BUS_FLEET_SPEED_KMH") {
            config.speed_km_per_hour = value;
        }
        if let Some(value) = env_value("BUS_FLEET_TICK_MS") {
            config.tick_interval = Duration::from_millis(value);
        }
        if let Some(value) = env_value("BUS_FLEET_PASSENGER_CHANGE_PROBABILITY") {
            config.passenger_change_probability = value;
        }
        config
    }

    pub fn validate(&self) -> Result<(), SetupError> {
        let invalid = |reason: &str| Err(SetupError::InvalidConfig(reason.to_owned()));
        if !(self.speed_km_per_hour > 0.0) {
            return invalid("fleet speed must be positive");
        }
        if self.tick_interval.is_zero() {
            return invalid("fleet tick interval must be positive");
        }
        if !(0.0..=1.0).contains(&self.passenger_change_probability) {
            return invalid("passenger change probability must be between 0 and 1");
        }
        Ok(())
    }

    fn distance_per_tick_km(&self) -> f64 {
        self.speed_km_per_hour * (self.tick_interval.as_secs_f64() / 3600.0)
    }
}

pub struct FleetSimulator<G: Rng = StdRng> {
    routes: HashMap<Id<Route>, Route>,
    buses: Vec<WithId<Bus>>,
    config: FleetConfig,
    rng: G,
}

impl FleetSimulator<StdRng> {
    pub fn new(routes: Vec<WithId<Route>>, buses: Vec<WithId<Bus>>, config: FleetConfig) -> Self {
        Self::with_rng(routes, buses, config, StdRng::from_entropy())
    }
}

impl<G: Rng> FleetSimulator<G> {
    pub fn with_rng(
        routes: Vec<WithId<Route>>,
        buses: Vec<WithId<Bus>>,
        config: FleetConfig,
        rng: G,
    ) -> Self {
        let routes = routes
            .into_iter()
            .map(|route| (route.id, route.content))
            .collect();
        Self {
            routes,
            buses,
            config,
            rng,
        }
    }

    pub fn buses(&self) -> &[WithId<Bus>] {
        &self.buses
    }

    /// Moves every bus toward its next path vertex. A bus at the end of its
    /// route starts over at the first vertex.
    pub fn step(&mut self) {
        let budget = self.config.distance_per_tick_km();
        for bus in self.buses.iter_mut() {
            let Some(route) = self.routes.get(&bus.content.route_id) else {
                log::debug!("bus {} has no known route", bus.id);
                continue;
            };
            let bus = &mut bus.content;
            if bus.current_path_index >= route.last_index() {
                bus.position = route.path[0];
                bus.current_path_index = 0;
                continue;
            }
            let step = path::advance(
                &route.path,
                bus.position,
                bus.current_path_index,
                budget,
                bus.current_path_index + 1,
            );
            bus.position = step.position;
            bus.current_path_index = step.index;

            let probability = self.config.passenger_change_probability;
            if self.rng.gen::<f64>() < probability {
                let change: i64 = self.rng.gen_range(-3..=2);
                bus.passenger_count = (bus.passenger_count as i64 + change)
                    .clamp(0, MAX_PASSENGERS as i64) as u32;
            }
        }
    }
}

impl<G: Rng + Send + 'static> FleetSimulator<G> {
    /// Runs the simulation in a background task until `shutdown` is
    /// cancelled.
    pub fn run(mut self, shutdown: CancellationToken) -> FleetHandle {
        let buses = Arc::new(RwLock::new(self.buses.clone()));
        let handle = FleetHandle {
            buses: buses.clone(),
            shutdown: shutdown.clone(),
        };
        log::info!("simulating {} buses", self.buses.len());

        tokio::spawn(async move {
            let mut interval = time::interval(self.config.tick_interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // the first tick completes immediately
            interval.tick().await;
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = interval.tick() => {
                        self.step();
                        *buses.write().await = self.buses.clone();
                    }
                }
            }
            log::info!("fleet simulation stopped");
        });

        handle
    }
}

/// Read access to the live fleet.
#[derive(Debug, Clone)]
pub struct FleetHandle {
    buses: Arc<RwLock<Vec<WithId<Bus>>>>,
    shutdown: CancellationToken,
}

impl FleetHandle {
    pub async fn buses(&self) -> Vec<WithId<Bus>> {
        self.buses.read().await.clone()
    }

    pub async fn bus(&self, id: &Id<Bus>) -> Option<WithId<Bus>> {
        self.buses
            .read()
            .await
            .iter()
            .find(|bus| &bus.id == id)
            .cloned()
    }

    pub fn stop(&self) {
        self.shutdown.cancel();
    }
}

#[cfg(test)]
mod tests {
    use model::{location::Location, ExampleData};

    use super::*;

    fn new_fleet(config: FleetConfig, buses: Vec<WithId<Bus>>) -> FleetSimulator<StdRng> {
        let routes = vec![WithId::new("route2".into(), Route::example_data())];
        FleetSimulator::with_rng(routes, buses, config, StdRng::seed_from_u64(7))
    }

    fn bus_at(index: usize, passenger_count: u32) -> WithId<Bus> {
        let route = Route::example_data();
        let bus = Bus {
            position: route.path[index],
            current_path_index: index,
            passenger_count,
            ..Bus::example_data()
        };
        WithId::new("PB04D4321".into(), bus)
    }

    #[test]
    fn config_validation() {
        assert!(FleetConfig::default().validate().is_ok());
        let invalid = [
            FleetConfig {
                tick_interval: Duration::ZERO,
                ..Default::default()
            },
            FleetConfig {
                speed_km_per_hour: 0.0,
                ..Default::default()
            },
            FleetConfig {
                speed_km_per_hour: f64::NAN,
                ..Default::default()
            },
            FleetConfig {
                passenger_change_probability: 1.5,
                ..Default::default()
            },
        ];
        for config in invalid {
            assert!(matches!(
                config.validate(),
                Err(SetupError::InvalidConfig(_))
            ));
        }
    }

    #[test]
    fn moves_one_vertex_at_most() {
        let route = Route::example_data();
        let config = FleetConfig {
            passenger_change_probability: 0.0,
            ..Default::default()
        };
        let mut fleet = new_fleet(config, vec![bus_at(0, 18)]);
        fleet.step();
        let bus = &fleet.buses()[0].content;
        assert_eq!(bus.current_path_index, 0);
        let moved = route.path[0].distance_to(&bus.position);
        assert!((moved - 1000.0 / 3600.0).abs() < 1e-4);

        let config = FleetConfig {
            speed_km_per_hour: 1_000_000.0,
            passenger_change_probability: 0.0,
            ..Default::default()
        };
        let mut fleet = new_fleet(config, vec![bus_at(0, 18)]);
        fleet.step();
        assert_eq!(fleet.buses()[0].content.current_path_index, 1);
        assert_eq!(fleet.buses()[0].content.position, route.path[1]);
    }

    #[test]
    fn restarts_at_end_of_route() {
        let mut fleet = new_fleet(FleetConfig::default(), vec![bus_at(3, 18)]);
        fleet.step();
        let bus = &fleet.buses()[0].content;
        assert_eq!(bus.current_path_index, 0);
        assert_eq!(bus.position, Location::new(30.7419, 76.7762));
    }

    #[test]
    fn passenger_count_stays_in_bounds() {
        let config = FleetConfig {
            speed_km_per_hour: 1.0,
            passenger_change_probability: 1.0,
            ..Default::default()
        };
        let mut fleet = new_fleet(config, vec![bus_at(0, 0), bus_at(0, MAX_PASSENGERS)]);
        let mut changed = false;
        for _ in 0..200 {
            fleet.step();
            for bus in fleet.buses() {
                assert!(bus.content.passenger_count <= MAX_PASSENGERS);
            }
            changed |= fleet.buses()[0].content.passenger_count > 0;
        }
        assert!(changed);
    }

    #[tokio::test(start_paused = true)]
    async fn background_task_publishes_positions() {
        let shutdown = CancellationToken::new();
        let handle = new_fleet(FleetConfig::default(), vec![bus_at(0, 18)]).run(shutdown);
        let id = "PB04D4321".into();
        let start = handle.bus(&id).await.unwrap().content.position;

        time::sleep(Duration::from_millis(2500)).await;
        let bus = handle.bus(&id).await.unwrap().content;
        let moved = start.distance_to(&bus.position);
        assert!((moved - 2.0 * 1000.0 / 3600.0).abs() < 1e-3);

        handle.stop();
        time::sleep(Duration::from_secs(5)).await;
        let after_stop = handle.bus(&id).await.unwrap().content.position;
        assert_eq!(after_stop, bus.position);
    }
}
