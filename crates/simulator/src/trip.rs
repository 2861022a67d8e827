//! The trip state machine: moves one bus along its route toward the rider's
//! current target and walks the rider through boarding and alighting.

use chrono::Local;
use model::{
    bus::Bus,
    location::Location,
    trip::{TripEvent, TripSnapshot, TripState},
};
use utility::{geo::eta_minutes, id::Id};

use crate::{
    config::SimulatorConfig,
    error::{SetupError, TransitionError},
    path,
};

/// Everything needed to start simulating one trip.
#[derive(Debug, Clone)]
pub struct TripSetup {
    pub bus_id: Id<Bus>,
    pub path: Vec<Location>,
    pub origin: Location,
    pub destination: Location,
    pub initial_position: Option<Location>,
    pub initial_path_index: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct TripSimulator {
    config: SimulatorConfig,
    bus_id: Id<Bus>,
    path: Vec<Location>,
    origin_index: usize,
    destination_index: usize,
    position: Location,
    path_index: usize,
    state: TripState,
    advancing: bool,
}

fn check_location(location: &Location) -> Result<(), SetupError> {
    if location.is_valid() {
        Ok(())
    } else {
        Err(SetupError::InvalidLocation {
            latitude: location.latitude,
            longitude: location.longitude,
        })
    }
}

impl TripSimulator {
    pub fn new(setup: TripSetup, config: SimulatorConfig) -> Result<Self, SetupError> {
        config.validate()?;
        let TripSetup {
            bus_id,
            path,
            origin,
            destination,
            initial_position,
            initial_path_index,
        } = setup;

        if path.len() < 2 {
            return Err(SetupError::MalformedRoute { points: path.len() });
        }
        for location in path.iter().chain([&origin, &destination]) {
            check_location(location)?;
        }

        let tolerance = config.path_match_tolerance_km;
        let origin_index = path::match_vertex(&path, &origin, tolerance).map_err(
            |nearest_km| SetupError::StopNotOnPath {
                which: "origin",
                nearest_km,
            },
        )?;
        let destination_index = path::match_vertex(&path, &destination, tolerance)
            .map_err(|nearest_km| SetupError::StopNotOnPath {
                which: "destination",
                nearest_km,
            })?;
        if destination_index <= origin_index {
            return Err(SetupError::DestinationBeforeOrigin {
                origin: origin_index,
                destination: destination_index,
            });
        }

        let (position, path_index) = seed(&path, initial_position, initial_path_index)?;
        // at the origin index the bus is on the segment leaving the origin,
        // so anything beyond arrival range has already passed it
        let left_origin = path_index == origin_index
            && position.distance_to(&path[origin_index]) > config.arrival_tolerance_km;
        if path_index > origin_index || left_origin {
            return Err(SetupError::VehiclePastOrigin {
                vehicle: path_index,
                origin: origin_index,
            });
        }

        log::debug!(
            "trip for bus {} set up: origin vertex {}, destination vertex {}, bus at vertex {}",
            bus_id,
            origin_index,
            destination_index,
            path_index
        );

        Ok(Self {
            config,
            bus_id,
            // the rider targets are the matched vertices, not the raw stop
            // positions, so arrival snaps exactly onto the path
            origin_index,
            destination_index,
            path,
            position,
            path_index,
            state: TripState::EnRouteToRider,
            advancing: true,
        })
    }

    pub fn config(&self) -> &SimulatorConfig {
        &self.config
    }

    pub fn bus_id(&self) -> &Id<Bus> {
        &self.bus_id
    }

    pub fn state(&self) -> TripState {
        self.state
    }

    pub fn position(&self) -> Location {
        self.position
    }

    pub fn path_index(&self) -> usize {
        self.path_index
    }

    pub fn path(&self) -> &[Location] {
        &self.path
    }

    pub fn origin_index(&self) -> usize {
        self.origin_index
    }

    pub fn destination_index(&self) -> usize {
        self.destination_index
    }

    /// False while a prompt is outstanding, after the trip ended, or once
    /// the bus reached the end of its path.
    pub fn is_advancing(&self) -> bool {
        self.advancing
    }

    /// Vertex index the bus currently moves toward.
    fn target_index(&self) -> Option<usize> {
        match self.state {
            TripState::EnRouteToRider => Some(self.origin_index),
            TripState::Onboard => Some(self.destination_index),
            TripState::Finished if self.config.continue_after_alight => {
                Some(self.path.len() - 1)
            }
            _ => None,
        }
    }

    /// The point the rider is interested in: their stop while waiting or
    /// onboard. After alighting this stays the destination, even if the bus
    /// continues.
    pub fn rider_target(&self) -> Option<Location> {
        match self.state {
            TripState::EnRouteToRider | TripState::AwaitingBoardingConfirmation => {
                Some(self.path[self.origin_index])
            }
            TripState::Onboard | TripState::AwaitingAlightConfirmation => {
                Some(self.path[self.destination_index])
            }
            _ => None,
        }
    }

    /// Advances the simulation by one tick. Returns the arrival event if the
    /// bus reached the rider's target during this tick.
    pub fn tick(&mut self) -> Option<TripEvent> {
        if !self.advancing {
            return None;
        }
        let Some(target_index) = self.target_index() else {
            self.advancing = false;
            return None;
        };

        if let Some(event) = self.check_arrival(target_index) {
            return Some(event);
        }

        let step = path::advance(
            &self.path,
            self.position,
            self.path_index,
            self.config.distance_per_tick_km(),
            target_index,
        );
        self.position = step.position;
        self.path_index = step.index;
        log::trace!(
            "bus {} moved {:.3} km to ({:.5}, {:.5}), path index {}",
            self.bus_id,
            step.travelled_km,
            self.position.latitude,
            self.position.longitude,
            self.path_index
        );

        if let Some(event) = self.check_arrival(target_index) {
            return Some(event);
        }

        if self.path_index >= self.path.len() - 1 {
            // only reachable while the bus continues after the trip ended,
            // or with a target at the very end that was not detected
            log::debug!("bus {} reached the end of its path", self.bus_id);
            self.advancing = false;
        }
        None
    }

    fn check_arrival(&mut self, target_index: usize) -> Option<TripEvent> {
        let target = self.path[target_index];
        if self.position.distance_to(&target) > self.config.arrival_tolerance_km {
            return None;
        }
        self.position = target;
        self.path_index = target_index;
        self.advancing = false;

        match self.state {
            TripState::EnRouteToRider => {
                log::info!("bus {} arrived at the rider", self.bus_id);
                self.state = TripState::AwaitingBoardingConfirmation;
                Some(TripEvent::ArrivedAtRider)
            }
            TripState::Onboard => {
                log::info!("bus {} arrived at the destination", self.bus_id);
                self.state = TripState::AwaitingAlightConfirmation;
                Some(TripEvent::ArrivedAtDestination)
            }
            _ => {
                log::debug!("bus {} finished its route", self.bus_id);
                None
            }
        }
    }

    pub fn confirm_boarding(&mut self) -> Result<TripEvent, TransitionError> {
        self.expect_state("confirm boarding", TripState::AwaitingBoardingConfirmation)?;
        log::info!("rider boarded bus {}", self.bus_id);
        self.state = TripState::Onboard;
        self.advancing = true;
        Ok(TripEvent::BoardingConfirmed)
    }

    /// The boarding window elapsed without confirmation.
    pub fn expire_boarding(&mut self) -> Result<TripEvent, TransitionError> {
        self.expect_state("expire boarding", TripState::AwaitingBoardingConfirmation)?;
        log::info!("rider missed bus {}", self.bus_id);
        self.state = TripState::Missed;
        self.advancing = false;
        Ok(TripEvent::BoardingTimedOut)
    }

    pub fn confirm_alight(&mut self) -> Result<TripEvent, TransitionError> {
        self.expect_state("confirm alighting", TripState::AwaitingAlightConfirmation)?;
        log::info!("rider left bus {}", self.bus_id);
        self.state = TripState::Finished;
        self.advancing = self.config.continue_after_alight
            && self.path_index < self.path.len() - 1;
        Ok(TripEvent::AlightConfirmed)
    }

    pub fn cancel(&mut self) -> Result<TripEvent, TransitionError> {
        if self.state.is_terminal() {
            return Err(TransitionError::InvalidState {
                action: "cancel",
                state: self.state,
            });
        }
        log::info!("tracking of bus {} cancelled in {}", self.bus_id, self.state);
        self.state = TripState::Cancelled;
        self.advancing = false;
        Ok(TripEvent::Cancelled)
    }

    /// Stops any further movement, e.g. once the session is torn down.
    pub fn halt(&mut self) {
        self.advancing = false;
    }

    fn expect_state(
        &self,
        action: &'static str,
        expected: TripState,
    ) -> Result<(), TransitionError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(TransitionError::InvalidState {
                action,
                state: self.state,
            })
        }
    }

    pub fn distance_km(&self) -> Option<f64> {
        self.rider_target()
            .map(|target| self.position.distance_to(&target))
    }

    pub fn eta_minutes(&self) -> Option<u32> {
        self.distance_km()
            .map(|distance| eta_minutes(distance, self.config.eta_speed_km_per_hour))
    }

    /// Current position followed by the path vertices still ahead on the
    /// way to the rider's target.
    pub fn remaining_path(&self) -> Vec<Location> {
        let target_index = match self.state {
            TripState::EnRouteToRider => self.origin_index,
            TripState::Onboard => self.destination_index,
            _ => return Vec::new(),
        };
        std::iter::once(self.position)
            .chain(
                self.path
                    .iter()
                    .take(target_index + 1)
                    .skip(self.path_index + 1)
                    .copied(),
            )
            .collect()
    }

    pub fn snapshot(&self) -> TripSnapshot {
        TripSnapshot {
            bus_id: self.bus_id.clone(),
            position: self.position,
            current_path_index: self.path_index,
            state: self.state,
            distance_km: self.distance_km(),
            eta_minutes: self.eta_minutes(),
            remaining_path: self.remaining_path(),
            updated_at: Local::now(),
        }
    }
}

/// Resolves the starting position of the bus. A position without index, or
/// one that does not lie on the segment of its index, is snapped to the
/// nearest path vertex.
fn seed(
    path: &[Location],
    position: Option<Location>,
    index: Option<usize>,
) -> Result<(Location, usize), SetupError> {
    if let Some(index) = index {
        if index >= path.len() {
            return Err(SetupError::InvalidPathIndex {
                index,
                len: path.len(),
            });
        }
    }
    let position = match position {
        Some(position) => {
            check_location(&position)?;
            position
        }
        None => {
            let index = index.unwrap_or(0);
            return Ok((path[index], index));
        }
    };

    if let Some(index) = index {
        if path::is_on_segment(path, index, &position) {
            return Ok((position, index));
        }
        log::warn!(
            "seed ({}, {}) is not on path segment {}, snapping to nearest vertex",
            position.latitude,
            position.longitude,
            index
        );
    }
    // without an index the position is trusted no further than its nearest
    // vertex; path has at least two points here
    let (nearest, _) = path::nearest_vertex(path, &position).unwrap_or((0, 0.0));
    Ok((path[nearest], nearest))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line() -> Vec<Location> {
        vec![
            Location::new(0.0, 0.0),
            Location::new(0.0, 1.0),
            Location::new(0.0, 2.0),
        ]
    }

    /// Speed that covers half a degree of longitude on the equator per tick.
    fn half_degree_config() -> SimulatorConfig {
        let half_degree = Location::new(0.0, 0.0).distance_to(&Location::new(0.0, 0.5));
        SimulatorConfig {
            speed_km_per_hour: half_degree * 3600.0,
            arrival_tolerance_km: 0.05,
            ..Default::default()
        }
    }

    fn setup() -> TripSetup {
        TripSetup {
            bus_id: "bus".into(),
            path: line(),
            origin: Location::new(0.0, 1.0),
            destination: Location::new(0.0, 2.0),
            initial_position: None,
            initial_path_index: None,
        }
    }

    fn simulator() -> TripSimulator {
        TripSimulator::new(setup(), half_degree_config()).unwrap()
    }

    #[test]
    fn arrives_at_rider_after_two_ticks() {
        let mut trip = simulator();
        assert_eq!(trip.tick(), None);
        assert!((trip.position().longitude - 0.5).abs() < 1e-9);
        assert_eq!(trip.path_index(), 0);

        assert_eq!(trip.tick(), Some(TripEvent::ArrivedAtRider));
        assert_eq!(trip.position(), Location::new(0.0, 1.0));
        assert_eq!(trip.path_index(), 1);
        assert_eq!(trip.state(), TripState::AwaitingBoardingConfirmation);
        assert!(!trip.is_advancing());
    }

    #[test]
    fn arrival_is_idempotent() {
        let mut trip = simulator();
        trip.tick();
        trip.tick();
        for _ in 0..5 {
            assert_eq!(trip.tick(), None);
            assert_eq!(trip.position(), Location::new(0.0, 1.0));
            assert_eq!(trip.path_index(), 1);
        }
    }

    #[test]
    fn boarding_heads_for_destination() {
        let mut trip = simulator();
        trip.tick();
        trip.tick();
        assert_eq!(trip.confirm_boarding(), Ok(TripEvent::BoardingConfirmed));
        assert_eq!(trip.state(), TripState::Onboard);
        assert_eq!(trip.rider_target(), Some(Location::new(0.0, 2.0)));

        assert_eq!(trip.tick(), None);
        assert!((trip.position().longitude - 1.5).abs() < 1e-9);
        assert_eq!(trip.tick(), Some(TripEvent::ArrivedAtDestination));
        assert_eq!(trip.state(), TripState::AwaitingAlightConfirmation);
        assert_eq!(trip.position(), Location::new(0.0, 2.0));
    }

    #[test]
    fn alighting_finishes_trip() {
        let mut trip = simulator();
        trip.tick();
        trip.tick();
        trip.confirm_boarding().unwrap();
        trip.tick();
        trip.tick();
        assert_eq!(trip.confirm_alight(), Ok(TripEvent::AlightConfirmed));
        assert_eq!(trip.state(), TripState::Finished);
        // destination is the end of this path, nothing left to drive
        assert!(!trip.is_advancing());
        assert_eq!(trip.distance_km(), None);
    }

    #[test]
    fn bus_continues_after_alighting() {
        let mut setup = setup();
        setup.path.push(Location::new(0.0, 3.0));
        let mut trip = TripSimulator::new(setup, half_degree_config()).unwrap();
        for _ in 0..2 {
            trip.tick();
        }
        trip.confirm_boarding().unwrap();
        for _ in 0..2 {
            trip.tick();
        }
        trip.confirm_alight().unwrap();
        assert!(trip.is_advancing());
        trip.tick();
        assert!((trip.position().longitude - 2.5).abs() < 1e-9);
        trip.tick();
        trip.tick();
        assert_eq!(trip.path_index(), 3);
        assert!(!trip.is_advancing());
        assert_eq!(trip.state(), TripState::Finished);
    }

    #[test]
    fn bus_stays_when_not_continuing() {
        let mut setup = setup();
        setup.path.push(Location::new(0.0, 3.0));
        let config = SimulatorConfig {
            continue_after_alight: false,
            ..half_degree_config()
        };
        let mut trip = TripSimulator::new(setup, config).unwrap();
        trip.tick();
        trip.tick();
        trip.confirm_boarding().unwrap();
        trip.tick();
        trip.tick();
        trip.confirm_alight().unwrap();
        assert!(!trip.is_advancing());
        assert_eq!(trip.tick(), None);
        assert_eq!(trip.position(), Location::new(0.0, 2.0));
    }

    #[test]
    fn expired_boarding_is_terminal() {
        let mut trip = simulator();
        trip.tick();
        trip.tick();
        assert_eq!(trip.expire_boarding(), Ok(TripEvent::BoardingTimedOut));
        assert_eq!(trip.state(), TripState::Missed);
        assert!(trip.expire_boarding().is_err());
        assert!(trip.confirm_boarding().is_err());
        assert_eq!(trip.tick(), None);
    }

    #[test]
    fn actions_in_wrong_state_are_rejected() {
        let mut trip = simulator();
        assert_eq!(
            trip.confirm_boarding(),
            Err(TransitionError::InvalidState {
                action: "confirm boarding",
                state: TripState::EnRouteToRider
            })
        );
        assert!(trip.confirm_alight().is_err());
        assert_eq!(trip.cancel(), Ok(TripEvent::Cancelled));
        assert!(trip.cancel().is_err());
        assert_eq!(trip.tick(), None);
    }

    #[test]
    fn off_path_seed_snaps_to_nearest_vertex() {
        let setup = TripSetup {
            initial_position: Some(Location::new(0.0, 0.7)),
            ..setup()
        };
        let trip = TripSimulator::new(setup, half_degree_config()).unwrap();
        assert_eq!(trip.path_index(), 1);
        assert_eq!(trip.position(), Location::new(0.0, 1.0));

        let setup = TripSetup {
            initial_position: Some(Location::new(0.3, 0.2)),
            initial_path_index: Some(0),
            ..self::setup()
        };
        let mut trip = TripSimulator::new(setup, half_degree_config()).unwrap();
        assert_eq!(trip.path_index(), 0);
        assert_eq!(trip.position(), Location::new(0.0, 0.0));
        trip.tick();
        assert!((trip.position().longitude - 0.5).abs() < 1e-9);
        assert_eq!(trip.position().latitude, 0.0);
    }

    #[test]
    fn consistent_seed_is_kept() {
        let setup = TripSetup {
            initial_position: Some(Location::new(0.0, 0.25)),
            initial_path_index: Some(0),
            ..setup()
        };
        let mut trip = TripSimulator::new(setup, half_degree_config()).unwrap();
        assert_eq!(trip.position(), Location::new(0.0, 0.25));
        trip.tick();
        assert!((trip.position().longitude - 0.75).abs() < 1e-9);
    }

    #[test]
    fn seed_just_past_origin_within_tolerance_arrives() {
        let setup = TripSetup {
            initial_position: Some(Location::new(0.0, 1.0003)),
            initial_path_index: Some(1),
            ..setup()
        };
        let mut trip = TripSimulator::new(setup, half_degree_config()).unwrap();
        assert_eq!(trip.tick(), Some(TripEvent::ArrivedAtRider));
        assert_eq!(trip.position(), Location::new(0.0, 1.0));
    }

    #[test]
    fn position_without_index_snaps_to_vertex() {
        // even a position on the first segment restarts from a vertex
        let setup = TripSetup {
            initial_position: Some(Location::new(0.0, 0.25)),
            ..setup()
        };
        let trip = TripSimulator::new(setup, half_degree_config()).unwrap();
        assert_eq!(trip.path_index(), 0);
        assert_eq!(trip.position(), Location::new(0.0, 0.0));
    }

    #[test]
    fn setup_errors() {
        let config = half_degree_config();

        let short = TripSetup {
            path: vec![Location::new(0.0, 0.0)],
            ..setup()
        };
        assert_eq!(
            TripSimulator::new(short, config.clone()).unwrap_err(),
            SetupError::MalformedRoute { points: 1 }
        );

        let off_path = TripSetup {
            origin: Location::new(1.0, 1.0),
            ..setup()
        };
        assert!(matches!(
            TripSimulator::new(off_path, config.clone()),
            Err(SetupError::StopNotOnPath { which: "origin", .. })
        ));

        let reversed = TripSetup {
            origin: Location::new(0.0, 2.0),
            destination: Location::new(0.0, 1.0),
            ..setup()
        };
        assert!(matches!(
            TripSimulator::new(reversed, config.clone()),
            Err(SetupError::DestinationBeforeOrigin { .. })
        ));

        let bad_index = TripSetup {
            initial_path_index: Some(3),
            ..setup()
        };
        assert_eq!(
            TripSimulator::new(bad_index, config.clone()).unwrap_err(),
            SetupError::InvalidPathIndex { index: 3, len: 3 }
        );

        let passed = TripSetup {
            initial_path_index: Some(2),
            ..setup()
        };
        assert!(matches!(
            TripSimulator::new(passed, config.clone()),
            Err(SetupError::VehiclePastOrigin { .. })
        ));

        let left_origin = TripSetup {
            initial_position: Some(Location::new(0.0, 1.5)),
            initial_path_index: Some(1),
            ..setup()
        };
        assert_eq!(
            TripSimulator::new(left_origin, config.clone()).unwrap_err(),
            SetupError::VehiclePastOrigin {
                vehicle: 1,
                origin: 1
            }
        );

        let invalid = TripSetup {
            destination: Location::new(0.0, 200.0),
            ..setup()
        };
        assert!(matches!(
            TripSimulator::new(invalid, config),
            Err(SetupError::InvalidLocation { .. })
        ));
    }

    #[test]
    fn eta_and_remaining_path() {
        let trip = simulator();
        let distance = trip.distance_km().unwrap();
        assert!((distance - 111.195).abs() < 0.01);
        // 111 km at 40 km/h
        assert_eq!(trip.eta_minutes(), Some(167));
        assert_eq!(
            trip.remaining_path(),
            vec![Location::new(0.0, 0.0), Location::new(0.0, 1.0)]
        );

        let snapshot = trip.snapshot();
        assert_eq!(snapshot.state, TripState::EnRouteToRider);
        assert_eq!(snapshot.current_path_index, 0);
    }
}
