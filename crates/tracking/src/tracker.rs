use model::{bus::Bus, location::Location, WithDistance, WithId};
use serde::{Deserialize, Serialize};
use simulator::{SimulatorConfig, TripSetup, TripSimulator};
use tokio_util::sync::CancellationToken;
use utility::id::Id;

use crate::{
    fleet::{FleetConfig, FleetHandle, FleetSimulator},
    reference::ReferenceData,
    search::{available_buses, AvailableBus},
    session::{self, TrackingHandle},
    RequestError, RequestResult,
};

/// What a rider picks on the bus list to start tracking.
#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingRequest {
    pub bus_id: Id<Bus>,
    pub origin_stop: String,
    pub destination_stop: String,
    /// Where the bus is, if the caller knows better than the reference data.
    pub initial_position: Option<Location>,
    pub initial_path_index: Option<usize>,
}

/// Entry point of the runtime layer: searches buses and starts tracking
/// sessions against one set of reference data.
pub struct Tracker<R: ReferenceData> {
    reference: R,
    config: SimulatorConfig,
    fleet: Option<FleetHandle>,
    shutdown: CancellationToken,
}

impl<R: ReferenceData> Tracker<R> {
    pub fn new(reference: R, config: SimulatorConfig) -> Self {
        Self {
            reference,
            config,
            fleet: None,
            shutdown: CancellationToken::new(),
        }
    }

    /// Starts moving the fleet in the background. Searches and new sessions
    /// then see live bus positions.
    pub async fn with_fleet(mut self, config: FleetConfig) -> RequestResult<Self> {
        config.validate()?;
        let routes = self.reference.routes().await?;
        let buses = self.reference.buses().await?;
        let fleet = FleetSimulator::new(routes, buses, config);
        self.fleet = Some(fleet.run(self.shutdown.child_token()));
        Ok(self)
    }

    pub fn reference(&self) -> &R {
        &self.reference
    }

    pub fn config(&self) -> &SimulatorConfig {
        &self.config
    }

    pub async fn buses(&self) -> RequestResult<Vec<WithId<Bus>>> {
        match &self.fleet {
            Some(fleet) => Ok(fleet.buses().await),
            None => self.reference.buses().await,
        }
    }

    async fn bus(&self, id: &Id<Bus>) -> RequestResult<WithId<Bus>> {
        if let Some(fleet) = &self.fleet {
            if let Some(bus) = fleet.bus(id).await {
                return Ok(bus);
            }
        }
        self.reference.bus(id).await
    }

    /// Buses going from the stop named `start` to the one named
    /// `destination`, closest first.
    pub async fn search(
        &self,
        start: &str,
        destination: &str,
    ) -> RequestResult<Vec<WithDistance<AvailableBus>>> {
        if start == destination {
            return Err(RequestError::SameStartAndDestination);
        }
        let start = self.reference.stop_by_name(start).await?;
        let destination = self.reference.stop_by_name(destination).await?;
        Ok(available_buses(
            &self.reference.stops().await?,
            &self.reference.routes().await?,
            &self.buses().await?,
            &start.id,
            &destination.id,
            self.config.arrival_tolerance_km,
        ))
    }

    /// Starts a tracking session. Fails synchronously if the trip can not be
    /// simulated; the session itself then runs until the trip ends.
    pub async fn track(&self, request: TrackingRequest) -> RequestResult<TrackingHandle> {
        if request.origin_stop == request.destination_stop {
            return Err(RequestError::SameStartAndDestination);
        }
        let bus = self.bus(&request.bus_id).await?;
        let route = self.reference.route(&bus.content.route_id).await?;
        let origin = self.reference.stop_by_name(&request.origin_stop).await?;
        let destination = self
            .reference
            .stop_by_name(&request.destination_stop)
            .await?;

        let (initial_position, initial_path_index) =
            match (request.initial_position, request.initial_path_index) {
                (None, None) => (
                    Some(bus.content.position),
                    Some(bus.content.current_path_index),
                ),
                given => given,
            };
        let setup = TripSetup {
            bus_id: bus.id,
            path: route.content.path,
            origin: origin.content.location,
            destination: destination.content.location,
            initial_position,
            initial_path_index,
        };
        let trip = TripSimulator::new(setup, self.config.clone())?;
        log::info!(
            "tracking bus {} on {} from {} to {}",
            trip.bus_id(),
            route.content.name,
            origin.content.name,
            destination.content.name
        );
        Ok(session::spawn(trip, self.shutdown.child_token()))
    }

    /// Ends every session and the fleet simulation.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }
}

impl<R: ReferenceData> Drop for Tracker<R> {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
