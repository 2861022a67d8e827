use std::collections::HashMap;

use itertools::Itertools;
use model::{
    bus::{Bus, CrowdLevel},
    route::Route,
    stop::Stop,
    WithDistance, WithId,
};
use schemars::JsonSchema;
use serde::Serialize;
use simulator::path::nearest_vertex;
use utility::id::Id;

/// A bus closer than this to a stop counts as being at that stop.
pub const STOP_PROXIMITY_KM: f64 = 1.0;

#[derive(Debug, Clone, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AvailableBus {
    #[serde(flatten)]
    pub bus: WithId<Bus>,
    pub route_name: String,
    pub crowd: CrowdLevel,
}

/// Buses that can still pick a rider up at `start` and bring them to
/// `destination`, closest first. The distance is the straight line from the
/// bus to the start stop.
///
/// A bus qualifies if its route serves `start` before `destination` and the
/// bus has not yet passed `start`. Passing is judged by the stop the bus is
/// currently at, or, between stops, by its path index. A bus on the segment
/// leaving `start` further than `arrival_tolerance_km` from it has passed.
pub fn available_buses(
    stops: &[WithId<Stop>],
    routes: &[WithId<Route>],
    buses: &[WithId<Bus>],
    start: &Id<Stop>,
    destination: &Id<Stop>,
    arrival_tolerance_km: f64,
) -> Vec<WithDistance<AvailableBus>> {
    let stops: HashMap<&Id<Stop>, &Stop> = stops
        .iter()
        .map(|stop| (&stop.id, &stop.content))
        .collect();
    let Some(start_stop) = stops.get(start) else {
        return Vec::new();
    };
    let routes: HashMap<&Id<Route>, &Route> = routes
        .iter()
        .filter(|route| route.content.serves_in_order(start, destination))
        .map(|route| (&route.id, &route.content))
        .collect();

    buses
        .iter()
        .filter_map(|bus| {
            let route = routes.get(&bus.content.route_id)?;
            let passed = has_passed(
                route,
                &stops,
                &bus.content,
                start,
                start_stop,
                arrival_tolerance_km,
            );
            if passed {
                return None;
            }
            let available = AvailableBus {
                bus: bus.clone(),
                route_name: route.name.clone(),
                crowd: bus.content.crowd(),
            };
            Some(WithDistance::new(
                bus.content.position.distance_to(&start_stop.location),
                available,
            ))
        })
        .sorted_by(|a, b| a.distance_km.total_cmp(&b.distance_km))
        .collect()
}

fn has_passed(
    route: &Route,
    stops: &HashMap<&Id<Stop>, &Stop>,
    bus: &Bus,
    start: &Id<Stop>,
    start_stop: &Stop,
    arrival_tolerance_km: f64,
) -> bool {
    let Some(start_position) = route.stop_position(start) else {
        return true;
    };
    let Some((start_vertex, _)) = nearest_vertex(&route.path, &start_stop.location) else {
        return true;
    };
    if bus.current_path_index == start_vertex
        && bus.position.distance_to(&route.path[start_vertex]) > arrival_tolerance_km
    {
        return true;
    }
    let current_stop = route.stops.iter().position(|id| {
        stops
            .get(id)
            .map(|stop| stop.location.distance_to(&bus.position) < STOP_PROXIMITY_KM)
            .unwrap_or(false)
    });
    match current_stop {
        Some(current) => current > start_position,
        None => bus.current_path_index > start_vertex,
    }
}
