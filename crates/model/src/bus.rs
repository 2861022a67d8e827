use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use utility::id::{HasId, Id};

use crate::{location::Location, route::Route, ExampleData};

pub const MAX_PASSENGERS: u32 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum Comfort {
    AirConditioned,
    NonAirConditioned,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum CrowdLevel {
    Low,
    Medium,
    High,
}

impl CrowdLevel {
    pub fn from_passenger_count(count: u32) -> Self {
        match count {
            0..=19 => CrowdLevel::Low,
            20..=44 => CrowdLevel::Medium,
            _ => CrowdLevel::High,
        }
    }
}

/// A simulated vehicle. `position` lies on the path segment starting at
/// `current_path_index` of its route, or on the last path point.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Bus {
    pub route_id: Id<Route>,
    pub position: Location,
    pub current_path_index: usize,
    /// Display name of the final destination.
    pub destination: String,
    pub comfort: Comfort,
    pub passenger_count: u32,
    pub ticket_price: u32,
}

impl Bus {
    pub fn crowd(&self) -> CrowdLevel {
        CrowdLevel::from_passenger_count(self.passenger_count)
    }
}

impl HasId for Bus {
    type IdType = String;
}

impl ExampleData for Bus {
    fn example_data() -> Self {
        Bus {
            route_id: "route2".into(),
            position: Location::new(30.7419, 76.7762),
            current_path_index: 0,
            destination: "Ludhiana".to_owned(),
            comfort: Comfort::AirConditioned,
            passenger_count: 18,
            ticket_price: 150,
        }
    }
}
