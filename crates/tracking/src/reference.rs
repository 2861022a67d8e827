//! Static reference tables: stops, routes and the initial fleet.

use std::{fs, path::Path, sync::Arc};

use async_trait::async_trait;
use indexmap::IndexMap;
use model::{
    bus::{Bus, Comfort},
    location::Location,
    route::Route,
    stop::Stop,
    ExampleData, WithId,
};
use serde::{Deserialize, Serialize};
use utility::{edit_distance::closest_match, id::Id};

use crate::{RequestError, RequestResult};

/// Largest normalized edit distance for a stop name suggestion.
const SUGGESTION_MAX_RATIO: f64 = 0.4;

#[async_trait]
pub trait ReferenceData: Clone + Send + Sync + 'static {
    async fn stops(&self) -> RequestResult<Vec<WithId<Stop>>>;
    async fn routes(&self) -> RequestResult<Vec<WithId<Route>>>;
    async fn route(&self, id: &Id<Route>) -> RequestResult<WithId<Route>>;
    async fn buses(&self) -> RequestResult<Vec<WithId<Bus>>>;
    async fn bus(&self, id: &Id<Bus>) -> RequestResult<WithId<Bus>>;

    /// Looks a stop up by its exact name. Fails with the closest known name
    /// as a suggestion.
    async fn stop_by_name(&self, name: &str) -> RequestResult<WithId<Stop>> {
        let stops = self.stops().await?;
        if let Some(stop) = stops.iter().find(|stop| stop.content.name == name) {
            return Ok(stop.clone());
        }
        let suggestion = closest_match(
            name,
            stops.iter().map(|stop| stop.content.name.as_str()),
            SUGGESTION_MAX_RATIO,
        )
        .map(str::to_owned);
        Err(RequestError::UnknownStop {
            name: name.to_owned(),
            suggestion,
        })
    }
}

/// The tables as stored in a dataset file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dataset {
    pub stops: IndexMap<Id<Stop>, Stop>,
    pub routes: IndexMap<Id<Route>, Route>,
    pub buses: IndexMap<Id<Bus>, Bus>,
}

/// In-memory reference data. Cloning is cheap, the tables are shared.
#[derive(Debug, Clone)]
pub struct StaticReferenceData {
    data: Arc<Dataset>,
}

impl StaticReferenceData {
    pub fn new(data: Dataset) -> Self {
        Self {
            data: Arc::new(data),
        }
    }

    pub fn from_json(json: &str) -> RequestResult<Self> {
        let data: Dataset = serde_json::from_str(json).map_err(RequestError::other)?;
        log::info!(
            "loaded dataset with {} stops, {} routes and {} buses",
            data.stops.len(),
            data.routes.len(),
            data.buses.len()
        );
        Ok(Self::new(data))
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> RequestResult<Self> {
        let json = fs::read_to_string(path).map_err(RequestError::other)?;
        Self::from_json(&json)
    }

    pub fn dataset(&self) -> &Dataset {
        &self.data
    }
}

fn with_ids<T>(table: &IndexMap<Id<T>, T>) -> Vec<WithId<T>>
where
    T: utility::id::HasId<IdType = String> + Clone,
{
    table
        .iter()
        .map(|(id, value)| WithId::new(id.clone(), value.clone()))
        .collect()
}

#[async_trait]
impl ReferenceData for StaticReferenceData {
    async fn stops(&self) -> RequestResult<Vec<WithId<Stop>>> {
        Ok(with_ids(&self.data.stops))
    }

    async fn routes(&self) -> RequestResult<Vec<WithId<Route>>> {
        Ok(with_ids(&self.data.routes))
    }

    async fn route(&self, id: &Id<Route>) -> RequestResult<WithId<Route>> {
        self.data
            .routes
            .get(id)
            .map(|route| WithId::new(id.clone(), route.clone()))
            .ok_or(RequestError::NotFound)
    }

    async fn buses(&self) -> RequestResult<Vec<WithId<Bus>>> {
        Ok(with_ids(&self.data.buses))
    }

    async fn bus(&self, id: &Id<Bus>) -> RequestResult<WithId<Bus>> {
        self.data
            .buses
            .get(id)
            .map(|bus| WithId::new(id.clone(), bus.clone()))
            .ok_or(RequestError::NotFound)
    }
}

fn bus(
    route: &str,
    position: (f64, f64),
    current_path_index: usize,
    destination: &str,
    comfort: Comfort,
    passenger_count: u32,
    ticket_price: u32,
) -> Bus {
    Bus {
        route_id: route.into(),
        position: position.into(),
        current_path_index,
        destination: destination.to_owned(),
        comfort,
        passenger_count,
        ticket_price,
    }
}

impl ExampleData for Dataset {
    /// The Punjab demo network.
    fn example_data() -> Self {
        let stops: IndexMap<Id<Stop>, Stop> = [
            ("stop1", "ISBT Sector 17, Chandigarh", 30.7419, 76.7762),
            ("stop2", "Kharar Bus Stand", 30.7454, 76.6493),
            ("stop3", "Ropar Bus Stand", 30.9660, 76.5250),
            ("stop4", "Jalandhar Bus Stand", 31.3260, 75.5762),
            ("stop5", "Amritsar Bus Stand", 31.6340, 74.8723),
            ("stop6", "Ludhiana Bus Stand", 30.9112, 75.8516),
            ("stop7", "Phagwara Bus Stand", 31.2183, 75.7731),
        ]
        .into_iter()
        .map(|(id, name, latitude, longitude)| {
            (id.into(), Stop::new(name, Location::new(latitude, longitude)))
        })
        .collect();

        let route1 = Route {
            name: "Chandigarh to Amritsar".to_owned(),
            stops: ["stop1", "stop2", "stop3", "stop7", "stop4", "stop5"]
                .into_iter()
                .map(Id::from)
                .collect(),
            path: [
                (30.7419, 76.7762), // Chandigarh
                (30.7454, 76.6493), // Kharar
                (30.85, 76.60),
                (30.9660, 76.5250), // Ropar
                (31.05, 76.30),
                (31.15, 75.90),
                (31.2183, 75.7731), // Phagwara
                (31.3260, 75.5762), // Jalandhar
                (31.45, 75.20),
                (31.6340, 74.8723), // Amritsar
            ]
            .into_iter()
            .map(Location::from)
            .collect(),
        };
        let route2 = Route::example_data();
        let routes: IndexMap<Id<Route>, Route> =
            [("route1".into(), route1), ("route2".into(), route2)]
                .into_iter()
                .collect();

        use Comfort::{AirConditioned as Ac, NonAirConditioned as NonAc};
        let buses: IndexMap<Id<Bus>, Bus> = [
            ("PB01A1234", bus("route1", (30.7419, 76.7762), 0, "Amritsar", Ac, 25, 350)),
            ("PB01A5678", bus("route1", (30.7419, 76.7762), 0, "Amritsar", NonAc, 35, 280)),
            ("PB02B5678", bus("route1", (30.9660, 76.5250), 3, "Amritsar", NonAc, 40, 280)),
            ("PB02B9101", bus("route1", (30.85, 76.60), 2, "Amritsar", Ac, 18, 350)),
            ("PB03C9101", bus("route1", (31.3260, 75.5762), 7, "Chandigarh", Ac, 15, 350)),
            ("PB04D4321", bus("route2", (30.7419, 76.7762), 0, "Ludhiana", Ac, 18, 150)),
            ("PB04D8765", bus("route2", (30.7454, 76.6493), 1, "Ludhiana", NonAc, 45, 120)),
        ]
        .into_iter()
        .map(|(id, bus)| (id.into(), bus))
        .collect();

        Dataset {
            stops,
            routes,
            buses,
        }
    }
}

impl ExampleData for StaticReferenceData {
    fn example_data() -> Self {
        Self::new(Dataset::example_data())
    }
}
