use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use utility::geo;

use crate::ExampleData;

/// A coordinate in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
}

impl Location {
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    pub fn is_valid(&self) -> bool {
        (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }

    /// Haversine distance in kilometers.
    pub fn distance_to(&self, other: &Location) -> f64 {
        geo::haversine_distance(
            self.latitude,
            self.longitude,
            other.latitude,
            other.longitude,
        )
    }

    /// The point `fraction` of the way from `self` to `other`.
    pub fn interpolate(&self, other: &Location, fraction: f64) -> Location {
        let (latitude, longitude) = geo::interpolate(
            self.latitude,
            self.longitude,
            other.latitude,
            other.longitude,
            fraction,
        );
        Location {
            latitude,
            longitude,
        }
    }
}

impl From<(f64, f64)> for Location {
    fn from((latitude, longitude): (f64, f64)) -> Self {
        Self::new(latitude, longitude)
    }
}

impl ExampleData for Location {
    fn example_data() -> Self {
        // ISBT Sector 17, Chandigarh
        Location::new(30.7419, 76.7762)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validity_bounds() {
        assert!(Location::new(90.0, -180.0).is_valid());
        assert!(!Location::new(90.5, 0.0).is_valid());
        assert!(!Location::new(0.0, 181.0).is_valid());
        assert!(!Location::new(f64::NAN, 0.0).is_valid());
    }

    #[test]
    fn interpolate_halfway() {
        let a = Location::new(0.0, 0.0);
        let b = Location::new(0.0, 1.0);
        assert_eq!(a.interpolate(&b, 0.5), Location::new(0.0, 0.5));
        assert!((a.distance_to(&b) - b.distance_to(&a)).abs() < f64::EPSILON);
    }
}
