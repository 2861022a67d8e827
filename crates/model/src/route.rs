use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use utility::id::{HasId, Id};

use crate::{location::Location, stop::Stop, ExampleData};

/// A bus route. `path` approximates the road geometry, `stops` lists the
/// served stops in the order they appear along `path`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Route {
    pub name: String,
    pub stops: Vec<Id<Stop>>,
    pub path: Vec<Location>,
}

impl Route {
    /// Position of a stop in the stop sequence.
    pub fn stop_position(&self, stop: &Id<Stop>) -> Option<usize> {
        self.stops.iter().position(|id| id == stop)
    }

    /// True if the route serves `from` before `to`.
    pub fn serves_in_order(&self, from: &Id<Stop>, to: &Id<Stop>) -> bool {
        match (self.stop_position(from), self.stop_position(to)) {
            (Some(from), Some(to)) => from < to,
            _ => false,
        }
    }

    pub fn last_index(&self) -> usize {
        self.path.len().saturating_sub(1)
    }
}

impl HasId for Route {
    type IdType = String;
}

impl ExampleData for Route {
    fn example_data() -> Self {
        Route {
            name: "Chandigarh to Ludhiana".to_owned(),
            stops: vec!["stop1".into(), "stop2".into(), "stop6".into()],
            path: vec![
                Location::new(30.7419, 76.7762),
                Location::new(30.7454, 76.6493),
                Location::new(30.80, 76.45),
                Location::new(30.9112, 75.8516),
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stop_order() {
        let route = Route::example_data();
        assert!(route.serves_in_order(&"stop1".into(), &"stop6".into()));
        assert!(!route.serves_in_order(&"stop6".into(), &"stop1".into()));
        assert!(!route.serves_in_order(&"stop1".into(), &"stop4".into()));
        assert_eq!(route.last_index(), 3);
    }
}
