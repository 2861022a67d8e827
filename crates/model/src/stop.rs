use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use utility::id::HasId;

use crate::{location::Location, ExampleData};

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Stop {
    pub name: String,
    pub location: Location,
}

impl Stop {
    pub fn new<S: Into<String>>(name: S, location: Location) -> Self {
        Self {
            name: name.into(),
            location,
        }
    }
}

impl HasId for Stop {
    type IdType = String;
}

impl ExampleData for Stop {
    fn example_data() -> Self {
        Stop::new("ISBT Sector 17, Chandigarh", Location::example_data())
    }
}
