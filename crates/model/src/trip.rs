use std::fmt;

use chrono::{DateTime, Local};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use utility::id::Id;

use crate::{bus::Bus, location::Location};

/// Phase of a rider's trip. Phases only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum TripState {
    EnRouteToRider,
    AwaitingBoardingConfirmation,
    Onboard,
    AwaitingAlightConfirmation,
    Finished,
    /// The rider did not confirm boarding in time.
    Missed,
    Cancelled,
}

impl TripState {
    /// True for phases where the rider is done with the trip.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TripState::Finished | TripState::Missed | TripState::Cancelled
        )
    }

    /// Status line as shown on the bus details card.
    pub fn status_text(&self) -> &'static str {
        match self {
            TripState::EnRouteToRider => "Bus is en-route to your location",
            TripState::AwaitingBoardingConfirmation => {
                "The bus has arrived. Please board now."
            }
            TripState::Onboard => "You are onboard. Heading to destination.",
            TripState::AwaitingAlightConfirmation => {
                "You have arrived at your destination."
            }
            TripState::Finished => "Trip completed.",
            TripState::Missed => "You missed the bus. Please search again.",
            TripState::Cancelled => "Tracking cancelled.",
        }
    }
}

impl fmt::Display for TripState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum TripEvent {
    ArrivedAtRider,
    BoardingConfirmed,
    BoardingTimedOut,
    ArrivedAtDestination,
    AlightConfirmed,
    TripFinished,
    Cancelled,
}

/// What the tracking view renders after every update.
#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TripSnapshot {
    pub bus_id: Id<Bus>,
    pub position: Location,
    pub current_path_index: usize,
    pub state: TripState,
    /// Straight-line distance to the current target.
    pub distance_km: Option<f64>,
    pub eta_minutes: Option<u32>,
    /// Current position followed by the remaining path vertices up to the
    /// target. Empty while no target is tracked.
    pub remaining_path: Vec<Location>,
    pub updated_at: DateTime<Local>,
}
