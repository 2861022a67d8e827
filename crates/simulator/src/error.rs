use std::{error::Error, fmt};

use model::trip::TripState;

/// Reasons a trip can not be set up. Reported before the simulation starts.
#[derive(Debug, Clone, PartialEq)]
pub enum SetupError {
    /// The route path has fewer than two points.
    MalformedRoute { points: usize },
    InvalidLocation { latitude: f64, longitude: f64 },
    /// A rider stop has no path vertex within the match tolerance.
    StopNotOnPath { which: &'static str, nearest_km: f64 },
    DestinationBeforeOrigin { origin: usize, destination: usize },
    InvalidPathIndex { index: usize, len: usize },
    /// The bus already passed the rider's stop.
    VehiclePastOrigin { vehicle: usize, origin: usize },
    InvalidConfig(String),
}

impl fmt::Display for SetupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MalformedRoute { points } => {
                write!(f, "route path needs at least 2 points, got {}", points)
            }
            Self::InvalidLocation {
                latitude,
                longitude,
            } => write!(f, "invalid location ({}, {})", latitude, longitude),
            Self::StopNotOnPath { which, nearest_km } => write!(
                f,
                "{} is not on the route path (nearest vertex {:.3} km away)",
                which, nearest_km
            ),
            Self::DestinationBeforeOrigin {
                origin,
                destination,
            } => write!(
                f,
                "destination (path index {}) is not after origin (path index {})",
                destination, origin
            ),
            Self::InvalidPathIndex { index, len } => {
                write!(f, "path index {} out of range for path of {}", index, len)
            }
            Self::VehiclePastOrigin { vehicle, origin } => write!(
                f,
                "bus at path index {} already passed the origin at {}",
                vehicle, origin
            ),
            Self::InvalidConfig(why) => write!(f, "invalid config: {}", why),
        }
    }
}

impl Error for SetupError {}

/// A rider action that does not fit the current trip phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionError {
    InvalidState {
        action: &'static str,
        state: TripState,
    },
}

impl fmt::Display for TransitionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidState { action, state } => {
                write!(f, "can not {} while trip is {}", action, state)
            }
        }
    }
}

impl Error for TransitionError {}
