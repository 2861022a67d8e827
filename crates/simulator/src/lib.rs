pub mod config;
pub mod error;
pub mod path;
pub mod scheduler;
pub mod session;
pub mod trip;

pub use config::SimulatorConfig;
pub use error::{SetupError, TransitionError};
pub use scheduler::{ManualScheduler, Scheduler, TimerKind};
pub use session::Session;
pub use trip::{TripSetup, TripSimulator};
