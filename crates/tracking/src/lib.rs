use std::{error::Error, fmt};

use simulator::{SetupError, TransitionError};
use tokio::sync::{mpsc, oneshot};

pub mod fleet;
pub mod reference;
pub mod scheduler;
pub mod search;
pub mod session;
pub mod tracker;

pub use session::Request;

#[derive(Debug)]
pub enum RequestError {
    NotFound,
    /// No stop with this name. Carries the closest known name, if any.
    UnknownStop {
        name: String,
        suggestion: Option<String>,
    },
    SameStartAndDestination,
    Setup(SetupError),
    Transition(TransitionError),
    SendError(mpsc::error::SendError<Request>),
    ResponseError(oneshot::error::RecvError),
    Other(Box<dyn Error + Send + Sync>),
}

impl RequestError {
    pub fn other<T: Error + Send + Sync + 'static>(why: T) -> Self {
        Self::Other(Box::new(why))
    }
}

impl fmt::Display for RequestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "not found"),
            Self::UnknownStop {
                name,
                suggestion: Some(suggestion),
            } => write!(f, "unknown stop {:?}, did you mean {:?}?", name, suggestion),
            Self::UnknownStop { name, .. } => write!(f, "unknown stop {:?}", name),
            Self::SameStartAndDestination => {
                write!(f, "start and destination cannot be the same")
            }
            Self::Setup(why) => write!(f, "can not start tracking: {}", why),
            Self::Transition(why) => write!(f, "{}", why),
            Self::SendError(_) => write!(f, "tracking session has ended"),
            Self::ResponseError(why) => write!(f, "no response from session: {}", why),
            Self::Other(why) => write!(f, "{}", why),
        }
    }
}

impl Error for RequestError {}

impl From<SetupError> for RequestError {
    fn from(why: SetupError) -> Self {
        Self::Setup(why)
    }
}

impl From<TransitionError> for RequestError {
    fn from(why: TransitionError) -> Self {
        Self::Transition(why)
    }
}

impl From<mpsc::error::SendError<Request>> for RequestError {
    fn from(why: mpsc::error::SendError<Request>) -> Self {
        Self::SendError(why)
    }
}

impl From<oneshot::error::RecvError> for RequestError {
    fn from(why: oneshot::error::RecvError) -> Self {
        Self::ResponseError(why)
    }
}

pub type RequestResult<O> = Result<O, RequestError>;
