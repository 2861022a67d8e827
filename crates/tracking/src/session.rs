//! Runs a trip [`Session`] inside its own tokio task. The task owns all
//! session state; callers talk to it through a [`TrackingHandle`].

use std::{
    panic::AssertUnwindSafe,
    sync::{Arc, Weak},
};

use futures::{future, FutureExt, Stream, StreamExt};
use model::{
    bus::Bus,
    trip::{TripEvent, TripSnapshot},
};
use serde::Serialize;
use simulator::{Session, TripSimulator};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio_stream::wrappers::BroadcastStream;
use tokio_util::sync::CancellationToken;
use utility::id::Id;

use crate::{scheduler::TokioScheduler, RequestError, RequestResult};

const REQUEST_CAPACITY: usize = 32;
const UPDATE_CAPACITY: usize = 256;

#[derive(Debug)]
pub enum Request {
    ConfirmBoarding {
        responder: oneshot::Sender<RequestResult<TripEvent>>,
    },
    ConfirmAlight {
        responder: oneshot::Sender<RequestResult<TripEvent>>,
    },
    Cancel {
        responder: oneshot::Sender<RequestResult<TripEvent>>,
    },
    Snapshot {
        responder: oneshot::Sender<TripSnapshot>,
    },
}

/// Published after every simulation step and every transition.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionUpdate {
    pub snapshot: TripSnapshot,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event: Option<TripEvent>,
}

/// Spawns the session task and starts the trip. The session ends on a
/// terminal trip state, when `shutdown` is cancelled or when the last handle
/// is dropped.
pub fn spawn(trip: TripSimulator, shutdown: CancellationToken) -> TrackingHandle {
    let bus_id = trip.bus_id().clone();
    let (sender, receiver) = mpsc::channel(REQUEST_CAPACITY);
    let (updates, _) = broadcast::channel(UPDATE_CAPACITY);
    let updates = Arc::new(updates);
    let handle = TrackingHandle {
        bus_id: bus_id.clone(),
        sender,
        updates: Arc::downgrade(&updates),
    };

    tokio::spawn(async move {
        let result = AssertUnwindSafe(drive(trip, receiver, updates, shutdown))
            .catch_unwind()
            .await;
        if let Err(why) = result {
            log::error!("tracking session for {} paniced: {:?}", bus_id, why);
        }
    });

    handle
}

async fn drive(
    trip: TripSimulator,
    mut requests: mpsc::Receiver<Request>,
    updates: Arc<broadcast::Sender<SessionUpdate>>,
    shutdown: CancellationToken,
) {
    let (scheduler, mut timers) = TokioScheduler::new();
    let mut session = Session::new(trip, scheduler);
    let publish = |session: &Session<TokioScheduler>, event: Option<TripEvent>| {
        if let Some(event) = event {
            log::info!(
                "{}: {:?}, now {}",
                session.trip().bus_id(),
                event,
                session.state()
            );
        }
        // no subscribers is fine
        let _ = updates.send(SessionUpdate {
            snapshot: session.snapshot(),
            event,
        });
    };

    session.start();
    publish(&session, None);

    while !session.is_closed() {
        tokio::select! {
            _ = shutdown.cancelled() => {
                log::info!("{}: shutting down", session.trip().bus_id());
                session.stop();
                publish(&session, None);
            }
            Some(fired) = timers.recv() => {
                if !session.scheduler_mut().accept(&fired) {
                    log::trace!("dropping stale {:?} timer", fired.kind);
                    continue;
                }
                let event = session.on_timer(fired.kind);
                publish(&session, event);
            }
            request = requests.recv() => match request {
                Some(request) => handle_request(&mut session, request, &publish),
                None => {
                    log::info!("{}: all handles dropped", session.trip().bus_id());
                    let event = session.cancel().ok();
                    session.stop();
                    publish(&session, event);
                }
            }
        }
    }
    log::debug!("{}: session closed", session.trip().bus_id());
}

fn handle_request<F>(session: &mut Session<TokioScheduler>, request: Request, publish: &F)
where
    F: Fn(&Session<TokioScheduler>, Option<TripEvent>),
{
    let (result, responder) = match request {
        Request::Snapshot { responder } => {
            let _ = responder.send(session.snapshot());
            return;
        }
        Request::ConfirmBoarding { responder } => (session.confirm_boarding(), responder),
        Request::ConfirmAlight { responder } => (session.confirm_alight(), responder),
        Request::Cancel { responder } => (session.cancel(), responder),
    };
    if let Ok(event) = result {
        publish(session, Some(event));
    }
    let _ = responder.send(result.map_err(RequestError::from));
}

/// Client side of a running tracking session.
#[derive(Debug, Clone)]
pub struct TrackingHandle {
    bus_id: Id<Bus>,
    sender: mpsc::Sender<Request>,
    updates: Weak<broadcast::Sender<SessionUpdate>>,
}

impl TrackingHandle {
    pub fn bus_id(&self) -> &Id<Bus> {
        &self.bus_id
    }

    /// True once the session task has ended.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    pub async fn confirm_boarding(&self) -> RequestResult<TripEvent> {
        let (responder, response) = oneshot::channel();
        self.sender
            .send(Request::ConfirmBoarding { responder })
            .await?;
        response.await?
    }

    pub async fn confirm_alight(&self) -> RequestResult<TripEvent> {
        let (responder, response) = oneshot::channel();
        self.sender.send(Request::ConfirmAlight { responder }).await?;
        response.await?
    }

    pub async fn cancel(&self) -> RequestResult<TripEvent> {
        let (responder, response) = oneshot::channel();
        self.sender.send(Request::Cancel { responder }).await?;
        response.await?
    }

    pub async fn snapshot(&self) -> RequestResult<TripSnapshot> {
        let (responder, response) = oneshot::channel();
        self.sender.send(Request::Snapshot { responder }).await?;
        Ok(response.await?)
    }

    /// Updates published from now on. The stream ends with the session.
    pub fn updates(&self) -> impl Stream<Item = SessionUpdate> {
        let receiver = match self.updates.upgrade() {
            Some(updates) => updates.subscribe(),
            None => broadcast::channel(1).1,
        };
        BroadcastStream::new(receiver).filter_map(|update| {
            future::ready(match update {
                Ok(update) => Some(update),
                Err(why) => {
                    log::warn!("tracking update stream: {}", why);
                    None
                }
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use model::{location::Location, trip::TripState};
    use simulator::{SimulatorConfig, TripSetup};
    use tokio::time;

    use super::*;

    fn trip(boarding_timeout: Duration) -> TripSimulator {
        let half_degree = Location::new(0.0, 0.0).distance_to(&Location::new(0.0, 0.5));
        let config = SimulatorConfig {
            speed_km_per_hour: half_degree * 3600.0,
            tick_interval: Duration::from_secs(1),
            arrival_tolerance_km: 0.05,
            boarding_timeout,
            finish_delay: Duration::from_secs(3),
            ..Default::default()
        };
        let setup = TripSetup {
            bus_id: "PB01A1234".into(),
            path: vec![
                Location::new(0.0, 0.0),
                Location::new(0.0, 1.0),
                Location::new(0.0, 2.0),
            ],
            origin: Location::new(0.0, 1.0),
            destination: Location::new(0.0, 2.0),
            initial_position: None,
            initial_path_index: None,
        };
        TripSimulator::new(setup, config).unwrap()
    }

    async fn next_event<S>(updates: &mut S) -> TripEvent
    where
        S: Stream<Item = SessionUpdate> + Unpin,
    {
        loop {
            let update = updates.next().await.expect("session ended early");
            if let Some(event) = update.event {
                return event;
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn missed_boarding_ends_session() {
        let handle = spawn(trip(Duration::from_secs(5)), CancellationToken::new());
        let mut updates = Box::pin(handle.updates());

        assert_eq!(next_event(&mut updates).await, TripEvent::ArrivedAtRider);
        let arrived_at = time::Instant::now();
        assert_eq!(next_event(&mut updates).await, TripEvent::BoardingTimedOut);
        let waited = arrived_at.elapsed();
        assert!(waited >= Duration::from_secs(5) && waited < Duration::from_millis(5100));

        // the stream ends with the session
        assert!(updates.next().await.is_none());
        assert!(matches!(
            handle.confirm_boarding().await,
            Err(RequestError::SendError(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn full_trip_through_handle() {
        let handle = spawn(trip(Duration::from_secs(30)), CancellationToken::new());
        let mut updates = Box::pin(handle.updates());

        assert_eq!(next_event(&mut updates).await, TripEvent::ArrivedAtRider);
        assert!(matches!(
            handle.confirm_alight().await,
            Err(RequestError::Transition(_))
        ));
        assert_eq!(
            handle.confirm_boarding().await.unwrap(),
            TripEvent::BoardingConfirmed
        );
        assert_eq!(next_event(&mut updates).await, TripEvent::BoardingConfirmed);
        assert_eq!(next_event(&mut updates).await, TripEvent::ArrivedAtDestination);

        let snapshot = handle.snapshot().await.unwrap();
        assert_eq!(snapshot.state, TripState::AwaitingAlightConfirmation);
        assert_eq!(snapshot.position, Location::new(0.0, 2.0));

        assert_eq!(
            handle.confirm_alight().await.unwrap(),
            TripEvent::AlightConfirmed
        );
        assert_eq!(next_event(&mut updates).await, TripEvent::AlightConfirmed);
        assert_eq!(next_event(&mut updates).await, TripEvent::TripFinished);
        assert!(updates.next().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_and_shutdown() {
        let handle = spawn(trip(Duration::from_secs(30)), CancellationToken::new());
        assert_eq!(handle.cancel().await.unwrap(), TripEvent::Cancelled);
        time::sleep(Duration::from_millis(10)).await;
        assert!(handle.is_closed());
        assert!(Box::pin(handle.updates()).next().await.is_none());

        let shutdown = CancellationToken::new();
        let handle = spawn(trip(Duration::from_secs(30)), shutdown.clone());
        let mut updates = Box::pin(handle.updates());
        shutdown.cancel();
        while updates.next().await.is_some() {}
        assert!(handle.snapshot().await.is_err());
    }
}
