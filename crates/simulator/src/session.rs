//! Couples a [`TripSimulator`] with a [`Scheduler`]: the trip decides what
//! happens, the session arms and cancels the timers that drive it.

use std::time::Duration;

use model::trip::{TripEvent, TripSnapshot, TripState};

use crate::{
    error::TransitionError,
    scheduler::{ManualScheduler, Scheduler, TimerKind},
    trip::TripSimulator,
};

pub struct Session<S: Scheduler> {
    trip: TripSimulator,
    scheduler: S,
    closed: bool,
}

impl<S: Scheduler> Session<S> {
    pub fn new(trip: TripSimulator, scheduler: S) -> Self {
        Self {
            trip,
            scheduler,
            closed: false,
        }
    }

    pub fn trip(&self) -> &TripSimulator {
        &self.trip
    }

    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut S {
        &mut self.scheduler
    }

    pub fn state(&self) -> TripState {
        self.trip.state()
    }

    /// True once the session was torn down. No timer is armed afterwards.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn snapshot(&self) -> TripSnapshot {
        self.trip.snapshot()
    }

    /// Starts the periodic simulation tick.
    pub fn start(&mut self) {
        if self.closed || !self.trip.is_advancing() {
            return;
        }
        self.scheduler
            .schedule_periodic(TimerKind::Advance, self.trip.config().tick_interval);
    }

    /// Tears the session down, releasing every timer.
    pub fn stop(&mut self) {
        self.scheduler.cancel_all();
        self.trip.halt();
        self.closed = true;
    }

    /// Runs one simulation step, as if the advance timer fired.
    pub fn tick(&mut self) -> Option<TripEvent> {
        self.on_timer(TimerKind::Advance)
    }

    /// Handles a fired timer. Timers that fire after the phase they belong
    /// to has ended are ignored.
    pub fn on_timer(&mut self, kind: TimerKind) -> Option<TripEvent> {
        if self.closed {
            return None;
        }
        match kind {
            TimerKind::Advance => {
                let event = self.trip.tick();
                if let Some(event) = event {
                    self.apply(event);
                } else if !self.trip.is_advancing() {
                    self.scheduler.cancel(TimerKind::Advance);
                }
                event
            }
            TimerKind::BoardingTimeout => match self.trip.expire_boarding() {
                Ok(event) => {
                    self.apply(event);
                    Some(event)
                }
                Err(why) => {
                    log::debug!("ignoring stale boarding timeout: {}", why);
                    None
                }
            },
            TimerKind::FinishDelay => {
                if self.trip.state() != TripState::Finished {
                    return None;
                }
                self.apply(TripEvent::TripFinished);
                Some(TripEvent::TripFinished)
            }
        }
    }

    pub fn confirm_boarding(&mut self) -> Result<TripEvent, TransitionError> {
        let event = self.trip.confirm_boarding()?;
        self.apply(event);
        Ok(event)
    }

    pub fn confirm_alight(&mut self) -> Result<TripEvent, TransitionError> {
        let event = self.trip.confirm_alight()?;
        self.apply(event);
        Ok(event)
    }

    pub fn cancel(&mut self) -> Result<TripEvent, TransitionError> {
        let event = self.trip.cancel()?;
        self.apply(event);
        Ok(event)
    }

    fn apply(&mut self, event: TripEvent) {
        let config = self.trip.config().clone();
        match event {
            TripEvent::ArrivedAtRider => {
                self.scheduler.cancel(TimerKind::Advance);
                self.scheduler
                    .schedule_once(TimerKind::BoardingTimeout, config.boarding_timeout);
            }
            TripEvent::BoardingConfirmed => {
                self.scheduler.cancel(TimerKind::BoardingTimeout);
                self.scheduler
                    .schedule_periodic(TimerKind::Advance, config.tick_interval);
            }
            TripEvent::ArrivedAtDestination => {
                self.scheduler.cancel(TimerKind::Advance);
            }
            TripEvent::AlightConfirmed => {
                if self.trip.is_advancing() {
                    self.scheduler
                        .schedule_periodic(TimerKind::Advance, config.tick_interval);
                }
                self.scheduler
                    .schedule_once(TimerKind::FinishDelay, config.finish_delay);
            }
            TripEvent::BoardingTimedOut | TripEvent::TripFinished | TripEvent::Cancelled => {
                self.stop();
            }
        }
    }
}

impl Session<ManualScheduler> {
    /// Moves the virtual clock forward, firing every timer that comes due
    /// on the way, and returns the events in order.
    pub fn advance_clock(&mut self, by: Duration) -> Vec<TripEvent> {
        let until = self.scheduler.now() + by;
        let mut events = Vec::new();
        while let Some(kind) = self.scheduler.next_due(until) {
            events.extend(self.on_timer(kind));
        }
        self.scheduler.set_now(until);
        events
    }
}

impl<S: Scheduler> Drop for Session<S> {
    fn drop(&mut self) {
        self.scheduler.cancel_all();
    }
}
