use std::{collections::HashMap, time::Duration};

/// The timers a tracking session uses. At most one timer per kind is armed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TimerKind {
    /// Periodic simulation tick.
    Advance,
    /// One-shot window for the rider to confirm boarding.
    BoardingTimeout,
    /// One-shot delay between alighting and the end of the session.
    FinishDelay,
}

/// Arms and cancels timers. When a timer fires, the owner of the scheduler
/// is expected to feed the `TimerKind` back into the session.
///
/// Scheduling a kind that is already armed replaces the old timer.
pub trait Scheduler {
    fn schedule_periodic(&mut self, kind: TimerKind, period: Duration);

    fn schedule_once(&mut self, kind: TimerKind, delay: Duration);

    fn cancel(&mut self, kind: TimerKind);

    fn cancel_all(&mut self);

    fn is_scheduled(&self, kind: TimerKind) -> bool;
}

#[derive(Debug, Clone, Copy)]
struct Armed {
    due: Duration,
    period: Option<Duration>,
}

/// A scheduler on a virtual clock, advanced explicitly. Used to drive
/// sessions deterministically.
#[derive(Debug, Default)]
pub struct ManualScheduler {
    now: Duration,
    armed: HashMap<TimerKind, Armed>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Time elapsed on the virtual clock.
    pub fn now(&self) -> Duration {
        self.now
    }

    /// Pops the earliest timer due at or before `until` and moves the clock
    /// to its due time. Periodic timers are re-armed. Ties fire in
    /// `TimerKind` order.
    pub fn next_due(&mut self, until: Duration) -> Option<TimerKind> {
        let (kind, armed) = self
            .armed
            .iter()
            .filter(|(_, armed)| armed.due <= until)
            .min_by_key(|(kind, armed)| (armed.due, **kind))
            .map(|(kind, armed)| (*kind, *armed))?;

        self.now = self.now.max(armed.due);
        match armed.period {
            Some(period) => {
                self.armed.insert(
                    kind,
                    Armed {
                        due: armed.due + period,
                        period: Some(period),
                    },
                );
            }
            None => {
                self.armed.remove(&kind);
            }
        }
        Some(kind)
    }

    /// Moves the clock forward to `until` without firing anything.
    pub fn set_now(&mut self, until: Duration) {
        self.now = self.now.max(until);
    }

    pub fn armed_count(&self) -> usize {
        self.armed.len()
    }
}

impl Scheduler for ManualScheduler {
    fn schedule_periodic(&mut self, kind: TimerKind, period: Duration) {
        self.armed.insert(
            kind,
            Armed {
                due: self.now + period,
                period: Some(period),
            },
        );
    }

    fn schedule_once(&mut self, kind: TimerKind, delay: Duration) {
        self.armed.insert(
            kind,
            Armed {
                due: self.now + delay,
                period: None,
            },
        );
    }

    fn cancel(&mut self, kind: TimerKind) {
        self.armed.remove(&kind);
    }

    fn cancel_all(&mut self) {
        self.armed.clear();
    }

    fn is_scheduled(&self, kind: TimerKind) -> bool {
        self.armed.contains_key(&kind)
    }
}
