use std::{collections::HashMap, time::Duration};

use simulator::{Scheduler, TimerKind};
use tokio::{
    sync::mpsc,
    task::JoinHandle,
    time::{self, Instant, MissedTickBehavior},
};

/// A timer firing, tagged with the generation it was armed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fired {
    pub kind: TimerKind,
    pub generation: u64,
}

struct Armed {
    generation: u64,
    periodic: bool,
    handle: JoinHandle<()>,
}

/// Runs every timer as a tokio task that reports into a channel. Re-arming
/// or cancelling a kind aborts its task; firings that were already queued
/// are recognized as stale by their generation, see [`TokioScheduler::accept`].
pub struct TokioScheduler {
    sender: mpsc::UnboundedSender<Fired>,
    armed: HashMap<TimerKind, Armed>,
    next_generation: u64,
}

impl TokioScheduler {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Fired>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let scheduler = Self {
            sender,
            armed: HashMap::new(),
            next_generation: 0,
        };
        (scheduler, receiver)
    }

    /// True if `fired` belongs to a timer that is still armed. A one-shot
    /// timer counts as disarmed once accepted.
    pub fn accept(&mut self, fired: &Fired) -> bool {
        match self.armed.get(&fired.kind) {
            Some(armed) if armed.generation == fired.generation => {
                if !armed.periodic {
                    self.armed.remove(&fired.kind);
                }
                true
            }
            _ => false,
        }
    }

    fn arm(&mut self, kind: TimerKind, periodic: bool, handle: JoinHandle<()>, generation: u64) {
        if let Some(previous) = self.armed.insert(
            kind,
            Armed {
                generation,
                periodic,
                handle,
            },
        ) {
            previous.handle.abort();
        }
    }

    fn generation(&mut self) -> u64 {
        self.next_generation += 1;
        self.next_generation
    }
}

impl Scheduler for TokioScheduler {
    fn schedule_periodic(&mut self, kind: TimerKind, period: Duration) {
        let generation = self.generation();
        let sender = self.sender.clone();
        let handle = tokio::spawn(async move {
            let mut interval = time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                if sender.send(Fired { kind, generation }).is_err() {
                    break;
                }
            }
        });
        self.arm(kind, true, handle, generation);
    }

    fn schedule_once(&mut self, kind: TimerKind, delay: Duration) {
        let generation = self.generation();
        let sender = self.sender.clone();
        let handle = tokio::spawn(async move {
            time::sleep(delay).await;
            let _ = sender.send(Fired { kind, generation });
        });
        self.arm(kind, false, handle, generation);
    }

    fn cancel(&mut self, kind: TimerKind) {
        if let Some(armed) = self.armed.remove(&kind) {
            armed.handle.abort();
        }
    }

    fn cancel_all(&mut self) {
        for (_, armed) in self.armed.drain() {
            armed.handle.abort();
        }
    }

    fn is_scheduled(&self, kind: TimerKind) -> bool {
        self.armed.contains_key(&kind)
    }
}

impl Drop for TokioScheduler {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn periodic_timer_fires_every_period() {
        let (mut scheduler, mut fired) = TokioScheduler::new();
        scheduler.schedule_periodic(TimerKind::Advance, Duration::from_secs(1));
        let start = Instant::now();
        for expected in 1..=3 {
            let next = fired.recv().await.unwrap();
            assert!(scheduler.accept(&next));
            let elapsed = start.elapsed();
            assert!(elapsed >= Duration::from_secs(expected));
            assert!(elapsed < Duration::from_secs(expected) + Duration::from_millis(100));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn rearmed_timer_makes_old_firings_stale() {
        let (mut scheduler, mut fired) = TokioScheduler::new();
        scheduler.schedule_once(TimerKind::BoardingTimeout, Duration::from_secs(1));
        time::sleep(Duration::from_secs(2)).await;
        let stale = fired.recv().await.unwrap();

        scheduler.schedule_once(TimerKind::BoardingTimeout, Duration::from_secs(1));
        assert!(!scheduler.accept(&stale));

        let current = fired.recv().await.unwrap();
        assert!(scheduler.accept(&current));
        // one-shot timers are disarmed once accepted
        assert!(!scheduler.is_scheduled(TimerKind::BoardingTimeout));
        assert!(!scheduler.accept(&current));
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_timers_never_fire() {
        let (mut scheduler, mut fired) = TokioScheduler::new();
        scheduler.schedule_periodic(TimerKind::Advance, Duration::from_secs(1));
        scheduler.schedule_once(TimerKind::FinishDelay, Duration::from_secs(1));
        scheduler.cancel_all();
        assert!(!scheduler.is_scheduled(TimerKind::Advance));

        let result = time::timeout(Duration::from_secs(10), fired.recv()).await;
        assert!(result.is_err(), "no timer may fire after cancel_all");
    }
}
