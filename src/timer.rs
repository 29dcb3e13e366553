//! Countdown timers and the registry that ticks them once per update.
//!
//! Timers live in a [`TimerRegistry`] owned by the game manager and are
//! addressed by [`TimerId`]. A timer stays registered until it is
//! explicitly removed; forgetting to remove one leaks its slot.

use std::time::Duration;

use tracing::{debug, trace};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TimerId {
    index: u32,
    generation: u32,
}

type ExpiredHandler = Box<dyn FnMut(TimerId, &mut TimerRegistry)>;

/// A countdown this close to zero counts as run out. Frame intervals such
/// as 1/30 s are not exact in nanoseconds, so whole-second periods would
/// otherwise fire a step late.
const EXPIRY_TOLERANCE: Duration = Duration::from_micros(1);

pub struct CountdownTimer {
    remaining: Duration,
    period: Duration,
    periodic: bool,
    running: bool,
    expirations: u32,
    handlers: Vec<ExpiredHandler>,
}

impl CountdownTimer {
    pub fn new(period: Duration, periodic: bool) -> Self {
        CountdownTimer {
            remaining: Duration::ZERO,
            period,
            periodic,
            running: false,
            expirations: 0,
            handlers: Vec::new(),
        }
    }

    /// Start counting down from the configured period.
    pub fn start(&mut self) {
        self.start_with(self.period);
    }

    /// Start counting down from `duration`, which also becomes the period.
    pub fn start_with(&mut self, duration: Duration) {
        self.remaining = duration;
        self.period = duration;
        self.running = true;
    }

    /// Stop without notifying anyone.
    pub fn cancel(&mut self) {
        self.remaining = Duration::ZERO;
        self.running = false;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn is_periodic(&self) -> bool {
        self.periodic
    }

    /// Seconds left before expiry.
    pub fn remaining(&self) -> f32 {
        self.remaining.as_secs_f32()
    }

    pub fn remaining_duration(&self) -> Duration {
        self.remaining
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Count down by `elapsed`; true once the countdown has run out.
    fn tick(&mut self, elapsed: Duration) -> bool {
        if !self.running {
            return false;
        }
        self.remaining = self.remaining.saturating_sub(elapsed);
        self.remaining <= EXPIRY_TOLERANCE
    }
}

struct TimerSlot {
    generation: u32,
    timer: Option<CountdownTimer>,
}

#[derive(Default)]
pub struct TimerRegistry {
    slots: Vec<TimerSlot>,
    free: Vec<u32>,
    count: usize,
}

impl TimerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new, stopped timer.
    pub fn create(&mut self, period: Duration, periodic: bool) -> TimerId {
        let timer = CountdownTimer::new(period, periodic);
        self.count += 1;
        let id = match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.timer = Some(timer);
                TimerId {
                    index,
                    generation: slot.generation,
                }
            }
            None => {
                self.slots.push(TimerSlot {
                    generation: 0,
                    timer: Some(timer),
                });
                TimerId {
                    index: (self.slots.len() - 1) as u32,
                    generation: 0,
                }
            }
        };
        debug!(?id, ?period, periodic, "timer registered");
        id
    }

    /// Deregister a timer. Returns false if it was already gone.
    pub fn remove(&mut self, id: TimerId) -> bool {
        let Some(slot) = self.slots.get_mut(id.index as usize) else {
            return false;
        };
        if slot.generation != id.generation || slot.timer.is_none() {
            return false;
        }
        slot.timer = None;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
        self.count -= 1;
        debug!(?id, "timer removed");
        true
    }

    /// Number of registered timers.
    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn get(&self, id: TimerId) -> Option<&CountdownTimer> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.timer.as_ref())
    }

    pub fn get_mut(&mut self, id: TimerId) -> Option<&mut CountdownTimer> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.timer.as_mut())
    }

    pub fn start(&mut self, id: TimerId) {
        if let Some(timer) = self.get_mut(id) {
            timer.start();
        }
    }

    pub fn start_with(&mut self, id: TimerId, duration: Duration) {
        if let Some(timer) = self.get_mut(id) {
            timer.start_with(duration);
        }
    }

    pub fn cancel(&mut self, id: TimerId) {
        if let Some(timer) = self.get_mut(id) {
            timer.cancel();
        }
    }

    pub fn is_running(&self, id: TimerId) -> bool {
        self.get(id).is_some_and(CountdownTimer::is_running)
    }

    pub fn remaining(&self, id: TimerId) -> Option<f32> {
        self.get(id).map(CountdownTimer::remaining)
    }

    /// Call `handler` every time the timer expires.
    pub fn on_expired<F>(&mut self, id: TimerId, handler: F)
    where
        F: FnMut(TimerId, &mut TimerRegistry) + 'static,
    {
        if let Some(timer) = self.get_mut(id) {
            timer.handlers.push(Box::new(handler));
        }
    }

    /// Expiries since the previous call, for owners that poll instead of
    /// registering a handler.
    pub fn take_expirations(&mut self, id: TimerId) -> u32 {
        self.get_mut(id)
            .map(|timer| std::mem::take(&mut timer.expirations))
            .unwrap_or(0)
    }

    /// Expire the countdown now: stop it, notify handlers, then re-arm it
    /// with its period if it is periodic.
    ///
    /// Fires whether or not the timer is running, so game code can force an
    /// early expiry.
    pub fn expire(&mut self, id: TimerId) {
        let handlers = match self.get_mut(id) {
            Some(timer) => {
                timer.cancel();
                timer.expirations += 1;
                std::mem::take(&mut timer.handlers)
            }
            None => return,
        };

        let mut handlers = handlers;
        for handler in &mut handlers {
            handler(id, self);
        }

        // A handler may have removed the timer or registered more handlers.
        if let Some(timer) = self.get_mut(id) {
            handlers.append(&mut timer.handlers);
            timer.handlers = handlers;
            if timer.periodic {
                timer.start();
            }
        }
    }

    /// Expire, then make sure the timer stays stopped even if periodic.
    pub fn expire_and_cancel(&mut self, id: TimerId) {
        self.expire(id);
        self.cancel(id);
    }

    /// Advance every running timer by `elapsed` seconds. Negative or
    /// non-finite values count as no time at all.
    pub fn update(&mut self, elapsed: f32) {
        self.advance(Duration::try_from_secs_f32(elapsed).unwrap_or(Duration::ZERO));
    }

    /// Advance every running timer by `elapsed`.
    pub fn advance(&mut self, elapsed: Duration) {
        let count = self.slots.len();
        for index in 0..count {
            let slot = &mut self.slots[index];
            let id = TimerId {
                index: index as u32,
                generation: slot.generation,
            };
            let expired = match slot.timer.as_mut() {
                Some(timer) if timer.is_running() => timer.tick(elapsed),
                _ => false,
            };
            if expired {
                trace!(?id, "timer expired");
                self.expire(id);
            }
        }
    }
}
