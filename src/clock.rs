//! Simulation clock seam and a deterministic reference implementation.

use std::cell::Cell;
use std::time::Duration;

use tracing::trace;

use crate::event::{Event, Subscription};
use crate::time::{Timestamp, offset_by_seconds};

/// The clock state published with every tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClockState {
    /// Current simulated instant.
    pub current_time: Timestamp,
    /// Desired playback rate; may be zero or negative.
    pub multiplier: f64,
    /// Whether simulated time is actively advancing.
    pub should_animate: bool,
}

/// A source of simulation ticks.
pub trait Clock {
    /// Registers `listener` to run on every tick.
    fn subscribe_tick(&self, listener: Box<dyn Fn(&ClockState)>) -> Subscription;
}

/// A deterministic simulation clock that only advances when ticked.
///
/// Each tick moves simulated time forward by the tick interval scaled by the
/// multiplier, so negative multipliers run time backwards. No wall-clock time
/// is consulted, which keeps scenarios reproducible.
#[derive(Debug)]
pub struct SimClock {
    state: Cell<ClockState>,
    tick_interval: Cell<Duration>,
    on_tick: Event<ClockState>,
}

impl SimClock {
    /// Creates a paused clock at `start` with a multiplier of one.
    ///
    /// # Parameters
    /// - `start`: The initial simulated instant.
    /// - `tick_interval`: Real time represented by a single [`tick`](Self::tick).
    pub fn new(start: Timestamp, tick_interval: Duration) -> Self {
        Self {
            state: Cell::new(ClockState {
                current_time: start,
                multiplier: 1.0,
                should_animate: false,
            }),
            tick_interval: Cell::new(tick_interval),
            on_tick: Event::new(),
        }
    }

    /// Returns the state the next tick would publish if time did not move.
    pub fn state(&self) -> ClockState {
        self.state.get()
    }

    /// Returns the current simulated instant.
    pub fn now(&self) -> Timestamp {
        self.state.get().current_time
    }

    /// Jumps to `time` without emitting a tick.
    pub fn set_current_time(&self, time: Timestamp) {
        self.update(|state| state.current_time = time);
    }

    pub fn set_multiplier(&self, multiplier: f64) {
        self.update(|state| state.multiplier = multiplier);
    }

    pub fn set_should_animate(&self, should_animate: bool) {
        self.update(|state| state.should_animate = should_animate);
    }

    pub fn tick_interval(&self) -> Duration {
        self.tick_interval.get()
    }

    pub fn set_tick_interval(&self, tick_interval: Duration) {
        self.tick_interval.set(tick_interval);
    }

    /// Advances by one tick interval and notifies listeners.
    pub fn tick(&self) -> Timestamp {
        self.tick_by(self.tick_interval.get())
    }

    /// Advances by `elapsed` real time and notifies listeners.
    ///
    /// Time only moves while the clock is animating. If the scaled step would
    /// leave the representable range the clock holds its position.
    pub fn tick_by(&self, elapsed: Duration) -> Timestamp {
        let mut state = self.state.get();
        if state.should_animate {
            let step = elapsed.as_secs_f64() * state.multiplier;
            if let Some(next) = offset_by_seconds(state.current_time, step) {
                state.current_time = next;
            }
            self.state.set(state);
        }
        trace!(time = %state.current_time, multiplier = state.multiplier, "clock tick");
        self.on_tick.emit(&state);
        state.current_time
    }

    /// Returns the number of live tick subscriptions.
    pub fn listener_count(&self) -> usize {
        self.on_tick.listener_count()
    }

    fn update(&self, apply: impl FnOnce(&mut ClockState)) {
        let mut state = self.state.get();
        apply(&mut state);
        self.state.set(state);
    }
}

impl Clock for SimClock {
    fn subscribe_tick(&self, listener: Box<dyn Fn(&ClockState)>) -> Subscription {
        self.on_tick.subscribe(listener)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::seconds_between;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn start() -> Timestamp {
        "2015-11-01T00:00:00Z".parse().unwrap()
    }

    #[test]
    fn clock_holds_still_until_animating() {
        let clock = SimClock::new(start(), Duration::from_millis(500));
        clock.tick();
        assert_eq!(clock.now(), start());

        clock.set_should_animate(true);
        clock.tick();
        clock.tick();
        assert_eq!(seconds_between(clock.now(), start()), 1.0);
    }

    #[test]
    fn clock_scales_and_reverses_with_multiplier() {
        let clock = SimClock::new(start(), Duration::from_secs(1));
        clock.set_should_animate(true);

        clock.set_multiplier(4.0);
        clock.tick();
        assert_eq!(seconds_between(clock.now(), start()), 4.0);

        clock.set_multiplier(-2.0);
        clock.tick();
        assert_eq!(seconds_between(clock.now(), start()), 2.0);
    }

    #[test]
    fn clock_publishes_state_to_subscribers() {
        let clock = SimClock::new(start(), Duration::from_secs(1));
        let seen = Rc::new(RefCell::new(Vec::new()));

        let sink = seen.clone();
        let subscription = clock.subscribe_tick(Box::new(move |state: &ClockState| {
            sink.borrow_mut().push(*state);
        }));
        clock.set_multiplier(0.5);
        clock.tick();
        drop(subscription);
        clock.tick();

        let seen = seen.borrow();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].multiplier, 0.5);
        assert!(!seen[0].should_animate);
        assert_eq!(clock.listener_count(), 0);
    }

    #[test]
    fn scrubbing_jumps_without_ticking() {
        let clock = SimClock::new(start(), Duration::from_secs(1));
        let earlier = offset_by_seconds(start(), -30.0).unwrap();
        clock.set_current_time(earlier);
        assert_eq!(clock.now(), earlier);
        assert_eq!(clock.state().current_time, earlier);
    }
}
