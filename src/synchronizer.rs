//! Keeps a media element in step with a simulation clock.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use tracing::{debug, trace};

use crate::clock::{Clock, ClockState};
use crate::error::SyncError;
use crate::event::Subscription;
use crate::mapping::{SEEK_INTERVAL, desired_media_time, tolerance};
use crate::media::{ReadyState, SharedSink};
use crate::time::{MINIMUM_TIMESTAMP, Timestamp};
use crate::time_source::{MonotonicTimeSource, TimeSource};

/// Construction options for a [`Synchronizer`]. Every field is optional.
#[derive(Default)]
pub struct SyncOptions {
    pub clock: Option<Rc<dyn Clock>>,
    pub element: Option<SharedSink>,
    pub epoch: Option<Timestamp>,
    /// Wall-clock provider for the seek rate limiter; defaults to
    /// [`MonotonicTimeSource`].
    pub time_source: Option<Rc<dyn TimeSource>>,
}

/// State the tick handler reads and writes.
struct SyncState {
    element: Option<SharedSink>,
    epoch: Option<Timestamp>,
    seeking: Rc<Cell<bool>>,
    last_seek: Option<Duration>,
    time_source: Rc<dyn TimeSource>,
}

/// Drives a [`MediaSink`](crate::MediaSink) from the ticks of a [`Clock`].
///
/// On every tick the synchronizer reconciles play/pause with the clock's run
/// state, copies the clock multiplier into the playback rate and seeks the
/// element when its position drifts from the clock by more than a tolerance.
/// Seeks are limited to one per [`SEEK_INTERVAL`], and no rate or position
/// changes are issued while a seek is outstanding.
pub struct Synchronizer {
    clock: Option<Rc<dyn Clock>>,
    clock_subscription: Option<Subscription>,
    seek_subscription: Option<Subscription>,
    state: Rc<RefCell<SyncState>>,
    destroyed: bool,
}

impl Synchronizer {
    /// Creates a synchronizer and attaches any clock and element in `options`.
    pub fn new(options: SyncOptions) -> Self {
        let time_source = options
            .time_source
            .unwrap_or_else(|| Rc::new(MonotonicTimeSource::new()));
        let mut synchronizer = Self {
            clock: None,
            clock_subscription: None,
            seek_subscription: None,
            state: Rc::new(RefCell::new(SyncState {
                element: None,
                epoch: options.epoch,
                seeking: Rc::new(Cell::new(false)),
                last_seek: None,
                time_source,
            })),
            destroyed: false,
        };
        synchronizer.attach_clock(options.clock);
        synchronizer.attach_element(options.element);
        synchronizer
    }

    pub fn clock(&self) -> Option<Rc<dyn Clock>> {
        self.clock.clone()
    }

    /// Replaces the clock, moving the tick subscription to `clock`.
    ///
    /// Assigning the clock that is already attached does nothing.
    pub fn set_clock(&mut self, clock: Option<Rc<dyn Clock>>) -> Result<(), SyncError> {
        self.ensure_live()?;
        self.attach_clock(clock);
        Ok(())
    }

    pub fn element(&self) -> Option<SharedSink> {
        self.state.borrow().element.clone()
    }

    /// Replaces the media element, moving the seek-completion listener to it.
    ///
    /// Attaching a different element abandons any outstanding seek.
    /// Assigning the element that is already attached does nothing.
    pub fn set_element(&mut self, element: Option<SharedSink>) -> Result<(), SyncError> {
        self.ensure_live()?;
        self.attach_element(element);
        Ok(())
    }

    pub fn epoch(&self) -> Option<Timestamp> {
        self.state.borrow().epoch
    }

    /// Sets the instant that maps to media position zero.
    pub fn set_epoch(&mut self, epoch: Option<Timestamp>) {
        self.state.borrow_mut().epoch = epoch;
    }

    /// Returns `true` while a programmatic seek awaits completion.
    pub fn is_seeking(&self) -> bool {
        self.state.borrow().seeking.get()
    }

    /// Detaches the element and the clock. The instance cannot be used again.
    pub fn destroy(&mut self) -> Result<(), SyncError> {
        self.ensure_live()?;
        self.attach_element(None);
        self.attach_clock(None);
        self.destroyed = true;
        Ok(())
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    fn ensure_live(&self) -> Result<(), SyncError> {
        if self.destroyed {
            return Err(SyncError::InvalidState("synchronizer has been destroyed"));
        }
        Ok(())
    }

    fn attach_clock(&mut self, clock: Option<Rc<dyn Clock>>) {
        if same_instance(&self.clock, &clock) {
            return;
        }

        if let Some(subscription) = self.clock_subscription.take() {
            subscription.unsubscribe();
            debug!("detached from previous clock");
        }

        if let Some(clock) = &clock {
            let state = Rc::downgrade(&self.state);
            self.clock_subscription = Some(clock.subscribe_tick(Box::new(move |tick: &ClockState| {
                if let Some(state) = state.upgrade() {
                    synchronize(&mut state.borrow_mut(), tick);
                }
            })));
            debug!("attached to clock");
        }

        self.clock = clock;
    }

    fn attach_element(&mut self, element: Option<SharedSink>) {
        let mut state = self.state.borrow_mut();
        if same_instance(&state.element, &element) {
            return;
        }

        if let Some(subscription) = self.seek_subscription.take() {
            subscription.unsubscribe();
            debug!("detached from previous media element");
        }

        if let Some(element) = &element {
            state.seeking.set(false);
            let seeking = Rc::clone(&state.seeking);
            self.seek_subscription = Some(element.borrow().subscribe_seeked(Box::new(
                move |_: &()| seeking.set(false),
            )));
            debug!("attached to media element");
        }

        state.element = element;
    }
}

impl fmt::Debug for Synchronizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("Synchronizer")
            .field("has_clock", &self.clock.is_some())
            .field("has_element", &state.element.is_some())
            .field("epoch", &state.epoch)
            .field("seeking", &state.seeking.get())
            .field("destroyed", &self.destroyed)
            .finish()
    }
}

fn same_instance<T: ?Sized>(current: &Option<Rc<T>>, next: &Option<Rc<T>>) -> bool {
    match (current, next) {
        (Some(current), Some(next)) => Rc::ptr_eq(current, next),
        (None, None) => true,
        _ => false,
    }
}

/// Applies one clock tick to the attached element.
fn synchronize(state: &mut SyncState, tick: &ClockState) {
    let Some(element) = state.element.clone() else {
        return;
    };
    let mut media = element.borrow_mut();

    let ready_state = media.ready_state();
    if ready_state < ReadyState::HaveCurrentData {
        trace!(?ready_state, "media not ready, skipping tick");
        return;
    }

    // Only act while the element disagrees with the desired run state.
    if tick.should_animate == media.is_paused() {
        if tick.should_animate {
            debug!("starting media playback");
            media.play();
        } else {
            debug!("pausing media playback");
            media.pause();
        }
    }

    // Position reads are unreliable until the pending seek lands.
    if state.seeking.get() {
        trace!("seek outstanding, skipping rate and position sync");
        return;
    }

    media.set_playback_rate(tick.multiplier);

    let epoch = state.epoch.unwrap_or(MINIMUM_TIMESTAMP);
    let Some(desired) = desired_media_time(
        tick.current_time,
        epoch,
        media.duration(),
        media.is_looping(),
    ) else {
        return;
    };

    let now = state.time_source.now();
    let may_seek = state
        .last_seek
        .is_none_or(|last| now.saturating_sub(last) > SEEK_INTERVAL);
    let drift = (desired - media.current_time()).abs();

    if drift > tolerance(tick.should_animate) && may_seek {
        debug!(desired, drift, "seeking media to match clock");
        state.seeking.set(true);
        state.last_seek = Some(now);
        media.set_current_time(desired);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SimClock;
    use crate::media::{MediaCall, MediaSink, SimulatedMedia};
    use crate::time::offset_by_seconds;
    use crate::time_source::ManualTimeSource;

    const DURATION: f64 = 32.0;

    fn epoch() -> Timestamp {
        "2015-11-01T00:00:00Z".parse().unwrap()
    }

    struct Fixture {
        clock: Rc<SimClock>,
        media: Rc<RefCell<SimulatedMedia>>,
        time: Rc<ManualTimeSource>,
        synchronizer: Synchronizer,
    }

    fn fixture(media: SimulatedMedia) -> Fixture {
        let clock = Rc::new(SimClock::new(epoch(), Duration::ZERO));
        let media = media.into_shared();
        let time = Rc::new(ManualTimeSource::new(Duration::from_secs(1)));
        let synchronizer = Synchronizer::new(SyncOptions {
            clock: Some(clock.clone()),
            element: Some(media.clone()),
            epoch: Some(epoch()),
            time_source: Some(time.clone()),
        });
        Fixture {
            clock,
            media,
            time,
            synchronizer,
        }
    }

    impl Fixture {
        fn scrub_to(&self, seconds: f64) {
            self.clock
                .set_current_time(offset_by_seconds(epoch(), seconds).unwrap());
        }

        fn seeks(&self) -> Vec<f64> {
            self.media.borrow().seek_requests()
        }

        /// Lands any pending seek and delivers its notification.
        fn settle(&self) {
            land_seek(&self.media);
        }
    }

    fn land_seek(media: &Rc<RefCell<SimulatedMedia>>) {
        media.borrow_mut().complete_seek();
        SimulatedMedia::dispatch_events(media);
    }

    #[test]
    fn default_construction_has_nothing_attached() {
        let mut synchronizer = Synchronizer::new(SyncOptions::default());
        assert!(synchronizer.clock().is_none());
        assert!(synchronizer.element().is_none());
        assert!(synchronizer.epoch().is_none());
        assert!(!synchronizer.is_destroyed());

        assert_eq!(synchronizer.destroy(), Ok(()));
        assert!(synchronizer.is_destroyed());
        assert!(matches!(
            synchronizer.destroy(),
            Err(SyncError::InvalidState(_))
        ));
    }

    #[test]
    fn construction_with_options_attaches_everything() {
        let mut f = fixture(SimulatedMedia::new(Some(DURATION)));
        let clock: Rc<dyn Clock> = f.clock.clone();
        let media: SharedSink = f.media.clone();

        assert!(Rc::ptr_eq(&f.synchronizer.clock().unwrap(), &clock));
        assert!(Rc::ptr_eq(&f.synchronizer.element().unwrap(), &media));
        assert_eq!(f.synchronizer.epoch(), Some(epoch()));
        assert_eq!(f.clock.listener_count(), 1);

        f.synchronizer.destroy().unwrap();
        assert_eq!(f.clock.listener_count(), 0);
        assert!(f.synchronizer.clock().is_none());
        assert!(f.synchronizer.element().is_none());
    }

    #[test]
    fn destroyed_synchronizer_rejects_reassignment() {
        let mut f = fixture(SimulatedMedia::new(Some(DURATION)));
        f.synchronizer.destroy().unwrap();

        let clock: Rc<dyn Clock> = f.clock.clone();
        assert!(f.synchronizer.set_clock(Some(clock)).is_err());
        assert!(f.synchronizer.set_element(Some(f.media.clone())).is_err());

        f.scrub_to(10.0);
        f.clock.tick();
        assert!(f.seeks().is_empty());
    }

    #[test]
    fn reassigning_the_same_clock_keeps_one_subscription() {
        let mut f = fixture(SimulatedMedia::new(Some(DURATION)));
        let clock: Rc<dyn Clock> = f.clock.clone();
        f.synchronizer.set_clock(Some(clock)).unwrap();
        assert_eq!(f.clock.listener_count(), 1);

        let other = Rc::new(SimClock::new(epoch(), Duration::ZERO));
        f.synchronizer.set_clock(Some(other.clone())).unwrap();
        assert_eq!(f.clock.listener_count(), 0);
        assert_eq!(other.listener_count(), 1);
    }

    #[test]
    fn unready_media_is_left_alone() {
        let mut media = SimulatedMedia::new(Some(DURATION));
        media.set_ready_state(ReadyState::HaveMetadata);
        let f = fixture(media);

        f.clock.set_should_animate(true);
        f.scrub_to(10.0);
        f.clock.tick();

        assert!(f.media.borrow().calls().is_empty());
    }

    #[test]
    fn play_and_pause_follow_clock() {
        let f = fixture(SimulatedMedia::new(Some(DURATION)));

        f.clock.set_should_animate(false);
        f.clock.tick();
        assert!(f.media.borrow().is_paused());

        f.clock.set_should_animate(true);
        f.clock.tick();
        assert!(!f.media.borrow().is_paused());

        f.clock.set_should_animate(false);
        f.clock.tick();
        assert!(f.media.borrow().is_paused());

        assert_eq!(
            f.media.borrow().calls(),
            &[MediaCall::Play, MediaCall::Pause]
        );
    }

    #[test]
    fn playback_rate_tracks_multiplier_even_when_paused() {
        let f = fixture(SimulatedMedia::new(Some(DURATION)));
        f.clock.set_multiplier(-3.0);
        f.clock.tick();
        assert_eq!(f.media.borrow().playback_rate(), -3.0);
    }

    #[test]
    fn seeks_are_rate_limited() {
        let f = fixture(SimulatedMedia::new(Some(DURATION)));

        f.scrub_to(5.0);
        f.clock.tick();
        f.settle();
        f.time.advance(Duration::from_millis(50));
        f.scrub_to(6.0);
        f.clock.tick();
        assert_eq!(f.seeks(), vec![5.0]);

        f.time.advance(Duration::from_millis(51));
        f.scrub_to(7.0);
        f.clock.tick();
        assert_eq!(f.seeks(), vec![5.0, 7.0]);
    }

    #[test]
    fn tolerance_is_tighter_while_paused() {
        let f = fixture(SimulatedMedia::new(Some(DURATION)));
        f.media.borrow_mut().set_current_time(10.0);
        f.settle();
        f.scrub_to(10.01);

        f.clock.set_should_animate(true);
        f.clock.tick();
        assert_eq!(f.seeks(), vec![10.0]);

        f.clock.set_should_animate(false);
        f.clock.tick();
        let seeks = f.seeks();
        assert_eq!(seeks.len(), 2);
        assert!((seeks[1] - 10.01).abs() < 1e-9);
    }

    #[test]
    fn outstanding_seek_suppresses_rate_and_position_updates() {
        let f = fixture(
            SimulatedMedia::new(Some(DURATION)).with_seek_latency(Duration::from_secs(1)),
        );

        f.scrub_to(5.0);
        f.clock.tick();
        assert!(f.synchronizer.is_seeking());

        f.time.advance(Duration::from_secs(1));
        f.clock.set_multiplier(2.0);
        f.clock.set_should_animate(true);
        f.scrub_to(20.0);
        f.clock.tick();

        assert_eq!(f.seeks(), vec![5.0]);
        assert_eq!(f.media.borrow().playback_rate(), 1.0);
        assert!(!f.media.borrow().is_paused());

        f.settle();
        assert!(!f.synchronizer.is_seeking());
        f.clock.tick();
        assert_eq!(f.seeks(), vec![5.0, 20.0]);
        assert_eq!(f.media.borrow().playback_rate(), 2.0);
    }

    #[test]
    fn reassigning_element_resets_seek_state() {
        let mut f = fixture(
            SimulatedMedia::new(Some(DURATION)).with_seek_latency(Duration::from_secs(1)),
        );
        f.scrub_to(5.0);
        f.clock.tick();
        assert!(f.synchronizer.is_seeking());

        let replacement = SimulatedMedia::new(Some(DURATION))
            .with_seek_latency(Duration::from_secs(1))
            .into_shared();
        f.synchronizer
            .set_element(Some(replacement.clone()))
            .unwrap();
        assert!(!f.synchronizer.is_seeking());

        f.time.advance(Duration::from_secs(1));
        f.clock.tick();
        assert!(f.synchronizer.is_seeking());
        assert_eq!(replacement.borrow().seek_requests(), vec![5.0]);

        // Completion on the detached element no longer clears the flag.
        f.settle();
        assert!(f.synchronizer.is_seeking());

        land_seek(&replacement);
        assert!(!f.synchronizer.is_seeking());
    }

    #[test]
    fn seeked_listener_can_read_the_element() {
        let f = fixture(SimulatedMedia::new(Some(DURATION)));
        let landed_at = Rc::new(Cell::new(None));

        let observed = landed_at.clone();
        let reader = Rc::downgrade(&f.media);
        let _subscription = f.media.borrow().subscribe_seeked(Box::new(move |_: &()| {
            if let Some(media) = reader.upgrade() {
                observed.set(Some(media.borrow().current_time()));
            }
        }));

        f.scrub_to(12.0);
        f.clock.tick();
        assert!(f.synchronizer.is_seeking());

        f.media.borrow_mut().advance(Duration::ZERO);
        SimulatedMedia::dispatch_events(&f.media);
        assert_eq!(landed_at.get(), Some(12.0));
        assert!(!f.synchronizer.is_seeking());
    }

    #[test]
    fn unset_epoch_maps_from_minimum_timestamp() {
        let mut f = fixture(SimulatedMedia::new(Some(DURATION)));
        f.synchronizer.set_epoch(None);
        f.clock.tick();
        assert_eq!(f.seeks(), vec![DURATION]);
    }

    #[test]
    fn dropped_synchronizer_stops_listening() {
        let f = fixture(SimulatedMedia::new(Some(DURATION)));
        let Fixture {
            clock,
            media,
            synchronizer,
            ..
        } = f;
        drop(synchronizer);

        assert_eq!(clock.listener_count(), 0);
        clock.set_should_animate(true);
        clock.tick();
        assert!(media.borrow().calls().is_empty());
    }
}
