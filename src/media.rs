//! Media element seam and a deterministic simulated element.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use tracing::debug;

use crate::event::{Event, Subscription};

/// How much media data is available, ordered from least to most.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ReadyState {
    HaveNothing = 0,
    HaveMetadata = 1,
    HaveCurrentData = 2,
    HaveFutureData = 3,
    HaveEnoughData = 4,
}

impl ReadyState {
    /// Converts a numeric readiness level in `0..=4`.
    pub fn from_level(level: u8) -> Option<Self> {
        match level {
            0 => Some(Self::HaveNothing),
            1 => Some(Self::HaveMetadata),
            2 => Some(Self::HaveCurrentData),
            3 => Some(Self::HaveFutureData),
            4 => Some(Self::HaveEnoughData),
            _ => None,
        }
    }

    pub fn level(self) -> u8 {
        self as u8
    }
}

/// A playable media element steered by the synchronizer.
pub trait MediaSink {
    fn play(&mut self);

    fn pause(&mut self);

    /// Playback position in seconds.
    fn current_time(&self) -> f64;

    /// Requests a seek to `seconds`. Completion is reported through the
    /// listeners registered with [`MediaSink::subscribe_seeked`].
    fn set_current_time(&mut self, seconds: f64);

    /// Media length in seconds, or `None` while unknown.
    fn duration(&self) -> Option<f64>;

    fn is_looping(&self) -> bool;

    fn is_paused(&self) -> bool;

    fn set_playback_rate(&mut self, rate: f64);

    fn ready_state(&self) -> ReadyState;

    /// Registers `listener` to run whenever a requested seek completes.
    fn subscribe_seeked(&self, listener: Box<dyn Fn(&())>) -> Subscription;
}

/// Shared handle to a media element, compared by pointer identity.
pub type SharedSink = Rc<RefCell<dyn MediaSink>>;

/// Calls made against a [`SimulatedMedia`], in order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MediaCall {
    Play,
    Pause,
    Seek(f64),
}

/// A deterministic stand-in for a media element.
///
/// Position writes are clamped to the seekable range `[0, duration]` and
/// complete after the configured seek latency. While a seek is pending the
/// position does not advance. Even a zero latency seek stays pending until the
/// next [`advance`](Self::advance).
///
/// Completed seeks are queued rather than announced from inside `&mut self`.
/// [`dispatch_events`](Self::dispatch_events) delivers them once the caller
/// has released its borrow, so `seeked` listeners may read the element.
#[derive(Debug)]
pub struct SimulatedMedia {
    current_time: f64,
    duration: Option<f64>,
    looping: bool,
    paused: bool,
    playback_rate: f64,
    ready_state: ReadyState,
    seek_latency: Duration,
    pending_seek: Option<Duration>,
    queued_seeked: usize,
    calls: Vec<MediaCall>,
    seeked: Event<()>,
}

impl SimulatedMedia {
    /// Creates a paused element of the given length, fully loaded.
    pub fn new(duration: Option<f64>) -> Self {
        Self {
            current_time: 0.0,
            duration,
            looping: false,
            paused: true,
            playback_rate: 1.0,
            ready_state: ReadyState::HaveEnoughData,
            seek_latency: Duration::ZERO,
            pending_seek: None,
            queued_seeked: 0,
            calls: Vec::new(),
            seeked: Event::new(),
        }
    }

    /// Builder-style variant of [`set_looping`](Self::set_looping).
    pub fn with_loop(mut self, looping: bool) -> Self {
        self.looping = looping;
        self
    }

    /// Builder-style variant of [`set_seek_latency`](Self::set_seek_latency).
    pub fn with_seek_latency(mut self, latency: Duration) -> Self {
        self.seek_latency = latency;
        self
    }

    /// Wraps the element in the shared handle the synchronizer consumes.
    pub fn into_shared(self) -> Rc<RefCell<SimulatedMedia>> {
        Rc::new(RefCell::new(self))
    }

    pub fn set_looping(&mut self, looping: bool) {
        self.looping = looping;
    }

    pub fn set_duration(&mut self, duration: Option<f64>) {
        self.duration = duration;
    }

    pub fn set_ready_state(&mut self, ready_state: ReadyState) {
        self.ready_state = ready_state;
    }

    pub fn set_seek_latency(&mut self, latency: Duration) {
        self.seek_latency = latency;
    }

    pub fn playback_rate(&self) -> f64 {
        self.playback_rate
    }

    /// Returns `true` while a requested seek has not completed.
    pub fn is_seeking(&self) -> bool {
        self.pending_seek.is_some()
    }

    /// Every play, pause and seek request received so far.
    pub fn calls(&self) -> &[MediaCall] {
        &self.calls
    }

    /// Positions requested through seeks, in order.
    pub fn seek_requests(&self) -> Vec<f64> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                MediaCall::Seek(target) => Some(*target),
                _ => None,
            })
            .collect()
    }

    /// Completes any pending seek immediately and queues its `seeked`
    /// notification.
    pub fn complete_seek(&mut self) {
        if self.pending_seek.take().is_some() {
            debug!(position = self.current_time, "simulated seek completed");
            self.queued_seeked += 1;
        }
    }

    /// Delivers queued `seeked` notifications.
    ///
    /// No borrow of `media` is held while listeners run.
    pub fn dispatch_events(media: &RefCell<Self>) {
        let (seeked, queued) = {
            let mut media = media.borrow_mut();
            (media.seeked.clone(), std::mem::take(&mut media.queued_seeked))
        };
        for _ in 0..queued {
            seeked.emit(&());
        }
    }

    /// Lets `elapsed` real time pass.
    ///
    /// A pending seek consumes the time first; otherwise the position moves
    /// at the playback rate. Non-looping playback pauses at either end.
    pub fn advance(&mut self, elapsed: Duration) {
        if let Some(remaining) = self.pending_seek {
            match remaining.checked_sub(elapsed) {
                Some(left) if !left.is_zero() => self.pending_seek = Some(left),
                _ => self.complete_seek(),
            }
            return;
        }
        if self.paused {
            return;
        }

        let next = self.current_time + elapsed.as_secs_f64() * self.playback_rate;
        let length = self.duration;
        self.current_time = match length {
            Some(duration) if self.looping && duration > 0.0 => next.rem_euclid(duration),
            Some(duration) if next >= duration => {
                self.paused = true;
                duration
            }
            _ if next <= 0.0 => {
                self.paused = true;
                0.0
            }
            _ => next,
        };
    }

    fn clamp_to_seekable(&self, seconds: f64) -> f64 {
        let upper = self.duration.unwrap_or(f64::INFINITY);
        seconds.max(0.0).min(upper)
    }
}

impl MediaSink for SimulatedMedia {
    fn play(&mut self) {
        self.calls.push(MediaCall::Play);
        self.paused = false;
    }

    fn pause(&mut self) {
        self.calls.push(MediaCall::Pause);
        self.paused = true;
    }

    fn current_time(&self) -> f64 {
        self.current_time
    }

    fn set_current_time(&mut self, seconds: f64) {
        self.calls.push(MediaCall::Seek(seconds));
        self.current_time = self.clamp_to_seekable(seconds);
        self.pending_seek = Some(self.seek_latency);
    }

    fn duration(&self) -> Option<f64> {
        self.duration
    }

    fn is_looping(&self) -> bool {
        self.looping
    }

    fn is_paused(&self) -> bool {
        self.paused
    }

    fn set_playback_rate(&mut self, rate: f64) {
        self.playback_rate = rate;
    }

    fn ready_state(&self) -> ReadyState {
        self.ready_state
    }

    fn subscribe_seeked(&self, listener: Box<dyn Fn(&())>) -> Subscription {
        self.seeked.subscribe(listener)
    }
}
