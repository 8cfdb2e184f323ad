//! Mapping from simulation time to media position.

use std::time::Duration;

use crate::time::{Timestamp, seconds_between};

/// Allowed drift, in seconds, while the clock is animating.
pub const PLAYING_TOLERANCE: f64 = 0.15;

/// Allowed drift, in seconds, while the clock is paused.
pub const PAUSED_TOLERANCE: f64 = 0.001;

/// Minimum wall-clock spacing between two programmatic seeks.
pub const SEEK_INTERVAL: Duration = Duration::from_millis(100);

/// Returns the drift tolerance for the given run state.
pub fn tolerance(should_animate: bool) -> f64 {
    if should_animate {
        PLAYING_TOLERANCE
    } else {
        PAUSED_TOLERANCE
    }
}

/// Computes the media position, in seconds, that corresponds to `clock_time`.
///
/// The epoch maps to position zero. Looping media wraps the offset by the
/// duration; a negative remainder `r` becomes `duration - r`. Non-looping
/// media clamps into `[0, duration]`.
///
/// Returns `None` when looping media has no usable duration, since no
/// position can be derived.
pub fn desired_media_time(
    clock_time: Timestamp,
    epoch: Timestamp,
    duration: Option<f64>,
    looping: bool,
) -> Option<f64> {
    let video_time = seconds_between(clock_time, epoch);

    if looping {
        let duration = duration.filter(|d| *d > 0.0)?;
        let mut wrapped = video_time % duration;
        if wrapped < 0.0 {
            // Reflects rather than wraps: -1 becomes duration + 1.
            wrapped = duration - wrapped;
        }
        return Some(wrapped);
    }

    match duration {
        Some(duration) if video_time > duration => Some(duration),
        _ if video_time < 0.0 => Some(0.0),
        _ => Some(video_time),
    }
}
