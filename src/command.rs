//! Typed commands that script a synchronization scenario.

use std::fmt;
use std::time::Duration;

use crate::media::ReadyState;

/// An action applied to the simulated clock or media element.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScenarioCommand {
    /// Start animating the clock.
    Play,
    /// Stop animating the clock.
    Pause,
    /// Change the clock multiplier.
    Rate(f64),
    /// Jump the clock to this many seconds past the epoch.
    Scrub(f64),
    /// Change how much data the media element reports as loaded.
    Ready(ReadyState),
    /// Detach the media element from the synchronizer.
    Detach,
    /// Re-attach the media element to the synchronizer.
    Attach,
    /// Change the real time represented by one tick.
    Interval(Duration),
    /// Change the clip length; `None` makes it unknown.
    Length(Option<f64>),
    /// Turn looping of the clip on or off.
    Loop(bool),
    /// Change how long the media element takes to complete a seek.
    Latency(Duration),
}

impl ScenarioCommand {
    /// The keyword naming this command in scripts.
    pub fn keyword(&self) -> &'static str {
        match self {
            Self::Play => "play",
            Self::Pause => "pause",
            Self::Rate(_) => "rate",
            Self::Scrub(_) => "scrub",
            Self::Ready(_) => "ready",
            Self::Detach => "detach",
            Self::Attach => "attach",
            Self::Interval(_) => "interval",
            Self::Length(_) => "duration",
            Self::Loop(_) => "loop",
            Self::Latency(_) => "latency",
        }
    }
}

impl fmt::Display for ScenarioCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rate(value) | Self::Scrub(value) => write!(f, "{} {value}", self.keyword()),
            Self::Ready(state) => write!(f, "{} {}", self.keyword(), state.level()),
            Self::Interval(period) | Self::Latency(period) => {
                write!(f, "{} {}", self.keyword(), period.as_millis())
            }
            Self::Length(Some(seconds)) => write!(f, "{} {seconds}", self.keyword()),
            Self::Length(None) => write!(f, "{} unknown", self.keyword()),
            Self::Loop(looping) => {
                write!(f, "{} {}", self.keyword(), if *looping { "on" } else { "off" })
            }
            _ => f.write_str(self.keyword()),
        }
    }
}
