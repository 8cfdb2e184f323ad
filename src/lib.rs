//! Synchronizes media playback with a simulation clock.
//!
//! A [`Synchronizer`] listens to the ticks of a [`Clock`] and steers a
//! [`MediaSink`]: it plays or pauses the element with the clock, mirrors the
//! clock multiplier into the playback rate and seeks when the element drifts
//! from the position the clock implies. [`SimClock`], [`SimulatedMedia`] and
//! [`ScenarioDriver`] provide deterministic collaborators for tests, demos and
//! scripted scenarios.

pub mod clock;
pub mod command;
pub mod driver;
pub mod error;
pub mod event;
pub mod mapping;
pub mod media;
pub mod scheduler;
pub mod script;
pub mod synchronizer;
pub mod time;
pub mod time_source;

pub use clock::{Clock, ClockState, SimClock};
pub use command::ScenarioCommand;
pub use driver::{DriverConfig, DriverStatus, ScenarioDriver};
pub use error::SyncError;
pub use event::{Event, Subscription};
pub use mapping::desired_media_time;
pub use media::{MediaCall, MediaSink, ReadyState, SharedSink, SimulatedMedia};
pub use scheduler::{CommandScheduler, ScheduledCommand};
pub use script::{
    ScriptLine, ScriptParseError, parse_command, parse_script_line, read_script, read_script_file,
};
pub use synchronizer::{SyncOptions, Synchronizer};
pub use time::{MINIMUM_TIMESTAMP, Timestamp};
pub use time_source::{ManualTimeSource, MonotonicTimeSource, TimeSource};
