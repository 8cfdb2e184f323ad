//! Deterministic scenario execution for the synchronizer.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::clock::SimClock;
use crate::command::ScenarioCommand;
use crate::error::SyncError;
use crate::media::{MediaSink, SimulatedMedia};
use crate::scheduler::{CommandScheduler, ScheduledCommand};
use crate::script::{ScriptParseError, parse_script_line};
use crate::synchronizer::{SyncOptions, Synchronizer};
use crate::time::{Timestamp, offset_by_seconds, seconds_between};
use crate::time_source::ManualTimeSource;

/// Settings for a [`ScenarioDriver`].
#[derive(Debug, Clone, PartialEq)]
pub struct DriverConfig {
    /// Clock instant mapped to media position zero; the clock starts here.
    pub epoch: Timestamp,
    /// Real time that elapses per tick.
    pub tick_interval: Duration,
    /// Initial clock multiplier.
    pub multiplier: f64,
    /// Media length in seconds, `None` if unknown.
    pub duration: Option<f64>,
    pub looping: bool,
    /// Time the simulated media takes to complete a seek.
    pub seek_latency: Duration,
}

impl DriverConfig {
    /// Creates a configuration with 50 ms ticks, a 30 s non-looping clip and
    /// seeks that land on the following tick.
    pub fn new(epoch: Timestamp) -> Self {
        Self {
            epoch,
            tick_interval: Duration::from_millis(50),
            multiplier: 1.0,
            duration: Some(30.0),
            looping: false,
            seek_latency: Duration::ZERO,
        }
    }
}

/// A snapshot of the scenario after a tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DriverStatus {
    /// Number of ticks performed so far.
    pub tick: u64,
    /// Clock position in seconds past the epoch.
    pub clock_seconds: f64,
    pub should_animate: bool,
    pub multiplier: f64,
    pub media_time: f64,
    pub media_paused: bool,
    pub playback_rate: f64,
    /// Whether the synchronizer is waiting for a seek to complete.
    pub seeking: bool,
}

impl fmt::Display for DriverStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "tick {:>5} | clock {:>9.3}s x{:<5} {} | media {:>8.3}s x{:<5} {}{}",
            self.tick,
            self.clock_seconds,
            self.multiplier,
            if self.should_animate { "running" } else { "stopped" },
            self.media_time,
            self.playback_rate,
            if self.media_paused { "paused" } else { "playing" },
            if self.seeking { " (seeking)" } else { "" },
        )
    }
}

/// Runs a [`SimClock`], a [`SimulatedMedia`] and a [`Synchronizer`] in
/// lockstep, applying scheduled commands as their ticks come due.
///
/// Wall-clock time seen by the synchronizer advances by exactly one tick
/// interval per tick, so runs are reproducible.
pub struct ScenarioDriver {
    clock: Rc<SimClock>,
    media: Rc<RefCell<SimulatedMedia>>,
    time: Rc<ManualTimeSource>,
    synchronizer: Synchronizer,
    scheduler: CommandScheduler,
    epoch: Timestamp,
    ticks: u64,
}

impl ScenarioDriver {
    /// Builds the clock, media element and synchronizer described by `config`.
    pub fn new(config: DriverConfig) -> Self {
        let clock = Rc::new(SimClock::new(config.epoch, config.tick_interval));
        clock.set_multiplier(config.multiplier);

        let media = SimulatedMedia::new(config.duration)
            .with_loop(config.looping)
            .with_seek_latency(config.seek_latency)
            .into_shared();
        let time = Rc::new(ManualTimeSource::default());

        let synchronizer = Synchronizer::new(SyncOptions {
            clock: Some(clock.clone()),
            element: Some(media.clone()),
            epoch: Some(config.epoch),
            time_source: Some(time.clone()),
        });

        Self {
            clock,
            media,
            time,
            synchronizer,
            scheduler: CommandScheduler::new(),
            epoch: config.epoch,
            ticks: 0,
        }
    }

    pub fn media(&self) -> &Rc<RefCell<SimulatedMedia>> {
        &self.media
    }

    /// Number of ticks performed so far.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Queues `command` to apply before tick number `tick` runs.
    pub fn schedule(&mut self, tick: u64, command: ScenarioCommand) {
        self.scheduler.schedule(tick, command);
    }

    /// Queues every command in `commands`.
    pub fn load<I>(&mut self, commands: I)
    where
        I: IntoIterator<Item = ScheduledCommand>,
    {
        for scheduled in commands {
            self.schedule(scheduled.tick, scheduled.command);
        }
    }

    /// Parses a `tick:command` line and queues it on success.
    pub fn enqueue_from_script(&mut self, line: &str) -> Result<(), ScriptParseError> {
        let parsed = parse_script_line(line)?;
        self.schedule(parsed.tick, parsed.command);
        Ok(())
    }

    /// Returns `true` when commands remain queued.
    pub fn has_pending(&self) -> bool {
        !self.scheduler.is_empty()
    }

    /// Tick at which the next queued command applies.
    pub fn next_scheduled_tick(&self) -> Option<u64> {
        self.scheduler.next_tick()
    }

    /// Real time that elapses per tick.
    pub fn tick_interval(&self) -> Duration {
        self.clock.tick_interval()
    }

    /// Applies `command` immediately.
    pub fn apply(&mut self, command: ScenarioCommand) -> Result<(), SyncError> {
        info!(tick = self.ticks, %command, "applying command");
        match command {
            ScenarioCommand::Play => self.clock.set_should_animate(true),
            ScenarioCommand::Pause => self.clock.set_should_animate(false),
            ScenarioCommand::Rate(multiplier) => self.clock.set_multiplier(multiplier),
            ScenarioCommand::Scrub(seconds) => match offset_by_seconds(self.epoch, seconds) {
                Some(target) => self.clock.set_current_time(target),
                None => warn!(seconds, "scrub target out of range, ignoring"),
            },
            ScenarioCommand::Ready(state) => self.media.borrow_mut().set_ready_state(state),
            ScenarioCommand::Detach => self.synchronizer.set_element(None)?,
            ScenarioCommand::Attach => self.synchronizer.set_element(Some(self.media.clone()))?,
            ScenarioCommand::Interval(period) => self.clock.set_tick_interval(period),
            ScenarioCommand::Length(duration) => self.media.borrow_mut().set_duration(duration),
            ScenarioCommand::Loop(looping) => self.media.borrow_mut().set_looping(looping),
            ScenarioCommand::Latency(latency) => {
                self.media.borrow_mut().set_seek_latency(latency)
            }
        }
        Ok(())
    }

    /// Applies due commands, lets one tick interval pass and ticks the clock.
    pub fn tick(&mut self) -> Result<DriverStatus, SyncError> {
        for scheduled in self.scheduler.drain_ready(self.ticks) {
            self.apply(scheduled.command)?;
        }

        let interval = self.clock.tick_interval();
        self.media.borrow_mut().advance(interval);
        SimulatedMedia::dispatch_events(&self.media);
        self.time.advance(interval);
        self.clock.tick();
        self.ticks += 1;

        let status = self.status();
        debug!(%status, "scenario tick");
        Ok(status)
    }

    /// Runs `ticks` consecutive ticks.
    pub fn run_for_ticks(&mut self, ticks: u64) -> Result<(), SyncError> {
        for _ in 0..ticks {
            self.tick()?;
        }
        Ok(())
    }

    /// Describes the current clock, media and synchronizer state.
    pub fn status(&self) -> DriverStatus {
        let clock = self.clock.state();
        let media = self.media.borrow();
        DriverStatus {
            tick: self.ticks,
            clock_seconds: seconds_between(clock.current_time, self.epoch),
            should_animate: clock.should_animate,
            multiplier: clock.multiplier,
            media_time: media.current_time(),
            media_paused: media.is_paused(),
            playback_rate: media.playback_rate(),
            seeking: self.synchronizer.is_seeking(),
        }
    }

    /// Tears down the synchronizer; later attach/detach commands fail.
    pub fn shutdown(&mut self) -> Result<(), SyncError> {
        self.synchronizer.destroy()
    }
}

impl fmt::Debug for ScenarioDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScenarioDriver")
            .field("ticks", &self.ticks)
            .field("pending", &self.scheduler.len())
            .field("synchronizer", &self.synchronizer)
            .finish()
    }
}
