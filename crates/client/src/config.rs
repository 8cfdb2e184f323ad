//! Client configuration: an optional JSON file overridden by command-line flags.

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use chrono::{DateTime, TimeDelta, Utc};
use serde::Deserialize;
use videosync::{DriverConfig, Timestamp};

/// 2015-11-01T00:00:00Z, the default epoch.
const DEFAULT_EPOCH_SECONDS: i64 = 1_446_336_000;

/// Settings for a client session.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClientConfig {
    /// Milliseconds between ticks.
    pub interval_ms: u64,
    pub multiplier: f64,
    pub epoch: DateTime<Utc>,
    /// Clip length in seconds; `null` leaves it unknown.
    pub duration: Option<f64>,
    #[serde(rename = "loop")]
    pub looping: bool,
    pub seek_latency_ms: u64,
    /// Script lines in `tick:command` form, queued at startup.
    pub script: Vec<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            interval_ms: 50,
            multiplier: 1.0,
            epoch: default_epoch(),
            duration: Some(30.0),
            looping: false,
            seek_latency_ms: 80,
            script: Vec::new(),
        }
    }
}

/// Values supplied on the command line; `None` keeps the configured value.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub interval_ms: Option<u64>,
    pub multiplier: Option<f64>,
    pub epoch: Option<DateTime<Utc>>,
    pub duration: Option<f64>,
    pub looping: bool,
    pub seek_latency_ms: Option<u64>,
}

impl ClientConfig {
    /// Reads a JSON configuration file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse config {}", path.display()))
    }

    /// Applies command-line overrides and validates the result.
    pub fn with_overrides(mut self, overrides: &Overrides) -> Result<Self> {
        if let Some(interval_ms) = overrides.interval_ms {
            self.interval_ms = interval_ms;
        }
        if let Some(multiplier) = overrides.multiplier {
            self.multiplier = multiplier;
        }
        if let Some(epoch) = overrides.epoch {
            self.epoch = epoch;
        }
        if let Some(duration) = overrides.duration {
            self.duration = Some(duration);
        }
        if overrides.looping {
            self.looping = true;
        }
        if let Some(seek_latency_ms) = overrides.seek_latency_ms {
            self.seek_latency_ms = seek_latency_ms;
        }
        self.validate()?;
        Ok(self)
    }

    fn validate(&self) -> Result<()> {
        if self.interval_ms == 0 {
            bail!("tick interval must be greater than zero");
        }
        if !self.multiplier.is_finite() {
            bail!("multiplier must be a finite number");
        }
        if let Some(duration) = self.duration {
            if !duration.is_finite() || duration < 0.0 {
                bail!("duration must be a non-negative number of seconds");
            }
        }
        Ok(())
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// Builds the scenario settings for this session.
    pub fn driver_config(&self) -> DriverConfig {
        DriverConfig {
            epoch: self.epoch,
            tick_interval: self.interval(),
            multiplier: self.multiplier,
            duration: self.duration,
            looping: self.looping,
            seek_latency: Duration::from_millis(self.seek_latency_ms),
        }
    }
}

fn default_epoch() -> Timestamp {
    DateTime::UNIX_EPOCH + TimeDelta::seconds(DEFAULT_EPOCH_SECONDS)
}
