//! Parsing of scenario scripts.
//!
//! A script is a sequence of `tick:command [argument]` lines, for example
//! `0:play`, `20:rate -2` or `45:scrub 12.5`.

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;
use std::time::Duration;

use crate::command::ScenarioCommand;
use crate::media::ReadyState;
use crate::scheduler::ScheduledCommand;

/// A command parsed from a single script line.
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptLine {
    /// Tick index at which the command applies.
    pub tick: u64,
    pub command: ScenarioCommand,
}

/// Errors that can occur while parsing or reading a script.
#[derive(Debug, thiserror::Error)]
pub enum ScriptParseError {
    /// Tick portion was not an unsigned integer.
    #[error("invalid tick: {0}")]
    InvalidTick(String),
    /// Input was missing the expected separator.
    #[error("missing separator ':' in instruction")]
    MissingSeparator,
    /// Command keyword was not recognised.
    #[error("unknown command: {0}")]
    UnknownCommand(String),
    /// Command requires an argument that was absent.
    #[error("command '{0}' requires an argument")]
    MissingArgument(&'static str),
    /// Command argument could not be parsed.
    #[error("invalid argument for '{command}': {value}")]
    InvalidArgument {
        command: &'static str,
        value: String,
    },
    /// Error reported with the 1-based line number it occurred on.
    #[error("line {line}: {source}")]
    AtLine {
        line: usize,
        #[source]
        source: Box<ScriptParseError>,
    },
    /// I/O error encountered while reading the script.
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Parses a single script line into a [`ScriptLine`].
///
/// Whitespace around the tick, keyword and argument is ignored and keywords
/// are case-insensitive.
pub fn parse_script_line(line: &str) -> Result<ScriptLine, ScriptParseError> {
    let (tick_part, command_part) = line
        .split_once(':')
        .ok_or(ScriptParseError::MissingSeparator)?;
    let tick_part = tick_part.trim();
    let tick = tick_part
        .parse::<u64>()
        .map_err(|_| ScriptParseError::InvalidTick(tick_part.to_string()))?;

    Ok(ScriptLine {
        tick,
        command: parse_command(command_part)?,
    })
}

/// Parses the command portion of a script line, e.g. `rate 4`.
pub fn parse_command(text: &str) -> Result<ScenarioCommand, ScriptParseError> {
    let text = text.trim();
    let (keyword, argument) = match text.split_once(char::is_whitespace) {
        Some((keyword, rest)) => (keyword, Some(rest.trim())),
        None => (text, None),
    };

    match keyword.to_ascii_lowercase().as_str() {
        "play" => Ok(ScenarioCommand::Play),
        "pause" => Ok(ScenarioCommand::Pause),
        "detach" => Ok(ScenarioCommand::Detach),
        "attach" => Ok(ScenarioCommand::Attach),
        "rate" => parse_seconds("rate", argument).map(ScenarioCommand::Rate),
        "scrub" => parse_seconds("scrub", argument).map(ScenarioCommand::Scrub),
        "ready" => {
            let value = argument.ok_or(ScriptParseError::MissingArgument("ready"))?;
            value
                .parse::<u8>()
                .ok()
                .and_then(ReadyState::from_level)
                .map(ScenarioCommand::Ready)
                .ok_or_else(|| ScriptParseError::InvalidArgument {
                    command: "ready",
                    value: value.to_string(),
                })
        }
        "interval" => match parse_millis("interval", argument)? {
            period if period.is_zero() => Err(ScriptParseError::InvalidArgument {
                command: "interval",
                value: "0".to_string(),
            }),
            period => Ok(ScenarioCommand::Interval(period)),
        },
        "latency" => parse_millis("latency", argument).map(ScenarioCommand::Latency),
        "duration" => {
            let value = argument.ok_or(ScriptParseError::MissingArgument("duration"))?;
            if value.eq_ignore_ascii_case("unknown") {
                return Ok(ScenarioCommand::Length(None));
            }
            let seconds = parse_seconds("duration", Some(value))?;
            if seconds < 0.0 {
                return Err(ScriptParseError::InvalidArgument {
                    command: "duration",
                    value: value.to_string(),
                });
            }
            Ok(ScenarioCommand::Length(Some(seconds)))
        }
        "loop" => {
            let value = argument.ok_or(ScriptParseError::MissingArgument("loop"))?;
            match value.to_ascii_lowercase().as_str() {
                "on" | "true" => Ok(ScenarioCommand::Loop(true)),
                "off" | "false" => Ok(ScenarioCommand::Loop(false)),
                _ => Err(ScriptParseError::InvalidArgument {
                    command: "loop",
                    value: value.to_string(),
                }),
            }
        }
        _ => Err(ScriptParseError::UnknownCommand(keyword.to_string())),
    }
}

fn parse_millis(command: &'static str, argument: Option<&str>) -> Result<Duration, ScriptParseError> {
    let value = argument.ok_or(ScriptParseError::MissingArgument(command))?;
    value
        .parse::<u64>()
        .map(Duration::from_millis)
        .map_err(|_| ScriptParseError::InvalidArgument {
            command,
            value: value.to_string(),
        })
}

fn parse_seconds(command: &'static str, argument: Option<&str>) -> Result<f64, ScriptParseError> {
    let value = argument.ok_or(ScriptParseError::MissingArgument(command))?;
    value
        .parse::<f64>()
        .ok()
        .filter(|parsed| parsed.is_finite())
        .ok_or_else(|| ScriptParseError::InvalidArgument {
            command,
            value: value.to_string(),
        })
}

/// Reads every command from a script source.
///
/// Blank lines and lines starting with `#` are skipped. Reading stops at the
/// first malformed line so a scenario never runs with a partial script.
pub fn read_script<R: BufRead>(reader: R) -> Result<Vec<ScheduledCommand>, ScriptParseError> {
    let mut commands = Vec::new();

    for (index, line) in reader.lines().enumerate() {
        let raw_line = line?;
        let trimmed = raw_line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let parsed = parse_script_line(trimmed).map_err(|err| ScriptParseError::AtLine {
            line: index + 1,
            source: Box::new(err),
        })?;
        commands.push(ScheduledCommand {
            tick: parsed.tick,
            command: parsed.command,
        });
    }

    Ok(commands)
}

/// Reads a script from the file at `path`.
pub fn read_script_file<P: AsRef<Path>>(path: P) -> Result<Vec<ScheduledCommand>, ScriptParseError> {
    let file = File::open(path)?;
    read_script(BufReader::new(file))
}
