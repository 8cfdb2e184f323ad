//! Interactive client for watching the synchronizer over an asynchronous REPL.
//!
//! The client ticks a simulated clock in real time and lets the user play,
//! pause, re-rate and scrub it while a simulated media element is kept in
//! step. Ticking can be started and stopped, single-stepped, or driven by a
//! script of `tick:command` lines.

mod config;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, Utc};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::{self, MissedTickBehavior};
use tracing::warn;
use tracing_subscriber::EnvFilter;
use videosync::{ScenarioCommand, ScenarioDriver, parse_command, read_script_file};

use crate::config::{ClientConfig, Overrides};

#[derive(Debug, Parser)]
#[command(author, version, about = "Interactive video synchronization client")]
struct Args {
    /// Milliseconds between ticks
    #[arg(short = 'i', long)]
    interval_ms: Option<u64>,

    /// Initial clock multiplier; negative values run backwards
    #[arg(short = 'm', long, allow_negative_numbers = true)]
    multiplier: Option<f64>,

    /// Clock instant mapped to media position zero (RFC 3339)
    #[arg(long)]
    epoch: Option<DateTime<Utc>>,

    /// Clip length in seconds
    #[arg(short = 'd', long)]
    duration: Option<f64>,

    /// Loop the clip
    #[arg(long = "loop")]
    looping: bool,

    /// Milliseconds the simulated media takes to complete a seek
    #[arg(long)]
    seek_latency_ms: Option<u64>,

    /// Script file of `tick:command` lines to queue at startup
    #[arg(short = 's', long)]
    script: Option<PathBuf>,

    /// JSON configuration file; flags override its values
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,
}

impl Args {
    fn overrides(&self) -> Overrides {
        Overrides {
            interval_ms: self.interval_ms,
            multiplier: self.multiplier,
            epoch: self.epoch,
            duration: self.duration,
            looping: self.looping,
            seek_latency_ms: self.seek_latency_ms,
        }
    }
}

#[derive(Debug, PartialEq)]
enum ReplCommand {
    Start,
    Stop,
    Tick,
    RunTicks(u64),
    Schedule(String),
    Apply(ScenarioCommand),
    Status,
    Help,
    Quit,
}

fn parse_repl_command(line: &str) -> Result<ReplCommand, String> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Err("empty input".to_string());
    }

    let (command, rest) = trimmed.split_once(' ').unwrap_or((trimmed, ""));

    match command.to_lowercase().as_str() {
        "start" => Ok(ReplCommand::Start),
        "stop" => Ok(ReplCommand::Stop),
        "tick" => Ok(ReplCommand::Tick),
        "status" | "now" => Ok(ReplCommand::Status),
        "help" => Ok(ReplCommand::Help),
        "quit" | "exit" => Ok(ReplCommand::Quit),
        "run" => {
            let ticks = rest
                .trim()
                .parse::<u64>()
                .map_err(|_| "usage: run <number of ticks>".to_string())?;
            Ok(ReplCommand::RunTicks(ticks))
        }
        "at" => {
            if rest.trim().is_empty() {
                return Err("usage: at <tick:command>".to_string());
            }
            Ok(ReplCommand::Schedule(rest.trim().to_string()))
        }
        _ => parse_command(trimmed)
            .map(ReplCommand::Apply)
            .map_err(|err| err.to_string()),
    }
}

fn print_help() {
    println!(
        r#"available commands:
  start                 - begin ticking on the configured interval
  stop                  - stop ticking
  tick                  - perform a single tick
  run <ticks>           - perform a fixed number of ticks immediately
  status | now          - print clock, media and synchronizer state
  help                  - show this message
  quit | exit           - terminate the client

clock and media controls (applied immediately):
  play | pause          - start or stop the simulation clock
  rate <x>              - set the clock multiplier (negative runs backwards)
  scrub <seconds>       - jump the clock to seconds past the epoch
  ready <0-4>           - set how much data the media reports as loaded
  detach | attach       - remove or restore the media element
  interval <ms>         - change the real time covered by one tick
  duration <s|unknown>  - change the clip length
  loop on|off           - turn clip looping on or off
  latency <ms>          - change how long the media takes to seek

scripting:
  at <tick:command>     - schedule a control for a future tick, e.g. 'at 200:rate 2'"#
    );
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = match &args.config {
        Some(path) => ClientConfig::from_file(path)?,
        None => ClientConfig::default(),
    }
    .with_overrides(&args.overrides())?;

    let mut driver = ScenarioDriver::new(config.driver_config());
    if let Some(path) = &args.script {
        driver.load(read_script_file(path)?);
    }
    for line in &config.script {
        driver.enqueue_from_script(line)?;
    }

    run_repl(driver, &config).await
}

fn ticker_for(period: Duration) -> time::Interval {
    let mut ticker = time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}

/// Number of ticks between status lines, roughly one per second.
fn ticks_per_report(period: Duration) -> u64 {
    let millis = u64::try_from(period.as_millis()).unwrap_or(u64::MAX).max(1);
    (1_000 / millis).max(1)
}

fn print_status(driver: &ScenarioDriver) {
    println!("{}", driver.status());
    if let Some(tick) = driver.next_scheduled_tick() {
        println!("next scheduled command at tick {tick}");
    }
}

async fn run_repl(mut driver: ScenarioDriver, config: &ClientConfig) -> Result<()> {
    let mut ticker = ticker_for(config.interval());
    let mut report_every = ticks_per_report(config.interval());
    let mut ticking = false;

    println!("Interactive synchronization client ready. Type 'help' for commands.");
    print_status(&driver);

    let stdin = BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if !ticking {
                    continue;
                }
                match driver.tick() {
                    Ok(status) if status.tick % report_every == 0 => println!("{status}"),
                    Ok(_) => {}
                    Err(err) => {
                        warn!(%err, "tick failed; stopping");
                        ticking = false;
                    }
                }
            }
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                let parsed = match parse_repl_command(&line) {
                    Ok(cmd) => cmd,
                    Err(err) => {
                        eprintln!("{err}");
                        continue;
                    }
                };

                match parsed {
                    ReplCommand::Start => {
                        ticking = true;
                        println!("ticking started (interval: {:?})", driver.tick_interval());
                    }
                    ReplCommand::Stop => {
                        ticking = false;
                        println!("ticking stopped");
                    }
                    ReplCommand::Tick => match driver.tick() {
                        Ok(status) => println!("{status}"),
                        Err(err) => eprintln!("tick failed: {err}"),
                    },
                    ReplCommand::RunTicks(ticks) => match driver.run_for_ticks(ticks) {
                        Ok(()) => println!("{}", driver.status()),
                        Err(err) => eprintln!("run failed: {err}"),
                    },
                    ReplCommand::Schedule(line) => match driver.enqueue_from_script(&line) {
                        Ok(()) => println!("scheduled: {line}"),
                        Err(err) => eprintln!("failed to parse '{line}': {err}"),
                    },
                    ReplCommand::Apply(command) => match driver.apply(command) {
                        Ok(()) => {
                            if let ScenarioCommand::Interval(period) = command {
                                ticker = ticker_for(period);
                                report_every = ticks_per_report(period);
                            }
                            println!("applied: {command}");
                        }
                        Err(err) => eprintln!("failed to apply '{command}': {err}"),
                    },
                    ReplCommand::Status => print_status(&driver),
                    ReplCommand::Help => print_help(),
                    ReplCommand::Quit => break,
                }
            }
        }
    }

    let seeks = driver.media().borrow().seek_requests().len();
    println!("exiting after {} tick(s), {seeks} seek(s) issued", driver.ticks());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_builtin_commands() {
        assert_eq!(parse_repl_command(" START "), Ok(ReplCommand::Start));
        assert_eq!(parse_repl_command("run 25"), Ok(ReplCommand::RunTicks(25)));
        assert_eq!(
            parse_repl_command("at 40:scrub 3"),
            Ok(ReplCommand::Schedule("40:scrub 3".to_string()))
        );
        assert!(parse_repl_command("run many").is_err());
        assert!(parse_repl_command("").is_err());
    }

    #[test]
    fn falls_back_to_scenario_commands() {
        assert_eq!(
            parse_repl_command("rate -4"),
            Ok(ReplCommand::Apply(ScenarioCommand::Rate(-4.0)))
        );
        assert_eq!(
            parse_repl_command("pause"),
            Ok(ReplCommand::Apply(ScenarioCommand::Pause))
        );
        let err = parse_repl_command("rewind").unwrap_err();
        assert_eq!(err, "unknown command: rewind");
    }

    #[test]
    fn settings_reach_the_driver() {
        assert_eq!(
            parse_repl_command("interval 250"),
            Ok(ReplCommand::Apply(ScenarioCommand::Interval(
                Duration::from_millis(250)
            )))
        );
        assert_eq!(
            parse_repl_command("loop on"),
            Ok(ReplCommand::Apply(ScenarioCommand::Loop(true)))
        );
        assert_eq!(ticks_per_report(Duration::from_millis(250)), 4);
        assert_eq!(ticks_per_report(Duration::from_secs(5)), 1);
    }

    #[test]
    fn command_line_flags_become_overrides() {
        let args = Args::parse_from(["videosync-client", "-m", "-2", "--loop", "-i", "20"]);
        let overrides = args.overrides();
        assert_eq!(overrides.multiplier, Some(-2.0));
        assert_eq!(overrides.interval_ms, Some(20));
        assert!(overrides.looping);
        assert!(overrides.epoch.is_none());
    }
}
