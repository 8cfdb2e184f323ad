//! Example binary entry point.
//!
//! This binary runs a short scripted scenario: the clock plays, speeds up,
//! reverses, gets scrubbed and pauses while the synchronizer keeps a
//! simulated 30 second clip in step. Finally the clip starts looping and the
//! clock is scrubbed past its end. Set `RUST_LOG=videosync=debug` to see
//! each play, pause and seek decision.

use std::io::Cursor;

use anyhow::Result;
use tracing_subscriber::EnvFilter;
use videosync::{DriverConfig, ScenarioDriver, read_script};

const DEMO_SCRIPT: &str = "\
# tick:command
0:play
40:rate 4
60:rate -1
90:scrub 20
120:pause
130:scrub 5.5
135:loop on
136:scrub 45
";

/// Ticks run after the script has drained.
const SETTLE_TICKS: u64 = 20;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut config = DriverConfig::new("2015-11-01T00:00:00Z".parse()?);
    config.seek_latency = std::time::Duration::from_millis(100);

    let mut driver = ScenarioDriver::new(config);
    driver.load(read_script(Cursor::new(DEMO_SCRIPT))?);

    let mut idle = 0;
    while idle < SETTLE_TICKS {
        if !driver.has_pending() {
            idle += 1;
        }
        let status = driver.tick()?;
        if status.tick % 10 == 0 {
            println!("{status}");
        }
    }

    let seeks = driver.media().borrow().seek_requests().len();
    println!("[done] {} ticks, {seeks} seek(s) issued", driver.ticks());
    driver.shutdown()?;
    Ok(())
}
