//! Implementation of the `simulate` command.
//!
//! Runs the full session loop on a simulated clock against a dry-run camera,
//! so a whole night of phase changes and settings can be checked in seconds.

use anyhow::Result;
use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::clock::{Clock, SimulatedClock, parse_datetime_in_tz};
use crate::config::Config;
use crate::logger::Log;
use crate::nightlapse::Nightlapse;
use crate::session::SessionSummary;

/// Parse the simulation window, given as site-local times.
pub fn parse_window(
    start_time: &str,
    end_time: &str,
    timezone: chrono_tz::Tz,
) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
    let start = parse_datetime_in_tz(start_time, timezone)
        .map_err(|e| anyhow::anyhow!("Invalid start time: {e}"))?;
    let end = parse_datetime_in_tz(end_time, timezone)
        .map_err(|e| anyhow::anyhow!("Invalid end time: {e}"))?;
    if end <= start {
        anyhow::bail!("End time must be after start time");
    }
    Ok((start, end))
}

/// Run `nightlapse simulate`.
///
/// `multiplier` of zero or less fast-forwards: simulated time only advances
/// through sleeps and dry-run exposures.
pub fn handle_simulate_command(
    start_time: String,
    end_time: String,
    multiplier: f64,
    debug_enabled: bool,
) -> Result<SessionSummary> {
    let config = Config::load()?;
    let timezone = config.timezone()?;
    let (start, end) = parse_window(&start_time, &end_time, timezone)?;

    let clock = Arc::new(SimulatedClock::new(start, end, multiplier));

    // Timestamps follow the simulated clock from the first line on
    Log::set_clock(clock.clone(), timezone);

    log_version!();
    log_block_start!("Simulation Mode");
    log_decorated!(
        "Simulating from {} to {}",
        start.with_timezone(&timezone).format("%Y-%m-%d %H:%M:%S %Z"),
        end.with_timezone(&timezone).format("%Y-%m-%d %H:%M:%S %Z")
    );
    let duration = end - start;
    log_indented!(
        "Total simulated time: {} hours {} minutes",
        duration.num_hours(),
        duration.num_minutes() % 60
    );
    if clock.is_fast_forward() {
        log_indented!("Time acceleration: fast-forward (instant execution)");
    } else {
        log_indented!(
            "Time acceleration: {}x (will complete in ~{:.1} seconds)",
            multiplier as u64,
            duration.num_seconds() as f64 / multiplier
        );
    }
    log_indented!("Camera: dry run, no commands are sent");

    let clock: Arc<dyn Clock> = clock;
    Nightlapse::new(debug_enabled)
        .without_lock()
        .without_headers()
        .with_simulated_clock(clock)
        .run_with_config(config)
}
