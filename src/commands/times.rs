//! Implementation of the `times` command.
//!
//! Prints the eight phase boundaries of one night in site-local time, either
//! as the usual structured log or, with `--json`, as a JSON document on
//! stdout.

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};

use crate::astro::boundaries::local_noon;
use crate::astro::display::{NightReport, log_boundaries};
use crate::astro::{EphemerisProvider, ObserverSite, PhaseBoundarySet, SolarEphemeris, compute_boundaries};
use crate::config::Config;
use crate::logger::Log;
use crate::phase::{classify, next_transition};

/// The night to report: the one starting at local noon of `date`, or the
/// night containing `now`.
pub fn night_for<E>(
    ephemeris: &E,
    site: &ObserverSite,
    date: Option<NaiveDate>,
    now: DateTime<Utc>,
) -> Result<PhaseBoundarySet>
where
    E: EphemerisProvider + ?Sized,
{
    let reference = match date {
        Some(date) => local_noon(site, date)?,
        None => now,
    };
    Ok(compute_boundaries(ephemeris, site, reference)?)
}

/// Run `nightlapse times`.
pub fn run_times_command(date: Option<NaiveDate>, json: bool, debug_enabled: bool) -> Result<()> {
    if json {
        // Keep stdout pure JSON
        Log::set_enabled(false);
    } else {
        log_version!();
    }

    let config = Config::load()?;
    let site = config.observer_site()?;
    let now = Utc::now();
    let boundaries = night_for(&SolarEphemeris, &site, date, now)
        .with_context(|| format!("Failed to compute phase boundaries for {}", site.name))?;

    if json {
        let report = NightReport::new(&SolarEphemeris, &site, &boundaries);
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    log_boundaries(&SolarEphemeris, &site, &boundaries);

    if date.is_none() {
        let phase = classify(now, &boundaries);
        log_block_start!("It is {} now", phase);
        if let Some((next, at)) = next_transition(now, &boundaries) {
            log_indented!("{} begins at {}", next, site.local_time(at).format("%H:%M:%S %Z"));
        }
    }
    if debug_enabled {
        log_pipe!();
        log_debug!("Anchor (UTC): {}", boundaries.anchor());
    }
    log_end!();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FixedEphemeris;
    use chrono::TimeZone;

    #[test]
    fn test_date_selects_the_night_starting_that_afternoon() {
        let site = ObserverSite::maunakea();
        let anchor = Utc.with_ymd_and_hms(2013, 8, 23, 22, 0, 0).unwrap();
        let ephemeris = FixedEphemeris::evenly_spaced(anchor);
        let far_away = anchor + chrono::Duration::days(40);

        let night = night_for(&ephemeris, &site, NaiveDate::from_ymd_opt(2013, 8, 23), far_away).unwrap();
        assert_eq!(night.anchor(), anchor);
        assert_eq!(night, ephemeris.boundaries());
    }

    #[test]
    fn test_without_date_the_current_night_is_used() {
        let site = ObserverSite::maunakea();
        let anchor = Utc.with_ymd_and_hms(2013, 8, 23, 22, 0, 0).unwrap();
        let ephemeris = FixedEphemeris::evenly_spaced(anchor);

        // 03:00 HST on the 24th still belongs to the night of the 23rd
        let now = Utc.with_ymd_and_hms(2013, 8, 24, 13, 0, 0).unwrap();
        let night = night_for(&ephemeris, &site, None, now).unwrap();
        assert_eq!(night.anchor(), anchor);
    }

    #[test]
    fn test_real_night_report_serializes() {
        let site = ObserverSite::maunakea();
        let night = night_for(&SolarEphemeris, &site, NaiveDate::from_ymd_opt(2013, 8, 23), Utc::now()).unwrap();
        let json = serde_json::to_value(NightReport::new(&SolarEphemeris, &site, &night)).unwrap();
        assert_eq!(json["boundaries"].as_array().unwrap().len(), 8);
        assert!(json["boundaries"][0]["local"].as_str().unwrap().starts_with("2013/08/23 "));
    }
}
