//! Boundary table output in site-local time.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{EphemerisProvider, ObserverSite, PhaseBoundarySet};

const LOCAL_FORMAT: &str = "%Y/%m/%d %H:%M:%S %Z";

fn title(name: &str) -> String {
    let spaced = name.replace('_', " ");
    let mut chars = spaced.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Log the night's boundaries, one per line, in site-local time.
pub fn log_boundaries<E>(ephemeris: &E, site: &ObserverSite, boundaries: &PhaseBoundarySet)
where
    E: EphemerisProvider + ?Sized,
{
    let anchor = site.local_time(boundaries.anchor());
    log_block_start!("Night of {} at {}", anchor.format("%Y-%m-%d"), site.name);
    log_indented!(
        "Sun altitude at local noon: {:.1}°",
        ephemeris.altitude(site, boundaries.anchor())
    );
    for (name, instant) in boundaries.labeled() {
        log_indented!(
            "{:<22}{}",
            format!("{}:", title(name)),
            site.local_time(instant).format(LOCAL_FORMAT)
        );
    }
}

/// One boundary as reported by `nightlapse times --json`.
#[derive(Debug, Serialize)]
pub struct BoundaryEntry {
    pub name: &'static str,
    pub utc: DateTime<Utc>,
    pub local: String,
}

/// A night's boundaries as reported by `nightlapse times --json`.
#[derive(Debug, Serialize)]
pub struct NightReport {
    pub site: String,
    pub timezone: String,
    pub latitude: f64,
    pub longitude: f64,
    pub anchor: DateTime<Utc>,
    pub noon_altitude: f64,
    pub boundaries: Vec<BoundaryEntry>,
}

impl NightReport {
    pub fn new<E>(ephemeris: &E, site: &ObserverSite, boundaries: &PhaseBoundarySet) -> Self
    where
        E: EphemerisProvider + ?Sized,
    {
        Self {
            site: site.name.clone(),
            timezone: site.timezone.name().to_string(),
            latitude: site.latitude,
            longitude: site.longitude,
            anchor: boundaries.anchor(),
            noon_altitude: ephemeris.altitude(site, boundaries.anchor()),
            boundaries: boundaries
                .labeled()
                .into_iter()
                .map(|(name, utc)| BoundaryEntry {
                    name,
                    utc,
                    local: site.local_time(utc).format(LOCAL_FORMAT).to_string(),
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FixedEphemeris;
    use chrono::TimeZone;

    #[test]
    fn test_titles() {
        assert_eq!(title("astronomical_end"), "Astronomical end");
        assert_eq!(title("sunset"), "Sunset");
    }

    #[test]
    fn test_report_lists_boundaries_in_local_time() {
        let anchor = Utc.with_ymd_and_hms(2013, 8, 23, 22, 0, 0).unwrap();
        let ephemeris = FixedEphemeris::evenly_spaced(anchor).with_altitude(80.5);
        let site = ObserverSite::maunakea();

        let report = NightReport::new(&ephemeris, &site, &ephemeris.boundaries());

        assert_eq!(report.timezone, "Pacific/Honolulu");
        assert_eq!(report.noon_altitude, 80.5);
        assert_eq!(report.boundaries.len(), 8);
        assert_eq!(report.boundaries[0].name, "sunset");
        assert_eq!(report.boundaries[0].local, "2013/08/23 18:00:00 HST");
        assert_eq!(report.boundaries[7].local, "2013/08/24 06:00:00 HST");

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["boundaries"][7]["name"], "sunrise");
    }
}
