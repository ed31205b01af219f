//! Solar ephemeris backed by the `sunrise` crate.
//!
//! `sunrise` seeds each crossing for the calendar days around the query
//! instant. The seed is then refined by bisection against [`altitude`], so
//! every crossing is the instant the centre of the disk stands at the horizon
//! angle after refraction for the site's temperature and pressure. The
//! altitude uses the NOAA low-precision solar position (good to about 0.01°).
//!
//! [`altitude`]: EphemerisProvider::altitude

use chrono::{DateTime, Duration, Timelike, Utc};
use sunrise::{Coordinates, DawnType, SolarDay, SolarEvent};

use super::{Direction, EphemerisProvider, Horizon, ObserverSite};
use crate::constants::{
    CROSSING_PRECISION_MS, CROSSING_SEED_WINDOW_MINUTES, MAX_CROSSING_SEARCH_HOURS, STANDARD_PRESSURE,
    STANDARD_TEMPERATURE_KELVIN,
};
use crate::errors::EphemerisError;

const J2000: f64 = 2_451_545.0;
const UNIX_EPOCH_JULIAN_DAY: f64 = 2_440_587.5;

const CROSSING_TOLERANCE_DEGREES: f64 = 0.05;

/// Production ephemeris for a fixed observer on Earth.
#[derive(Debug, Clone, Copy, Default)]
pub struct SolarEphemeris;

impl SolarEphemeris {
    pub fn new() -> Self {
        Self
    }
}

fn coordinates(site: &ObserverSite) -> Result<Coordinates, EphemerisError> {
    Coordinates::new(site.latitude, site.longitude).ok_or(EphemerisError::InvalidSite {
        latitude: site.latitude,
        longitude: site.longitude,
    })
}

fn solar_event(horizon: Horizon, direction: Direction) -> SolarEvent {
    let dawn_type = match horizon {
        Horizon::Geometric => None,
        Horizon::Civil => Some(DawnType::Civil),
        Horizon::Nautical => Some(DawnType::Nautical),
        Horizon::Astronomical => Some(DawnType::Astronomical),
    };
    match (dawn_type, direction) {
        (None, Direction::Setting) => SolarEvent::Sunset,
        (None, Direction::Rising) => SolarEvent::Sunrise,
        (Some(dawn_type), Direction::Setting) => SolarEvent::Dusk(dawn_type),
        (Some(dawn_type), Direction::Rising) => SolarEvent::Dawn(dawn_type),
    }
}

impl EphemerisProvider for SolarEphemeris {
    fn next_crossing(
        &self,
        site: &ObserverSite,
        after: DateTime<Utc>,
        horizon: Horizon,
        direction: Direction,
    ) -> Result<DateTime<Utc>, EphemerisError> {
        let limit = after + Duration::hours(MAX_CROSSING_SEARCH_HOURS);
        let first_day = after.date_naive() - Duration::days(1);

        // `sunrise` reports a meaningless instant when the Sun never reaches
        // the horizon on a given day, so every candidate is checked.
        let mut best: Option<DateTime<Utc>> = None;
        for offset in 0..4 {
            let day = first_day + Duration::days(offset);
            let seed = SolarDay::new(coordinates(site)?, day).event_time(solar_event(horizon, direction));
            let Some(candidate) = self.refine_crossing(site, horizon, direction, seed) else {
                continue;
            };
            if is_plausible_crossing(self, site, horizon, candidate, after, limit)
                && best.is_none_or(|b| candidate < b)
            {
                best = Some(candidate);
            }
        }

        best.ok_or(EphemerisError::NoCrossing {
            horizon,
            direction,
            after,
            hours: MAX_CROSSING_SEARCH_HOURS,
        })
    }

    fn altitude(&self, site: &ObserverSite, instant: DateTime<Utc>) -> f64 {
        let geometric = geometric_altitude(site.latitude, site.longitude, instant);
        geometric + refraction(geometric, site.temperature, site.pressure)
    }
}

impl SolarEphemeris {
    /// Bisect around `seed` for the instant the refracted altitude of the
    /// disk centre passes `horizon` in `direction`.
    ///
    /// `None` when the Sun does not cross the horizon within the seed window.
    fn refine_crossing(
        &self,
        site: &ObserverSite,
        horizon: Horizon,
        direction: Direction,
        seed: DateTime<Utc>,
    ) -> Option<DateTime<Utc>> {
        let target = horizon.depression_degrees();
        let is_above = |instant: DateTime<Utc>| self.altitude(site, instant) > target;
        // Setting: above before the crossing, below after it
        let above_before = direction == Direction::Setting;

        let window = Duration::minutes(CROSSING_SEED_WINDOW_MINUTES);
        let (mut before, mut after) = (seed - window, seed + window);
        if is_above(before) != above_before || is_above(after) == above_before {
            return None;
        }

        let precision = Duration::milliseconds(CROSSING_PRECISION_MS);
        while after - before > precision {
            let middle = before + (after - before) / 2;
            if is_above(middle) == above_before {
                before = middle;
            } else {
                after = middle;
            }
        }
        Some(before + (after - before) / 2)
    }
}

/// A candidate must lie in `(after, limit]` and the Sun must actually stand
/// at the requested horizon at that instant.
fn is_plausible_crossing<E>(
    ephemeris: &E,
    site: &ObserverSite,
    horizon: Horizon,
    candidate: DateTime<Utc>,
    after: DateTime<Utc>,
    limit: DateTime<Utc>,
) -> bool
where
    E: EphemerisProvider + ?Sized,
{
    if candidate <= after || candidate > limit {
        return false;
    }
    let altitude = ephemeris.altitude(site, candidate);
    (altitude - horizon.depression_degrees()).abs() <= CROSSING_TOLERANCE_DEGREES
}

/// Altitude of the Sun's centre without atmospheric refraction, in degrees.
pub fn geometric_altitude(latitude: f64, longitude: f64, instant: DateTime<Utc>) -> f64 {
    let seconds = instant.timestamp() as f64 + f64::from(instant.nanosecond()) / 1e9;
    let julian_day = seconds / 86_400.0 + UNIX_EPOCH_JULIAN_DAY;
    let t = (julian_day - J2000) / 36_525.0;

    let mean_longitude = (280.466_46 + t * (36_000.769_83 + t * 0.000_303_2)).rem_euclid(360.0);
    let mean_anomaly = (357.529_11 + t * (35_999.050_29 - 0.000_153_7 * t)).to_radians();
    let eccentricity = 0.016_708_634 - t * (0.000_042_037 + 0.000_000_126_7 * t);

    let center = mean_anomaly.sin() * (1.914_602 - t * (0.004_817 + 0.000_014 * t))
        + (2.0 * mean_anomaly).sin() * (0.019_993 - 0.000_101 * t)
        + (3.0 * mean_anomaly).sin() * 0.000_289;
    let omega = (125.04 - 1934.136 * t).to_radians();
    let apparent_longitude = (mean_longitude + center - 0.005_69 - 0.004_78 * omega.sin()).to_radians();

    let mean_obliquity =
        23.0 + (26.0 + (21.448 - t * (46.815 + t * (0.000_59 - t * 0.001_813))) / 60.0) / 60.0;
    let obliquity = (mean_obliquity + 0.002_56 * omega.cos()).to_radians();
    let declination = (obliquity.sin() * apparent_longitude.sin()).asin();

    // Equation of time, in minutes
    let y = (obliquity / 2.0).tan().powi(2);
    let l0 = mean_longitude.to_radians();
    let equation_of_time = 4.0
        * (y * (2.0 * l0).sin() - 2.0 * eccentricity * mean_anomaly.sin()
            + 4.0 * eccentricity * y * mean_anomaly.sin() * (2.0 * l0).cos()
            - 0.5 * y * y * (4.0 * l0).sin()
            - 1.25 * eccentricity * eccentricity * (2.0 * mean_anomaly).sin())
        .to_degrees();

    let utc_minutes = seconds.rem_euclid(86_400.0) / 60.0;
    let true_solar_minutes = (utc_minutes + equation_of_time + 4.0 * longitude).rem_euclid(1440.0);
    let hour_angle = (true_solar_minutes / 4.0 - 180.0).to_radians();

    let lat = latitude.to_radians();
    let cos_zenith = lat.sin() * declination.sin() + lat.cos() * declination.cos() * hour_angle.cos();
    90.0 - cos_zenith.clamp(-1.0, 1.0).acos().to_degrees()
}

/// Atmospheric refraction in degrees for a geometric altitude (Sæmundsson),
/// scaled from the standard atmosphere to the given conditions.
pub fn refraction(altitude: f64, temperature: f64, pressure: f64) -> f64 {
    if altitude < -1.0 {
        return 0.0;
    }
    let arcminutes = 1.02 / (altitude + 10.3 / (altitude + 5.11)).to_radians().tan();
    let scale = (pressure / STANDARD_PRESSURE) * (STANDARD_TEMPERATURE_KELVIN / (273.0 + temperature));
    (arcminutes * scale / 60.0).max(0.0)
}
