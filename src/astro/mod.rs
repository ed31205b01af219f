//! Solar geometry for an observing site.
//!
//! The session only needs two things from an ephemeris: when the Sun next
//! crosses a given horizon, and how high it stands at an instant. Both sit
//! behind [`EphemerisProvider`] so tests can substitute fixed instants.

pub mod boundaries;
pub mod display;
pub mod ephemeris;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use std::fmt;

use crate::constants::*;
use crate::errors::EphemerisError;

pub use boundaries::{PhaseBoundarySet, compute_boundaries, next_night, night_anchor};
pub use ephemeris::SolarEphemeris;

/// Where the camera stands. Immutable for the lifetime of a session.
#[derive(Debug, Clone, PartialEq)]
pub struct ObserverSite {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    /// Metres above sea level. Horizons are not dipped for it.
    pub elevation: f64,
    /// Ambient temperature in °C, used for refraction.
    pub temperature: f64,
    /// Ambient pressure in mbar, used for refraction.
    pub pressure: f64,
    pub timezone: Tz,
}

impl ObserverSite {
    pub fn maunakea() -> Self {
        Self {
            name: "Maunakea".to_string(),
            latitude: MKO_LATITUDE,
            longitude: MKO_LONGITUDE,
            elevation: MKO_ELEVATION,
            temperature: MKO_TEMPERATURE,
            pressure: MKO_PRESSURE,
            timezone: chrono_tz::Pacific::Honolulu,
        }
    }

    pub fn mauna_loa() -> Self {
        Self {
            name: "Mauna Loa".to_string(),
            latitude: MLO_LATITUDE,
            longitude: MLO_LONGITUDE,
            elevation: MLO_ELEVATION,
            temperature: MLO_TEMPERATURE,
            pressure: MLO_PRESSURE,
            timezone: chrono_tz::Pacific::Honolulu,
        }
    }

    /// Look up a built-in observatory by its short name.
    pub fn preset(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "mko" | "maunakea" => Some(Self::maunakea()),
            "mlo" | "mauna_loa" | "maunaloa" => Some(Self::mauna_loa()),
            _ => None,
        }
    }

    pub fn local_time(&self, instant: DateTime<Utc>) -> DateTime<Tz> {
        instant.with_timezone(&self.timezone)
    }
}

/// A horizon the Sun can cross.
///
/// Every horizon is crossed by the centre of the disk, measured against the
/// refraction-corrected altitude. Refraction only matters for the geometric
/// horizon; the twilight depressions lie below the refracting layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Horizon {
    Geometric,
    Civil,
    Nautical,
    Astronomical,
}

impl Horizon {
    pub fn depression_degrees(&self) -> f64 {
        match self {
            Horizon::Geometric => GEOMETRIC_HORIZON_DEGREES,
            Horizon::Civil => CIVIL_TWILIGHT_DEGREES,
            Horizon::Nautical => NAUTICAL_TWILIGHT_DEGREES,
            Horizon::Astronomical => ASTRONOMICAL_TWILIGHT_DEGREES,
        }
    }
}

impl fmt::Display for Horizon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}°", self.depression_degrees())
    }
}

/// Whether the Sun is going down or coming up through a horizon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Setting,
    Rising,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Setting => write!(f, "setting"),
            Direction::Rising => write!(f, "rising"),
        }
    }
}

/// Source of solar positions for an observer.
pub trait EphemerisProvider {
    /// First instant strictly after `after` at which the Sun crosses `horizon`
    /// in `direction`.
    fn next_crossing(
        &self,
        site: &ObserverSite,
        after: DateTime<Utc>,
        horizon: Horizon,
        direction: Direction,
    ) -> Result<DateTime<Utc>, EphemerisError>;

    /// Refraction-corrected altitude of the Sun's centre, in degrees.
    fn altitude(&self, site: &ObserverSite, instant: DateTime<Utc>) -> f64;
}
