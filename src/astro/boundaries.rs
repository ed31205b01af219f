//! Phase boundary instants for one observation night.
//!
//! A night is anchored at local noon in the site timezone: before noon the
//! night in progress (or just ended) belongs to yesterday's noon, from noon on
//! it belongs to today's. Every crossing is searched forward from the anchor,
//! so the eight instants always describe the same dusk-to-dawn window.

use chrono::{DateTime, NaiveDate, TimeZone, Timelike, Utc};
use serde::Serialize;

use super::{Direction, EphemerisProvider, Horizon, ObserverSite};
use crate::constants::{MAX_ROLLOVER_ATTEMPTS, NIGHT_ANCHOR_HOUR};
use crate::errors::EphemerisError;

pub const BOUNDARY_NAMES: [&str; 8] = [
    "sunset",
    "civil_end",
    "nautical_end",
    "astronomical_end",
    "astronomical_begin",
    "nautical_begin",
    "civil_begin",
    "sunrise",
];

// Horizon and direction for each boundary, in night order.
pub(crate) const CROSSINGS: [(Horizon, Direction); 8] = [
    (Horizon::Geometric, Direction::Setting),
    (Horizon::Civil, Direction::Setting),
    (Horizon::Nautical, Direction::Setting),
    (Horizon::Astronomical, Direction::Setting),
    (Horizon::Astronomical, Direction::Rising),
    (Horizon::Nautical, Direction::Rising),
    (Horizon::Civil, Direction::Rising),
    (Horizon::Geometric, Direction::Rising),
];

/// The eight boundary instants of one night, strictly increasing.
///
/// Only constructible through [`PhaseBoundarySet::new`], which enforces the
/// ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PhaseBoundarySet {
    anchor: DateTime<Utc>,
    sunset: DateTime<Utc>,
    civil_end: DateTime<Utc>,
    nautical_end: DateTime<Utc>,
    astronomical_end: DateTime<Utc>,
    astronomical_begin: DateTime<Utc>,
    nautical_begin: DateTime<Utc>,
    civil_begin: DateTime<Utc>,
    sunrise: DateTime<Utc>,
}

impl PhaseBoundarySet {
    /// Build a set from instants given in night order (sunset first,
    /// sunrise last).
    pub fn new(anchor: DateTime<Utc>, instants: [DateTime<Utc>; 8]) -> Result<Self, EphemerisError> {
        if instants[0] <= anchor {
            return Err(EphemerisError::Disordered {
                earlier: "anchor",
                earlier_at: anchor,
                later: BOUNDARY_NAMES[0],
                later_at: instants[0],
            });
        }
        for (i, pair) in instants.windows(2).enumerate() {
            if pair[1] <= pair[0] {
                return Err(EphemerisError::Disordered {
                    earlier: BOUNDARY_NAMES[i],
                    earlier_at: pair[0],
                    later: BOUNDARY_NAMES[i + 1],
                    later_at: pair[1],
                });
            }
        }

        let [
            sunset,
            civil_end,
            nautical_end,
            astronomical_end,
            astronomical_begin,
            nautical_begin,
            civil_begin,
            sunrise,
        ] = instants;
        Ok(Self {
            anchor,
            sunset,
            civil_end,
            nautical_end,
            astronomical_end,
            astronomical_begin,
            nautical_begin,
            civil_begin,
            sunrise,
        })
    }

    /// Local noon this night was computed from.
    pub fn anchor(&self) -> DateTime<Utc> {
        self.anchor
    }
    pub fn sunset(&self) -> DateTime<Utc> {
        self.sunset
    }
    pub fn civil_end(&self) -> DateTime<Utc> {
        self.civil_end
    }
    pub fn nautical_end(&self) -> DateTime<Utc> {
        self.nautical_end
    }
    pub fn astronomical_end(&self) -> DateTime<Utc> {
        self.astronomical_end
    }
    pub fn astronomical_begin(&self) -> DateTime<Utc> {
        self.astronomical_begin
    }
    pub fn nautical_begin(&self) -> DateTime<Utc> {
        self.nautical_begin
    }
    pub fn civil_begin(&self) -> DateTime<Utc> {
        self.civil_begin
    }
    pub fn sunrise(&self) -> DateTime<Utc> {
        self.sunrise
    }

    /// All eight instants in night order.
    pub fn instants(&self) -> [DateTime<Utc>; 8] {
        [
            self.sunset,
            self.civil_end,
            self.nautical_end,
            self.astronomical_end,
            self.astronomical_begin,
            self.nautical_begin,
            self.civil_begin,
            self.sunrise,
        ]
    }

    /// Instants paired with their names, in night order.
    pub fn labeled(&self) -> [(&'static str, DateTime<Utc>); 8] {
        let instants = self.instants();
        std::array::from_fn(|i| (BOUNDARY_NAMES[i], instants[i]))
    }
}

/// Local noon on `date` in the site timezone, as UTC.
pub fn local_noon(site: &ObserverSite, date: NaiveDate) -> Result<DateTime<Utc>, EphemerisError> {
    let no_noon = || EphemerisError::NoLocalNoon {
        date,
        timezone: site.timezone.name().to_string(),
    };
    let noon = date.and_hms_opt(NIGHT_ANCHOR_HOUR, 0, 0).ok_or_else(no_noon)?;
    site.timezone
        .from_local_datetime(&noon)
        .earliest()
        .map(|local| local.with_timezone(&Utc))
        .ok_or_else(no_noon)
}

/// Noon that owns the night `instant` falls in.
///
/// Before local noon this is yesterday's noon, from noon on it is today's.
/// The rule is purely calendar based and never looks at the Sun.
pub fn night_anchor(site: &ObserverSite, instant: DateTime<Utc>) -> Result<DateTime<Utc>, EphemerisError> {
    let local = site.local_time(instant);
    let today = local.date_naive();
    let date = if local.hour() < NIGHT_ANCHOR_HOUR {
        today.pred_opt().ok_or(EphemerisError::NoLocalNoon {
            date: today,
            timezone: site.timezone.name().to_string(),
        })?
    } else {
        today
    };
    local_noon(site, date)
}

/// Boundaries of the night that `reference_instant` belongs to.
pub fn compute_boundaries<E>(
    ephemeris: &E,
    site: &ObserverSite,
    reference_instant: DateTime<Utc>,
) -> Result<PhaseBoundarySet, EphemerisError>
where
    E: EphemerisProvider + ?Sized,
{
    let anchor = night_anchor(site, reference_instant)?;
    boundaries_from_anchor(ephemeris, site, anchor)
}

/// Boundaries searched forward from an explicit anchor.
pub fn boundaries_from_anchor<E>(
    ephemeris: &E,
    site: &ObserverSite,
    anchor: DateTime<Utc>,
) -> Result<PhaseBoundarySet, EphemerisError>
where
    E: EphemerisProvider + ?Sized,
{
    let mut instants = [anchor; 8];
    for (slot, (horizon, direction)) in instants.iter_mut().zip(CROSSINGS) {
        *slot = ephemeris.next_crossing(site, anchor, horizon, direction)?;
    }
    PhaseBoundarySet::new(anchor, instants)
}

/// The night after `previous`, once `now` has passed its sunrise.
///
/// Anchored at noon of the local date of the previous sunrise, or at the
/// anchor of `now` when that is later (after a long gap). The result always
/// ends after both the previous sunrise and `now`.
pub fn next_night<E>(
    ephemeris: &E,
    site: &ObserverSite,
    previous: &PhaseBoundarySet,
    now: DateTime<Utc>,
) -> Result<PhaseBoundarySet, EphemerisError>
where
    E: EphemerisProvider + ?Sized,
{
    let sunrise_date = site.local_time(previous.sunrise()).date_naive();
    let mut anchor = local_noon(site, sunrise_date)?.max(night_anchor(site, now)?);
    let mut last_sunrise = previous.sunrise();

    for _ in 0..MAX_ROLLOVER_ATTEMPTS {
        let next = boundaries_from_anchor(ephemeris, site, anchor)?;
        if next.sunrise() <= last_sunrise {
            break;
        }
        if next.sunrise() > now {
            return Ok(next);
        }
        // `now` sits in the daytime after this night already
        last_sunrise = next.sunrise();
        anchor = local_noon(site, site.local_time(next.sunrise()).date_naive())?;
    }

    Err(EphemerisError::StalledRollover {
        sunrise: last_sunrise,
    })
}
