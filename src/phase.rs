//! Sky phase classification.
//!
//! Each boundary opens the phase that follows it: intervals are half-open,
//! `[start, end)`, so an instant equal to a boundary belongs to the later
//! phase and every instant maps to exactly one phase.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

use crate::astro::PhaseBoundarySet;

/// Where the observation window stands relative to the Sun.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkyPhase {
    Day,
    EveningCivilTwilight,
    EveningNauticalTwilight,
    EveningAstronomicalTwilight,
    Night,
    MorningAstronomicalTwilight,
    MorningNauticalTwilight,
    MorningCivilTwilight,
}

impl SkyPhase {
    /// Phases in the order a night passes through them, starting from day.
    pub const ALL: [SkyPhase; 8] = [
        SkyPhase::Day,
        SkyPhase::EveningCivilTwilight,
        SkyPhase::EveningNauticalTwilight,
        SkyPhase::EveningAstronomicalTwilight,
        SkyPhase::Night,
        SkyPhase::MorningAstronomicalTwilight,
        SkyPhase::MorningNauticalTwilight,
        SkyPhase::MorningCivilTwilight,
    ];

    pub fn display_name(&self) -> &'static str {
        match self {
            SkyPhase::Day => "day",
            SkyPhase::EveningCivilTwilight => "evening (civil) twilight",
            SkyPhase::EveningNauticalTwilight => "evening (nautical) twilight",
            SkyPhase::EveningAstronomicalTwilight => "evening (astronomical) twilight",
            SkyPhase::Night => "night",
            SkyPhase::MorningAstronomicalTwilight => "morning (astronomical) twilight",
            SkyPhase::MorningNauticalTwilight => "morning (nautical) twilight",
            SkyPhase::MorningCivilTwilight => "morning (civil) twilight",
        }
    }

    /// True while the sky is dark enough for long manual exposures.
    pub fn is_dark(&self) -> bool {
        matches!(
            self,
            SkyPhase::EveningAstronomicalTwilight
                | SkyPhase::Night
                | SkyPhase::MorningAstronomicalTwilight
        )
    }

    /// The phase that follows this one.
    pub fn next(&self) -> SkyPhase {
        let index = Self::ALL.iter().position(|p| p == self).unwrap_or(0);
        Self::ALL[(index + 1) % Self::ALL.len()]
    }
}

impl fmt::Display for SkyPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Classify `now` against one night's boundaries. Total and pure.
pub fn classify(now: DateTime<Utc>, boundaries: &PhaseBoundarySet) -> SkyPhase {
    if now < boundaries.sunset() || now >= boundaries.sunrise() {
        SkyPhase::Day
    } else if now < boundaries.civil_end() {
        SkyPhase::EveningCivilTwilight
    } else if now < boundaries.nautical_end() {
        SkyPhase::EveningNauticalTwilight
    } else if now < boundaries.astronomical_end() {
        SkyPhase::EveningAstronomicalTwilight
    } else if now < boundaries.astronomical_begin() {
        SkyPhase::Night
    } else if now < boundaries.nautical_begin() {
        SkyPhase::MorningAstronomicalTwilight
    } else if now < boundaries.civil_begin() {
        SkyPhase::MorningNauticalTwilight
    } else {
        SkyPhase::MorningCivilTwilight
    }
}

/// The next boundary after `now` within this night, with the phase it opens.
///
/// `None` once sunrise has passed.
pub fn next_transition(
    now: DateTime<Utc>,
    boundaries: &PhaseBoundarySet,
) -> Option<(SkyPhase, DateTime<Utc>)> {
    boundaries
        .instants()
        .into_iter()
        .find(|instant| *instant > now)
        .map(|instant| (classify(instant, boundaries), instant))
}
