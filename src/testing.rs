//! Hand-written fakes for the session's collaborators.
//!
//! Available to unit tests and, through the `testing-support` feature, to the
//! integration tests under `tests/`.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::astro::boundaries::CROSSINGS;
use crate::astro::{Direction, EphemerisProvider, Horizon, ObserverSite, PhaseBoundarySet};
use crate::clock::Clock;
use crate::device::{DeviceChannel, DeviceOutput};
use crate::errors::{DeviceError, EphemerisError};
use crate::exposure::camera::{Parameter, SetCommand};

// Offsets from the anchor for each boundary, in night order.
const EVEN_OFFSETS_MINUTES: [i64; 8] = [360, 390, 420, 450, 990, 1020, 1050, 1080];

/// Ephemeris that repeats one fixed night every 24 hours.
#[derive(Debug, Clone)]
pub struct FixedEphemeris {
    night: PhaseBoundarySet,
    missing: Vec<Horizon>,
    frozen: bool,
    altitude: f64,
}

impl FixedEphemeris {
    pub fn new(night: PhaseBoundarySet) -> Self {
        Self {
            night,
            missing: Vec::new(),
            frozen: false,
            altitude: 45.0,
        }
    }

    /// A night anchored at `anchor`: sunset six hours later, half-hour
    /// twilight bands, sunrise eighteen hours later.
    pub fn evenly_spaced(anchor: DateTime<Utc>) -> Self {
        let instants = EVEN_OFFSETS_MINUTES.map(|minutes| anchor + ChronoDuration::minutes(minutes));
        let night = PhaseBoundarySet::new(anchor, instants).expect("evenly spaced instants are ordered");
        Self::new(night)
    }

    /// Report no crossing at all for `horizon`.
    pub fn without(mut self, horizon: Horizon) -> Self {
        self.missing.push(horizon);
        self
    }

    /// Always answer with the original night, whatever the query instant.
    pub fn frozen(mut self) -> Self {
        self.frozen = true;
        self
    }

    pub fn with_altitude(mut self, altitude: f64) -> Self {
        self.altitude = altitude;
        self
    }

    pub fn boundaries(&self) -> PhaseBoundarySet {
        self.night
    }
}

impl EphemerisProvider for FixedEphemeris {
    fn next_crossing(
        &self,
        _site: &ObserverSite,
        after: DateTime<Utc>,
        horizon: Horizon,
        direction: Direction,
    ) -> Result<DateTime<Utc>, EphemerisError> {
        let no_crossing = EphemerisError::NoCrossing {
            horizon,
            direction,
            after,
            hours: 0,
        };
        if self.missing.contains(&horizon) {
            return Err(no_crossing);
        }
        let index = CROSSINGS
            .iter()
            .position(|crossing| *crossing == (horizon, direction))
            .ok_or(no_crossing)?;
        let base = self.night.instants()[index];
        if self.frozen {
            return Ok(base);
        }
        let days = (after - base).num_seconds().div_euclid(86_400) + 1;
        Ok(base + ChronoDuration::days(days))
    }

    fn altitude(&self, _site: &ObserverSite, _instant: DateTime<Utc>) -> f64 {
        self.altitude
    }
}

/// One call received by a [`ScriptedDevice`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceCall {
    Set { parameter: Parameter, label: String },
    Expose { timeout: Duration },
}

#[derive(Default)]
struct Script {
    calls: Vec<DeviceCall>,
    set_failures: HashMap<Parameter, usize>,
    exposure_failures: usize,
    exposure_time: Duration,
    clock: Option<Arc<dyn Clock>>,
}

/// Device channel that records every call and fails on demand.
///
/// Clones share the same script, so a test can keep one handle while the
/// session owns another.
#[derive(Clone, Default)]
pub struct ScriptedDevice {
    script: Arc<Mutex<Script>>,
}

impl ScriptedDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance `clock` by `exposure_time` on every successful frame.
    pub fn advancing(clock: Arc<dyn Clock>, exposure_time: Duration) -> Self {
        let device = Self::new();
        {
            let mut script = device.script();
            script.clock = Some(clock);
            script.exposure_time = exposure_time;
        }
        device
    }

    fn script(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Fail the next `times` writes of `parameter`.
    pub fn fail_set(&self, parameter: Parameter, times: usize) {
        self.script().set_failures.insert(parameter, times);
    }

    /// Fail the next `times` exposure triggers.
    pub fn fail_exposures(&self, times: usize) {
        self.script().exposure_failures = times;
    }

    pub fn calls(&self) -> Vec<DeviceCall> {
        self.script().calls.clone()
    }

    /// Only the settings written, in order.
    pub fn set_calls(&self) -> Vec<(Parameter, String)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                DeviceCall::Set { parameter, label } => Some((parameter, label)),
                DeviceCall::Expose { .. } => None,
            })
            .collect()
    }

    pub fn exposures(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, DeviceCall::Expose { .. }))
            .count()
    }
}

impl DeviceChannel for ScriptedDevice {
    fn set(&mut self, command: &SetCommand) -> Result<DeviceOutput, DeviceError> {
        let mut script = self.script();
        script.calls.push(DeviceCall::Set {
            parameter: command.parameter,
            label: command.label.clone(),
        });
        if let Some(remaining) = script.set_failures.get_mut(&command.parameter)
            && *remaining > 0
        {
            *remaining -= 1;
            return Err(DeviceError::Command {
                command: format!("--set-config {command}"),
                output: format!("*** Error: could not set {} ***", command.parameter),
            });
        }
        Ok(DeviceOutput {
            command: format!("--set-config {command}"),
            output: String::new(),
        })
    }

    fn trigger_exposure(&mut self, timeout: Duration) -> Result<DeviceOutput, DeviceError> {
        let (clock, exposure_time) = {
            let mut script = self.script();
            script.calls.push(DeviceCall::Expose { timeout });
            if script.exposure_failures > 0 {
                script.exposure_failures -= 1;
                return Err(DeviceError::Timeout {
                    command: "--capture-image".to_string(),
                    timeout,
                });
            }
            (script.clock.clone(), script.exposure_time)
        };
        if let Some(clock) = clock {
            clock.sleep(exposure_time);
        }
        Ok(DeviceOutput {
            command: "--capture-image".to_string(),
            output: "New file is in location /capt0000.jpg on the camera".to_string(),
        })
    }

    fn channel_name(&self) -> &'static str {
        "scripted"
    }
}
