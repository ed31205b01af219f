//! Exposure settings and the phase-to-settings policy.
//!
//! Bright phases hand the shutter to the camera in aperture priority. Dark
//! phases switch to full manual with a fixed aperture, exposure time and ISO.

pub mod camera;

use serde::Serialize;
use std::fmt;

use crate::constants::{DEFAULT_NIGHT_APERTURE, DEFAULT_NIGHT_EXPOSURE, DEFAULT_NIGHT_ISO};
use crate::errors::ConfigurationError;
use crate::phase::SkyPhase;
use camera::{CameraModel, Parameter};

/// Parameters an exposure config controls, in the order they are applied.
/// The mode goes first so the camera accepts the values that follow.
pub const EXPOSURE_PARAMETERS: [Parameter; 4] = [
    Parameter::ShootingMode,
    Parameter::Aperture,
    Parameter::ExposureTime,
    Parameter::Iso,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ShootingMode {
    /// Aperture priority: the camera picks the shutter speed.
    AperturePriority,
    ShutterPriority,
    Manual,
}

impl ShootingMode {
    pub fn label(&self) -> &'static str {
        match self {
            ShootingMode::AperturePriority => "Av",
            ShootingMode::ShutterPriority => "Tv",
            ShootingMode::Manual => "M",
        }
    }
}

impl fmt::Display for ShootingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Lens opening as an f-number label, e.g. `"2.0"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Aperture(String);

impl Aperture {
    pub fn parse(label: &str) -> Result<Self, String> {
        let label = label.trim().trim_start_matches("f/");
        match label.parse::<f64>() {
            Ok(f_number) if f_number.is_finite() && f_number > 0.0 => Ok(Self(label.to_string())),
            _ => Err(format!("'{label}' is not an f-number")),
        }
    }

    pub fn label(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Aperture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "f/{}", self.0)
    }
}

/// Shutter duration. `Auto` lets the camera meter it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum ExposureTime {
    Auto,
    /// Seconds as a camera label: `"20"`, `"1/30"`.
    Fixed(String),
}

impl ExposureTime {
    pub fn parse(label: &str) -> Result<Self, String> {
        let label = label.trim();
        if label.eq_ignore_ascii_case("auto") {
            return Ok(Self::Auto);
        }
        let fixed = Self::Fixed(label.trim_end_matches('s').to_string());
        match fixed.seconds() {
            Some(seconds) if seconds > 0.0 => Ok(fixed),
            _ => Err(format!("'{label}' is not an exposure time")),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            ExposureTime::Auto => "auto",
            ExposureTime::Fixed(label) => label,
        }
    }

    /// Duration in seconds, `None` for `Auto`.
    pub fn seconds(&self) -> Option<f64> {
        match self {
            ExposureTime::Auto => None,
            ExposureTime::Fixed(label) => match label.split_once('/') {
                Some((numerator, denominator)) => {
                    let numerator: f64 = numerator.trim().parse().ok()?;
                    let denominator: f64 = denominator.trim().parse().ok()?;
                    (denominator != 0.0).then(|| numerator / denominator)
                }
                None => label.parse().ok(),
            },
        }
    }
}

impl fmt::Display for ExposureTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExposureTime::Auto => f.write_str("auto"),
            ExposureTime::Fixed(label) => write!(f, "{label}s"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Iso(pub u32);

impl fmt::Display for Iso {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Desired camera settings. `None` means "leave as is".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExposureConfig {
    pub mode: Option<ShootingMode>,
    pub aperture: Option<Aperture>,
    pub exposure_time: Option<ExposureTime>,
    pub iso: Option<Iso>,
}

impl ExposureConfig {
    /// Vocabulary label for `parameter`, if this config sets it.
    pub fn label_for(&self, parameter: Parameter) -> Option<String> {
        match parameter {
            Parameter::ShootingMode => self.mode.map(|mode| mode.label().to_string()),
            Parameter::Aperture => self.aperture.as_ref().map(|a| a.label().to_string()),
            Parameter::ExposureTime => self.exposure_time.as_ref().map(|e| e.label().to_string()),
            Parameter::Iso => self.iso.map(|iso| iso.to_string()),
            Parameter::ImageFormat | Parameter::FocusMode => None,
        }
    }

    /// Every field this config sets, in application order.
    pub fn settings(&self) -> Vec<(Parameter, String)> {
        EXPOSURE_PARAMETERS
            .iter()
            .filter_map(|&parameter| self.label_for(parameter).map(|label| (parameter, label)))
            .collect()
    }

    /// Copy one field from `other`.
    pub fn copy_field(&mut self, parameter: Parameter, other: &ExposureConfig) {
        match parameter {
            Parameter::ShootingMode => self.mode = other.mode,
            Parameter::Aperture => self.aperture = other.aperture.clone(),
            Parameter::ExposureTime => self.exposure_time = other.exposure_time.clone(),
            Parameter::Iso => self.iso = other.iso,
            Parameter::ImageFormat | Parameter::FocusMode => {}
        }
    }

    /// Check every set field against a camera's vocabulary.
    pub fn validate_for(&self, camera: &CameraModel) -> Result<(), ConfigurationError> {
        for (parameter, label) in self.settings() {
            camera.command(parameter, &label)?;
        }
        Ok(())
    }
}

impl fmt::Display for ExposureConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let unset = || "unchanged".to_string();
        write!(
            f,
            "Mode = {}. Av = {}. Tv = {}. ISO = {}.",
            self.mode.map_or_else(unset, |m| m.to_string()),
            self.aperture.as_ref().map_or_else(unset, |a| a.to_string()),
            self.exposure_time.as_ref().map_or_else(unset, |e| e.to_string()),
            self.iso.map_or_else(unset, |i| i.to_string()),
        )
    }
}

/// Maps each sky phase to the settings it should be shot with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExposurePolicy {
    bright: ExposureConfig,
    dark: ExposureConfig,
}

impl ExposurePolicy {
    /// Policy with the given dark-sky settings; bright phases always use
    /// aperture priority with an automatic shutter.
    pub fn new(night_aperture: Aperture, night_exposure: ExposureTime, night_iso: Iso) -> Self {
        Self {
            bright: ExposureConfig {
                mode: Some(ShootingMode::AperturePriority),
                aperture: None,
                exposure_time: Some(ExposureTime::Auto),
                iso: None,
            },
            dark: ExposureConfig {
                mode: Some(ShootingMode::Manual),
                aperture: Some(night_aperture),
                exposure_time: Some(night_exposure),
                iso: Some(night_iso),
            },
        }
    }

    pub fn config_for(&self, phase: SkyPhase) -> ExposureConfig {
        if phase.is_dark() {
            self.dark.clone()
        } else {
            self.bright.clone()
        }
    }

    /// Check every phase's settings against a camera's vocabulary.
    pub fn validate_for(&self, camera: &CameraModel) -> Result<(), ConfigurationError> {
        for phase in SkyPhase::ALL {
            self.config_for(phase).validate_for(camera)?;
        }
        Ok(())
    }
}

impl Default for ExposurePolicy {
    fn default() -> Self {
        Self::new(
            Aperture(DEFAULT_NIGHT_APERTURE.to_string()),
            ExposureTime::Fixed(DEFAULT_NIGHT_EXPOSURE.to_string()),
            Iso(DEFAULT_NIGHT_ISO),
        )
    }
}

/// Settings for `phase` under the default policy.
pub fn policy_for(phase: SkyPhase) -> ExposureConfig {
    ExposurePolicy::default().config_for(phase)
}
