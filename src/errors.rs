//! Typed errors for the imaging session.
//!
//! Configuration and ephemeris failures abort the session. Device failures are
//! absorbed by the session loop, which logs them and retries on the next tick.

use chrono::{DateTime, NaiveDate, Utc};
use std::time::Duration;
use thiserror::Error;

use crate::astro::{Direction, Horizon};
use crate::exposure::camera::Parameter;

/// A setting the configured camera cannot accept.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("camera model '{model}' is not supported (known models: {known})")]
    UnknownCameraModel { model: String, known: String },

    #[error("{model} does not expose the {parameter} setting")]
    UnsupportedParameter { model: String, parameter: Parameter },

    #[error("{parameter} '{value}' is not supported by {model} (supported: {supported})")]
    UnsupportedValue {
        model: String,
        parameter: Parameter,
        value: String,
        supported: String,
    },
}

/// The Sun's crossings could not be resolved into a usable night.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EphemerisError {
    #[error("invalid observer coordinates: latitude {latitude}, longitude {longitude}")]
    InvalidSite { latitude: f64, longitude: f64 },

    #[error(
        "the Sun does not cross the {horizon} horizon ({direction}) within {hours} hours after {after}"
    )]
    NoCrossing {
        horizon: Horizon,
        direction: Direction,
        after: DateTime<Utc>,
        hours: i64,
    },

    #[error("local noon on {date} does not exist in timezone {timezone}")]
    NoLocalNoon { date: NaiveDate, timezone: String },

    #[error("{later} ({later_at}) does not follow {earlier} ({earlier_at})")]
    Disordered {
        earlier: &'static str,
        earlier_at: DateTime<Utc>,
        later: &'static str,
        later_at: DateTime<Utc>,
    },

    #[error("next night's sunrise did not move past {sunrise}")]
    StalledRollover { sunrise: DateTime<Utc> },
}

/// A camera command that did not complete successfully.
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("'{command}' failed: {output}")]
    Command { command: String, output: String },

    #[error("'{command}' did not respond within {}s", .timeout.as_secs())]
    Timeout { command: String, timeout: Duration },

    #[error("failed to start '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
}

impl DeviceError {
    /// Raw diagnostic text reported by the device, if any.
    pub fn output(&self) -> &str {
        match self {
            DeviceError::Command { output, .. } => output,
            DeviceError::Timeout { .. } | DeviceError::Spawn { .. } => "",
        }
    }
}

/// Errors that end a session.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Ephemeris(#[from] EphemerisError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_message_reports_seconds() {
        let error = DeviceError::Timeout {
            command: "gphoto2 --capture-image".to_string(),
            timeout: Duration::from_secs(50),
        };
        assert!(matches!(error, DeviceError::Timeout { .. }));
        assert_eq!(
            error.to_string(),
            "'gphoto2 --capture-image' did not respond within 50s"
        );
        assert_eq!(error.output(), "");
    }

    #[test]
    fn test_command_error_keeps_device_output() {
        let error = DeviceError::Command {
            command: "gphoto2 --set-config /main/capturesettings/aperture=2.0".to_string(),
            output: "*** Error: No camera found. ***".to_string(),
        };
        assert_eq!(error.output(), "*** Error: No camera found. ***");
    }

    #[test]
    fn test_session_error_is_transparent() {
        let error: SessionError = ConfigurationError::UnsupportedValue {
            model: "Canon EOS 5D".to_string(),
            parameter: Parameter::Iso,
            value: "999".to_string(),
            supported: "100, 200".to_string(),
        }
        .into();
        assert_eq!(
            error.to_string(),
            "ISO '999' is not supported by Canon EOS 5D (supported: 100, 200)"
        );
    }
}
