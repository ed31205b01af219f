//! Per-model camera vocabularies.
//!
//! Each supported body lists, for every parameter it exposes, the gphoto2
//! config path and the values it accepts. Settings are checked against this
//! table before anything is sent, so an unsupported value is a startup error
//! rather than a failed command in the middle of the night.

use serde::Serialize;
use std::fmt;

use crate::errors::ConfigurationError;

/// A camera setting the session can change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Parameter {
    ImageFormat,
    FocusMode,
    ShootingMode,
    Aperture,
    ExposureTime,
    Iso,
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Parameter::ImageFormat => "image format",
            Parameter::FocusMode => "focus mode",
            Parameter::ShootingMode => "shooting mode",
            Parameter::Aperture => "aperture",
            Parameter::ExposureTime => "exposure time",
            Parameter::Iso => "ISO",
        };
        f.write_str(name)
    }
}

/// Accepted values for one parameter.
#[derive(Debug)]
pub struct Vocabulary {
    pub config_path: &'static str,
    /// `(label, choice)` pairs: the label is what the user configures, the
    /// choice is what gets written to the config path.
    pub choices: &'static [(&'static str, &'static str)],
}

impl Vocabulary {
    fn choice_for(&self, label: &str) -> Option<&'static str> {
        self.choices
            .iter()
            .find(|(known, _)| known.eq_ignore_ascii_case(label))
            .map(|(_, choice)| *choice)
    }

    fn labels(&self) -> String {
        self.choices
            .iter()
            .map(|(label, _)| *label)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// A fully resolved configuration command, ready for a device channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetCommand {
    pub parameter: Parameter,
    /// Value as configured, e.g. `"2.0"`.
    pub label: String,
    pub config_path: &'static str,
    /// Value as the camera expects it.
    pub choice: &'static str,
}

impl fmt::Display for SetCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.config_path, self.choice)
    }
}

/// A supported camera body.
#[derive(Debug)]
pub struct CameraModel {
    pub key: &'static str,
    pub name: &'static str,
    parameters: &'static [(Parameter, Vocabulary)],
}

impl CameraModel {
    /// Find a model by its config key (case-insensitive).
    pub fn lookup(key: &str) -> Result<&'static CameraModel, ConfigurationError> {
        CAMERA_MODELS
            .iter()
            .copied()
            .find(|model| model.key.eq_ignore_ascii_case(key))
            .ok_or_else(|| ConfigurationError::UnknownCameraModel {
                model: key.to_string(),
                known: CAMERA_MODELS
                    .iter()
                    .map(|model| model.key)
                    .collect::<Vec<_>>()
                    .join(", "),
            })
    }

    pub fn vocabulary(&self, parameter: Parameter) -> Option<&'static Vocabulary> {
        self.parameters
            .iter()
            .find(|(p, _)| *p == parameter)
            .map(|(_, vocabulary)| vocabulary)
    }

    /// Resolve `label` for `parameter` into a command, or explain why the
    /// camera cannot take it.
    pub fn command(&self, parameter: Parameter, label: &str) -> Result<SetCommand, ConfigurationError> {
        let vocabulary = self
            .vocabulary(parameter)
            .ok_or_else(|| ConfigurationError::UnsupportedParameter {
                model: self.name.to_string(),
                parameter,
            })?;
        let choice = vocabulary
            .choice_for(label)
            .ok_or_else(|| ConfigurationError::UnsupportedValue {
                model: self.name.to_string(),
                parameter,
                value: label.to_string(),
                supported: vocabulary.labels(),
            })?;
        Ok(SetCommand {
            parameter,
            label: label.to_string(),
            config_path: vocabulary.config_path,
            choice,
        })
    }
}

pub static CANON_5D: CameraModel = CameraModel {
    key: "canon-5d",
    name: "Canon EOS 5D",
    parameters: &[
        (
            Parameter::ImageFormat,
            Vocabulary {
                config_path: "/main/settings/imageformat",
                choices: &[
                    ("RAW", "0"),
                    ("RAW + Large Fine JPEG", "1"),
                    ("Large Fine JPEG", "2"),
                ],
            },
        ),
        (
            Parameter::FocusMode,
            Vocabulary {
                config_path: "/main/settings/focusmode",
                choices: &[("one shot", "0"), ("ai servo", "1"), ("ai focus", "2"), ("manual", "3")],
            },
        ),
        (
            Parameter::ShootingMode,
            Vocabulary {
                config_path: "/main/capturesettings/autoexposuremode",
                choices: &[("Av", "Av"), ("Tv", "Tv"), ("M", "Manual")],
            },
        ),
        (
            Parameter::Aperture,
            Vocabulary {
                config_path: "/main/capturesettings/aperture",
                choices: &[
                    ("1.4", "1.4"),
                    ("1.8", "1.8"),
                    ("2.0", "2"),
                    ("2.8", "2.8"),
                    ("3.5", "3.5"),
                    ("4.0", "4"),
                    ("4.5", "4.5"),
                    ("5.6", "5.6"),
                    ("6.3", "6.3"),
                    ("8.0", "8"),
                ],
            },
        ),
        (
            Parameter::ExposureTime,
            Vocabulary {
                config_path: "/main/capturesettings/shutterspeed",
                choices: &[
                    ("auto", "auto"),
                    ("30", "30"),
                    ("25", "25"),
                    ("20", "20"),
                    ("15", "15"),
                    ("10", "10"),
                    ("8", "8"),
                    ("5", "5"),
                    ("4", "4"),
                    ("2", "2"),
                    ("1", "1"),
                    ("1/2", "1/2"),
                    ("1/4", "1/4"),
                    ("1/8", "1/8"),
                    ("1/15", "1/15"),
                    ("1/30", "1/30"),
                    ("1/60", "1/60"),
                    ("1/125", "1/125"),
                    ("1/250", "1/250"),
                    ("1/500", "1/500"),
                    ("1/1000", "1/1000"),
                ],
            },
        ),
        (
            Parameter::Iso,
            Vocabulary {
                config_path: "/main/imgsettings/iso",
                choices: &[
                    ("50", "50"),
                    ("100", "100"),
                    ("200", "200"),
                    ("400", "400"),
                    ("800", "800"),
                    ("1600", "1600"),
                    ("3200", "3200"),
                    ("6400", "6400"),
                    ("12800", "12800"),
                ],
            },
        ),
    ],
};

pub static CAMERA_MODELS: &[&CameraModel] = &[&CANON_5D];
