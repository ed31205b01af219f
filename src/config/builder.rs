//! Default configuration file generation.
//!
//! The generated file lists every setting with its default and an aligned
//! comment describing the accepted range, so it doubles as documentation.

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

use super::loading::private_path;
use crate::constants::*;

/// Write a commented default `nightlapse.toml` to `path`.
pub fn create_default_config(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).context("Failed to create config directory")?;
    }

    fs::write(path, default_config_content())
        .with_context(|| format!("Failed to write default config to {}", private_path(path)))?;

    log_block_start!("Created default configuration");
    log_indented!("{}", private_path(path));
    Ok(())
}

/// Text of the default configuration file.
pub fn default_config_content() -> String {
    let content = ConfigBuilder::new()
        .add_section("Site")
        .add_setting(
            "site",
            &format!("\"{DEFAULT_SITE}\""),
            "Observatory: \"mko\" (Maunakea), \"mlo\" (Mauna Loa) or \"custom\"",
        )
        .add_setting(
            "timezone",
            &format!("\"{DEFAULT_TIMEZONE}\""),
            "IANA timezone for logs and boundary display",
        )
        .add_commented(
            "latitude",
            &format!("{MKO_LATITUDE:.6}"),
            "Overrides the preset; required for \"custom\"",
        )
        .add_commented(
            "longitude",
            &format!("{MKO_LONGITUDE:.6}"),
            "Overrides the preset; required for \"custom\"",
        )
        .add_commented(
            "elevation",
            &format!("{MKO_ELEVATION:.1}"),
            &format!("Metres above sea level ({MINIMUM_ELEVATION}-{MAXIMUM_ELEVATION})"),
        )
        .add_commented(
            "temperature",
            &format!("{MKO_TEMPERATURE:.1}"),
            &format!("Air temperature for refraction ({MINIMUM_TEMPERATURE}-{MAXIMUM_TEMPERATURE}) °C"),
        )
        .add_commented(
            "pressure",
            &format!("{MKO_PRESSURE:.1}"),
            &format!("Air pressure for refraction ({MINIMUM_PRESSURE}-{MAXIMUM_PRESSURE}) mbar"),
        )
        .add_section("Camera")
        .add_setting(
            "camera_model",
            &format!("\"{DEFAULT_CAMERA_MODEL}\""),
            "Camera settings vocabulary",
        )
        .add_commented(
            "port",
            "\"usb:001,004\"",
            "gphoto2 --port value (default: first camera found)",
        )
        .add_setting(
            "gphoto2",
            &format!("\"{DEFAULT_GPHOTO2_COMMAND}\""),
            "Program used to drive the camera, may include a prefix such as sudo",
        )
        .add_setting(
            "image_format",
            &format!("\"{DEFAULT_IMAGE_FORMAT}\""),
            "Set once at startup",
        )
        .add_setting(
            "focus_mode",
            &format!("\"{DEFAULT_FOCUS_MODE}\""),
            "Set once at startup",
        )
        .add_section("Dark sky exposure")
        .add_setting(
            "night_aperture",
            &format!("\"{DEFAULT_NIGHT_APERTURE}\""),
            "f-number used from nautical dusk to nautical dawn",
        )
        .add_setting(
            "night_exposure",
            &format!("\"{DEFAULT_NIGHT_EXPOSURE}\""),
            "Shutter speed in seconds, e.g. \"20\" or \"1/4\"",
        )
        .add_setting(
            "night_iso",
            &DEFAULT_NIGHT_ISO.to_string(),
            "ISO sensitivity",
        )
        .add_section("Timing")
        .add_setting(
            "command_timeout",
            &DEFAULT_COMMAND_TIMEOUT.to_string(),
            &format!(
                "Seconds allowed per settings command ({MINIMUM_COMMAND_TIMEOUT}-{MAXIMUM_COMMAND_TIMEOUT})"
            ),
        )
        .add_setting(
            "exposure_timeout_margin",
            &DEFAULT_EXPOSURE_TIMEOUT_MARGIN.to_string(),
            &format!(
                "Seconds allowed beyond the exposure time ({MINIMUM_EXPOSURE_TIMEOUT_MARGIN}-{MAXIMUM_EXPOSURE_TIMEOUT_MARGIN})"
            ),
        )
        .add_setting(
            "frame_interval",
            &DEFAULT_FRAME_INTERVAL.to_string(),
            &format!(
                "Minimum seconds between frame starts ({MINIMUM_FRAME_INTERVAL}-{MAXIMUM_FRAME_INTERVAL} | 0 = back to back)"
            ),
        )
        .add_section("Logging")
        .add_commented(
            "log_dir",
            "\"~/nightlapse-logs\"",
            "Also write log_YYYYMMDD.txt files here",
        );

    content.build()
}

/// Builder that keeps setting comments aligned in one column.
struct ConfigBuilder {
    entries: Vec<Entry>,
}

enum Entry {
    Section(String),
    Setting { line: String, comment: String },
}

impl ConfigBuilder {
    fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    fn add_section(mut self, title: &str) -> Self {
        self.entries.push(Entry::Section(format!("#[{title}]")));
        self
    }

    fn add_setting(mut self, key: &str, value: &str, comment: &str) -> Self {
        self.entries.push(Entry::Setting {
            line: format!("{key} = {value}"),
            comment: format!("# {comment}"),
        });
        self
    }

    /// A setting shown with its example value but left disabled.
    fn add_commented(self, key: &str, value: &str, comment: &str) -> Self {
        self.add_setting(&format!("# {key}"), value, comment)
    }

    fn build(self) -> String {
        let width = self
            .entries
            .iter()
            .filter_map(|entry| match entry {
                Entry::Setting { line, .. } => Some(line.len()),
                Entry::Section(_) => None,
            })
            .max()
            .unwrap_or(0)
            + 1;

        let mut lines = Vec::new();
        for entry in self.entries {
            match entry {
                Entry::Section(title) => {
                    if !lines.is_empty() {
                        lines.push(String::new());
                    }
                    lines.push(title);
                }
                Entry::Setting { line, comment } => {
                    lines.push(format!("{line:<width$}{comment}"));
                }
            }
        }
        lines.push(String::new());
        lines.join("\n")
    }
}
