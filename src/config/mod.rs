//! Configuration management for nightlapse.
//!
//! Settings live in `nightlapse.toml` under `$XDG_CONFIG_HOME/nightlapse/`
//! (or the directory passed with `--config`). Every field is optional; the
//! accessors below resolve site presets and fall back to the defaults in
//! `constants.rs`.
//!
//! ## Example
//!
//! ```toml
//! site = "mko"
//! timezone = "Pacific/Honolulu"
//! camera_model = "canon-5d"
//! port = "usb:001,004"
//! night_aperture = "2.0"
//! night_exposure = "20"
//! night_iso = 1600
//! ```

pub mod builder;
pub mod loading;
pub mod validation;

use anyhow::{Context, Result, anyhow};
use chrono_tz::Tz;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::astro::ObserverSite;
use crate::constants::*;
use crate::exposure::camera::CameraModel;
use crate::exposure::{Aperture, ExposurePolicy, ExposureTime, Iso};

pub use loading::{get_config_path, get_custom_config_dir, set_config_dir};

/// Contents of `nightlapse.toml`.
#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// `"mko"`, `"mlo"` or `"custom"`.
    pub site: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub elevation: Option<f64>,
    pub temperature: Option<f64>,
    pub pressure: Option<f64>,
    pub timezone: Option<String>,

    pub camera_model: Option<String>,
    pub port: Option<String>,
    pub gphoto2: Option<String>,
    pub image_format: Option<String>,
    pub focus_mode: Option<String>,

    pub night_aperture: Option<String>,
    pub night_exposure: Option<String>,
    pub night_iso: Option<u32>,

    pub command_timeout: Option<u64>,
    pub exposure_timeout_margin: Option<u64>,
    pub frame_interval: Option<u64>,

    pub log_dir: Option<String>,
}

impl Config {
    /// Load from the default location, creating a commented default file if
    /// none exists.
    pub fn load() -> Result<Self> {
        loading::load()
    }

    pub fn load_from_path(path: &std::path::Path) -> Result<Self> {
        loading::load_from_path(path)
    }

    pub fn timezone(&self) -> Result<Tz> {
        let name = self.timezone.as_deref().unwrap_or(DEFAULT_TIMEZONE);
        name.parse::<Tz>()
            .map_err(|e| anyhow!("unknown timezone '{name}': {e}"))
    }

    fn site_key(&self) -> String {
        self.site
            .as_deref()
            .unwrap_or(DEFAULT_SITE)
            .to_ascii_lowercase()
    }

    /// The observing site: a preset with any explicitly configured field
    /// overriding it, or a fully custom site.
    pub fn observer_site(&self) -> Result<ObserverSite> {
        let key = self.site_key();
        let timezone = self.timezone()?;

        let base = if key == "custom" {
            let (Some(latitude), Some(longitude)) = (self.latitude, self.longitude) else {
                anyhow::bail!("site = \"custom\" requires latitude and longitude");
            };
            ObserverSite {
                name: "Custom site".to_string(),
                latitude,
                longitude,
                elevation: 0.0,
                temperature: STANDARD_TEMPERATURE_KELVIN - 273.0,
                pressure: STANDARD_PRESSURE,
                timezone,
            }
        } else {
            ObserverSite::preset(&key)
                .with_context(|| format!("unknown site '{key}' (expected \"mko\", \"mlo\" or \"custom\")"))?
        };

        Ok(ObserverSite {
            latitude: self.latitude.unwrap_or(base.latitude),
            longitude: self.longitude.unwrap_or(base.longitude),
            elevation: self.elevation.unwrap_or(base.elevation),
            temperature: self.temperature.unwrap_or(base.temperature),
            pressure: self.pressure.unwrap_or(base.pressure),
            timezone,
            ..base
        })
    }

    pub fn camera(&self) -> Result<&'static CameraModel> {
        let key = self.camera_model.as_deref().unwrap_or(DEFAULT_CAMERA_MODEL);
        Ok(CameraModel::lookup(key)?)
    }

    pub fn exposure_policy(&self) -> Result<ExposurePolicy> {
        let aperture = Aperture::parse(self.night_aperture.as_deref().unwrap_or(DEFAULT_NIGHT_APERTURE))
            .map_err(|e| anyhow!("night_aperture: {e}"))?;
        let exposure = ExposureTime::parse(self.night_exposure.as_deref().unwrap_or(DEFAULT_NIGHT_EXPOSURE))
            .map_err(|e| anyhow!("night_exposure: {e}"))?;
        let iso = Iso(self.night_iso.unwrap_or(DEFAULT_NIGHT_ISO));
        Ok(ExposurePolicy::new(aperture, exposure, iso))
    }

    pub fn image_format(&self) -> String {
        self.image_format
            .clone()
            .unwrap_or_else(|| DEFAULT_IMAGE_FORMAT.to_string())
    }

    pub fn focus_mode(&self) -> String {
        self.focus_mode
            .clone()
            .unwrap_or_else(|| DEFAULT_FOCUS_MODE.to_string())
    }

    pub fn gphoto2_command(&self) -> String {
        self.gphoto2
            .clone()
            .unwrap_or_else(|| DEFAULT_GPHOTO2_COMMAND.to_string())
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout.unwrap_or(DEFAULT_COMMAND_TIMEOUT))
    }

    pub fn exposure_timeout_margin(&self) -> Duration {
        Duration::from_secs(
            self.exposure_timeout_margin
                .unwrap_or(DEFAULT_EXPOSURE_TIMEOUT_MARGIN),
        )
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs(self.frame_interval.unwrap_or(DEFAULT_FRAME_INTERVAL))
    }

    /// Directory for the daily log file, with `~` expanded.
    pub fn log_dir(&self) -> Option<PathBuf> {
        self.log_dir.as_deref().map(loading::expand_home)
    }

    /// Log the resolved settings in the structured style.
    pub fn log_summary(&self) -> Result<()> {
        let site = self.observer_site()?;
        let policy = self.exposure_policy()?;
        log_block_start!("Loaded configuration");
        log_indented!(
            "Site: {} ({:.4}°, {:.4}°, {:.0} m, {} °C, {} mbar)",
            site.name,
            site.latitude,
            site.longitude,
            site.elevation,
            site.temperature,
            site.pressure
        );
        log_indented!("Timezone: {}", site.timezone);
        log_indented!("Camera: {}", self.camera()?.name);
        if let Some(port) = &self.port {
            log_indented!("Port: {port}");
        }
        log_indented!(
            "Dark sky: {}",
            policy.config_for(crate::phase::SkyPhase::Night)
        );
        if !self.frame_interval().is_zero() {
            log_indented!("Frame interval: {}s", self.frame_interval().as_secs());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests;
