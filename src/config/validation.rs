//! Configuration validation.
//!
//! Rejects out-of-range values and settings the configured camera cannot
//! express before a session ever talks to the device.

use anyhow::{Context, Result};

use super::Config;
use crate::constants::*;
use crate::exposure::camera::Parameter;

/// Validate every field of a freshly parsed configuration.
pub fn validate_config(config: &Config) -> Result<()> {
    validate_site(config)?;
    validate_timings(config)?;
    validate_camera(config)?;
    Ok(())
}

fn validate_site(config: &Config) -> Result<()> {
    if let Some(lat) = config.latitude
        && !(MINIMUM_LATITUDE..=MAXIMUM_LATITUDE).contains(&lat)
    {
        anyhow::bail!(
            "latitude must be between {} and {} degrees (got {})",
            MINIMUM_LATITUDE,
            MAXIMUM_LATITUDE,
            lat
        );
    }

    if let Some(lon) = config.longitude
        && !(MINIMUM_LONGITUDE..=MAXIMUM_LONGITUDE).contains(&lon)
    {
        anyhow::bail!(
            "longitude must be between {} and {} degrees (got {})",
            MINIMUM_LONGITUDE,
            MAXIMUM_LONGITUDE,
            lon
        );
    }

    if let Some(elevation) = config.elevation
        && !(MINIMUM_ELEVATION..=MAXIMUM_ELEVATION).contains(&elevation)
    {
        anyhow::bail!(
            "elevation ({} m) must be between {} and {} metres",
            elevation,
            MINIMUM_ELEVATION,
            MAXIMUM_ELEVATION
        );
    }

    if let Some(temperature) = config.temperature
        && !(MINIMUM_TEMPERATURE..=MAXIMUM_TEMPERATURE).contains(&temperature)
    {
        anyhow::bail!(
            "temperature ({} °C) must be between {} and {} °C",
            temperature,
            MINIMUM_TEMPERATURE,
            MAXIMUM_TEMPERATURE
        );
    }

    if let Some(pressure) = config.pressure
        && !(MINIMUM_PRESSURE..=MAXIMUM_PRESSURE).contains(&pressure)
    {
        anyhow::bail!(
            "pressure ({} mbar) must be between {} and {} mbar",
            pressure,
            MINIMUM_PRESSURE,
            MAXIMUM_PRESSURE
        );
    }

    // Resolves the preset, the custom-site coordinates and the timezone
    config.observer_site()?;
    Ok(())
}

fn validate_timings(config: &Config) -> Result<()> {
    if let Some(timeout) = config.command_timeout
        && !(MINIMUM_COMMAND_TIMEOUT..=MAXIMUM_COMMAND_TIMEOUT).contains(&timeout)
    {
        anyhow::bail!(
            "command_timeout ({}s) must be between {} and {} seconds",
            timeout,
            MINIMUM_COMMAND_TIMEOUT,
            MAXIMUM_COMMAND_TIMEOUT
        );
    }

    if let Some(margin) = config.exposure_timeout_margin
        && !(MINIMUM_EXPOSURE_TIMEOUT_MARGIN..=MAXIMUM_EXPOSURE_TIMEOUT_MARGIN).contains(&margin)
    {
        anyhow::bail!(
            "exposure_timeout_margin ({}s) must be between {} and {} seconds",
            margin,
            MINIMUM_EXPOSURE_TIMEOUT_MARGIN,
            MAXIMUM_EXPOSURE_TIMEOUT_MARGIN
        );
    }

    if let Some(interval) = config.frame_interval
        && !(MINIMUM_FRAME_INTERVAL..=MAXIMUM_FRAME_INTERVAL).contains(&interval)
    {
        anyhow::bail!(
            "frame_interval ({}s) must be between {} and {} seconds",
            interval,
            MINIMUM_FRAME_INTERVAL,
            MAXIMUM_FRAME_INTERVAL
        );
    }

    if let Some(gphoto2) = &config.gphoto2
        && gphoto2.split_whitespace().next().is_none()
    {
        anyhow::bail!("gphoto2 must name a program");
    }

    Ok(())
}

fn validate_camera(config: &Config) -> Result<()> {
    let camera = config.camera()?;
    let policy = config.exposure_policy()?;
    policy
        .validate_for(camera)
        .context("night exposure settings are not available on this camera")?;

    camera.command(Parameter::ImageFormat, &config.image_format())?;
    camera.command(Parameter::FocusMode, &config.focus_mode())?;
    Ok(())
}
