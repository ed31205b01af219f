//! A camera that only logs what it would do.
//!
//! Used by `nightlapse simulate`. Each frame sleeps the clock for the exposure
//! time last written to the camera, so a simulated night is paced the way a
//! real one would be.

use std::sync::Arc;
use std::time::Duration;

use super::{DeviceChannel, DeviceOutput};
use crate::clock::Clock;
use crate::constants::DRY_RUN_AUTO_EXPOSURE_SECS;
use crate::errors::DeviceError;
use crate::exposure::ExposureTime;
use crate::exposure::camera::{Parameter, SetCommand};

pub struct DryRunChannel {
    clock: Arc<dyn Clock>,
    exposure: Option<Duration>,
    frames: u64,
    debug_enabled: bool,
}

impl DryRunChannel {
    pub fn new(clock: Arc<dyn Clock>, debug_enabled: bool) -> Self {
        Self {
            clock,
            exposure: None,
            frames: 0,
            debug_enabled,
        }
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    fn frame_duration(&self) -> Duration {
        self.exposure
            .unwrap_or(Duration::from_secs(DRY_RUN_AUTO_EXPOSURE_SECS))
    }
}

impl DeviceChannel for DryRunChannel {
    fn set(&mut self, command: &SetCommand) -> Result<DeviceOutput, DeviceError> {
        if command.parameter == Parameter::ExposureTime {
            self.exposure = ExposureTime::parse(&command.label)
                .ok()
                .and_then(|time| time.seconds())
                .map(Duration::from_secs_f64);
        }
        if self.debug_enabled {
            log_debug!("[dry-run] --set-config {command}");
        }
        Ok(DeviceOutput {
            command: format!("--set-config {command}"),
            output: String::new(),
        })
    }

    fn trigger_exposure(&mut self, timeout: Duration) -> Result<DeviceOutput, DeviceError> {
        let duration = self.frame_duration();
        if duration > timeout {
            self.clock.sleep(timeout);
            return Err(DeviceError::Timeout {
                command: "--capture-image".to_string(),
                timeout,
            });
        }
        self.clock.sleep(duration);
        self.frames += 1;
        Ok(DeviceOutput {
            command: "--capture-image".to_string(),
            output: format!("frame {} ({:.1}s)", self.frames, duration.as_secs_f64()),
        })
    }

    fn channel_name(&self) -> &'static str {
        "dry-run"
    }
}
