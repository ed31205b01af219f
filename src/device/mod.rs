//! Camera command channels.
//!
//! The session talks to the camera only through [`DeviceChannel`]: one call to
//! change a setting, one call to take a frame. Each call blocks until the
//! device answers or its time bound expires, and reports the raw device output
//! either way so failures can be logged verbatim.

pub mod dry_run;
pub mod gphoto;

use std::time::Duration;

use crate::errors::DeviceError;
use crate::exposure::camera::SetCommand;

pub use dry_run::DryRunChannel;
pub use gphoto::Gphoto2Channel;

/// Result of a successful device call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceOutput {
    /// Command line as it was issued.
    pub command: String,
    /// Combined stdout and stderr of the device.
    pub output: String,
}

#[cfg_attr(test, mockall::automock)]
pub trait DeviceChannel {
    /// Write one setting to the camera.
    fn set(&mut self, command: &SetCommand) -> Result<DeviceOutput, DeviceError>;

    /// Take one frame, waiting at most `timeout` for the camera to finish.
    fn trigger_exposure(&mut self, timeout: Duration) -> Result<DeviceOutput, DeviceError>;

    /// Short name for log output.
    fn channel_name(&self) -> &'static str;
}
