//! Application coordinator for a time-lapse session.
//!
//! Acquires the process-level resources a session needs (configuration,
//! lock file, signal handlers, log file, camera channel) and hands them to
//! [`Session`]. The builder covers both startup contexts:
//! - Normal startup: `Nightlapse::new(debug_enabled).with_port(port).run()`
//! - Simulation: `Nightlapse::new(debug_enabled).without_lock().with_simulated_clock(clock).run()`

use anyhow::{Context, Result};
use std::sync::Arc;

use crate::astro::SolarEphemeris;
use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::device::{DeviceChannel, DryRunChannel, Gphoto2Channel};
use crate::io::lock::{InstanceLock, default_lock_path};
use crate::io::signals::setup_signal_handler;
use crate::logger::Log;
use crate::session::{Session, SessionParams, SessionSummary};

/// Builder for configuring and running a session.
pub struct Nightlapse {
    debug_enabled: bool,
    port: Option<String>,
    create_lock: bool,
    show_headers: bool,
    simulated_clock: Option<Arc<dyn Clock>>,
}

impl Nightlapse {
    pub fn new(debug_enabled: bool) -> Self {
        Self {
            debug_enabled,
            port: None,
            create_lock: true,
            show_headers: true,
            simulated_clock: None,
        }
    }

    /// Camera port from the command line; wins over the configured one.
    pub fn with_port(mut self, port: Option<String>) -> Self {
        self.port = port;
        self
    }

    /// Skip the single-instance lock (simulations never touch a camera).
    pub fn without_lock(mut self) -> Self {
        self.create_lock = false;
        self
    }

    /// Skip the version header when the caller already printed one.
    pub fn without_headers(mut self) -> Self {
        self.show_headers = false;
        self
    }

    /// Drive the session from `clock` with a dry-run camera.
    pub fn with_simulated_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.simulated_clock = Some(clock);
        self
    }

    /// Run the session until a shutdown signal or the end of the simulation.
    pub fn run(self) -> Result<SessionSummary> {
        if self.show_headers {
            log_version!();
            if self.debug_enabled {
                log_pipe!();
                log_debug!("Verbose mode enabled - logging every camera command");
            }
        }

        let config = Config::load()?;
        self.run_with_config(config)
    }

    /// Same as [`run`](Self::run) with an already loaded configuration.
    pub fn run_with_config(self, config: Config) -> Result<SessionSummary> {
        let site = config.observer_site()?;
        let camera = config.camera()?;
        let policy = config.exposure_policy()?;
        let port = self.port.clone().or_else(|| config.port.clone());

        let _log_guard = match config.log_dir() {
            Some(dir) => Some(
                Log::start_file_logging(&dir)
                    .with_context(|| format!("Failed to start logging to {}", dir.display()))?,
            ),
            None => None,
        };

        config.log_summary()?;

        let lock = if self.create_lock {
            let lock = InstanceLock::acquire(&default_lock_path(), port.as_deref())?;
            log_block_start!("Lock acquired, starting nightlapse...");
            Some(lock)
        } else {
            None
        };

        let signal_state = setup_signal_handler(self.debug_enabled)?;

        let clock: Arc<dyn Clock> = match &self.simulated_clock {
            Some(clock) => clock.clone(),
            None => Arc::new(SystemClock),
        };
        Log::set_clock(clock.clone(), site.timezone);

        let device: Box<dyn DeviceChannel> = if clock.is_simulated() {
            Box::new(DryRunChannel::new(clock.clone(), self.debug_enabled))
        } else {
            Box::new(Gphoto2Channel::new(
                &config.gphoto2_command(),
                port,
                config.command_timeout(),
                self.debug_enabled,
            ))
        };

        let session = Session::new(SessionParams {
            site,
            camera,
            policy,
            image_format: config.image_format(),
            focus_mode: config.focus_mode(),
            exposure_timeout_margin: config.exposure_timeout_margin(),
            frame_interval: config.frame_interval(),
            device,
            ephemeris: Box::new(SolarEphemeris),
            clock,
            running: signal_state.running,
            debug_enabled: self.debug_enabled,
        })?;

        let summary = session.run();

        if let Some(lock) = lock
            && let Err(e) = lock.release()
        {
            log_warning!("Failed to release lock: {e}");
        }

        let summary = summary?;
        log_end!();
        Log::clear_clock();
        Ok(summary)
    }
}
