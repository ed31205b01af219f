//! The imaging session loop.
//!
//! One tick: read the clock, roll over to the next night once sunrise has
//! passed, classify the sky, push whatever settings changed since the last
//! confirmed state, then take a frame. Device failures are logged and retried
//! on the next tick. Configuration and ephemeris failures end the session.

pub mod camera_state;

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::astro::display::log_boundaries;
use crate::astro::{EphemerisProvider, ObserverSite, PhaseBoundarySet, compute_boundaries, next_night};
use crate::clock::Clock;
use crate::constants::{CHECK_INTERVAL_SECS, FAILED_EXPOSURE_BACKOFF_SECS};
use crate::device::DeviceChannel;
use crate::errors::SessionError;
use crate::exposure::camera::{CameraModel, Parameter, SetCommand};
use crate::exposure::{ExposureConfig, ExposurePolicy};
use crate::phase::{SkyPhase, classify, next_transition};

pub use camera_state::CameraState;

/// Everything a session needs, bundled to keep [`Session::new`] readable.
pub struct SessionParams {
    pub site: ObserverSite,
    pub camera: &'static CameraModel,
    pub policy: ExposurePolicy,
    /// Written once at startup.
    pub image_format: String,
    /// Written once at startup.
    pub focus_mode: String,
    /// Added to the exposure time to bound a capture.
    pub exposure_timeout_margin: Duration,
    /// Minimum time between frame starts; zero for back-to-back frames.
    pub frame_interval: Duration,
    pub device: Box<dyn DeviceChannel>,
    pub ephemeris: Box<dyn EphemerisProvider>,
    pub clock: Arc<dyn Clock>,
    pub running: Arc<AtomicBool>,
    pub debug_enabled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    ConfiguringCamera,
    Exposing,
}

/// What happened during one tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickReport {
    pub now: DateTime<Utc>,
    pub phase: SkyPhase,
    pub rolled_over: bool,
    pub commands_applied: usize,
    pub commands_failed: usize,
    pub exposed: bool,
}

/// Running totals, reported at shutdown.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionSummary {
    pub frames: u64,
    pub failed_exposures: u64,
    pub failed_commands: u64,
    pub nights: u32,
}

pub struct Session {
    site: ObserverSite,
    camera: &'static CameraModel,
    policy: ExposurePolicy,
    exposure_timeout_margin: Duration,
    frame_interval: Duration,
    device: Box<dyn DeviceChannel>,
    ephemeris: Box<dyn EphemerisProvider>,
    clock: Arc<dyn Clock>,
    running: Arc<AtomicBool>,
    debug_enabled: bool,

    startup_commands: Vec<SetCommand>,
    boundaries: PhaseBoundarySet,
    camera_state: CameraState,
    state: SessionState,
    phase: Option<SkyPhase>,
    summary: SessionSummary,
}

impl Session {
    /// Validate every setting the session may send and compute the current
    /// night. Nothing is sent to the device yet.
    pub fn new(params: SessionParams) -> Result<Self, SessionError> {
        let camera = params.camera;
        params.policy.validate_for(camera)?;
        let startup_commands = vec![
            camera.command(Parameter::ImageFormat, &params.image_format)?,
            camera.command(Parameter::FocusMode, &params.focus_mode)?,
        ];

        let boundaries = compute_boundaries(params.ephemeris.as_ref(), &params.site, params.clock.now())?;

        log_block_start!(
            "Session at {} ({:.4}°, {:.4}°, {:.0} m)",
            params.site.name,
            params.site.latitude,
            params.site.longitude,
            params.site.elevation
        );
        log_indented!("Camera: {} via {}", camera.name, params.device.channel_name());
        log_boundaries(params.ephemeris.as_ref(), &params.site, &boundaries);

        Ok(Self {
            site: params.site,
            camera,
            policy: params.policy,
            exposure_timeout_margin: params.exposure_timeout_margin,
            frame_interval: params.frame_interval,
            device: params.device,
            ephemeris: params.ephemeris,
            clock: params.clock,
            running: params.running,
            debug_enabled: params.debug_enabled,
            startup_commands,
            boundaries,
            camera_state: CameraState::default(),
            state: SessionState::Idle,
            phase: None,
            summary: SessionSummary {
                nights: 1,
                ..SessionSummary::default()
            },
        })
    }

    pub fn boundaries(&self) -> &PhaseBoundarySet {
        &self.boundaries
    }

    pub fn camera_state(&self) -> &CameraState {
        &self.camera_state
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn current_phase(&self) -> Option<SkyPhase> {
        self.phase
    }

    pub fn summary(&self) -> &SessionSummary {
        &self.summary
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Write image format and focus mode. Failures are reported but not
    /// retried.
    pub fn apply_startup_settings(&mut self) {
        log_block_start!("Preparing camera");
        for command in std::mem::take(&mut self.startup_commands) {
            if !self.is_running() {
                break;
            }
            match self.device.set(&command) {
                Ok(_) => log_decorated!("{} set to {}", command.parameter, command.label),
                Err(e) => {
                    self.summary.failed_commands += 1;
                    log_warning!("Could not set {} to {}: {e}", command.parameter, command.label);
                    if !e.output().is_empty() {
                        log_indented!("Device output: {}", e.output());
                    }
                }
            }
        }
    }

    /// Run one tick: roll over if due, classify, apply changes, expose.
    pub fn tick(&mut self) -> Result<TickReport, SessionError> {
        let now = self.clock.now();
        let rolled_over = self.roll_over_if_needed(now)?;

        let phase = classify(now, &self.boundaries);
        let desired = self.policy.config_for(phase);
        if self.phase != Some(phase) {
            self.announce_phase(phase, &desired, now);
            self.phase = Some(phase);
        }

        self.state = SessionState::ConfiguringCamera;
        let (commands_applied, commands_failed) = self.apply_changes(phase, &desired)?;

        let exposed = if self.is_running() {
            self.state = SessionState::Exposing;
            self.expose(phase)
        } else {
            false
        };
        self.state = SessionState::Idle;

        Ok(TickReport {
            now,
            phase,
            rolled_over,
            commands_applied,
            commands_failed,
            exposed,
        })
    }

    /// Tick until shutdown is requested or a simulated clock runs out.
    pub fn run(mut self) -> Result<SessionSummary, SessionError> {
        self.apply_startup_settings();

        'main_loop: while self.is_running() && !self.clock.is_ended() {
            let started = self.clock.now();
            let report = self.tick()?;

            if !report.exposed {
                self.pause(Duration::from_secs(FAILED_EXPOSURE_BACKOFF_SECS));
                continue 'main_loop;
            }

            let elapsed = (self.clock.now() - started).to_std().unwrap_or_default();
            if let Some(remaining) = self.frame_interval.checked_sub(elapsed) {
                self.pause(remaining);
            }
        }

        log_block_start!("Session finished");
        log_indented!("Frames captured: {}", self.summary.frames);
        log_indented!("Nights covered: {}", self.summary.nights);
        if self.summary.failed_exposures > 0 || self.summary.failed_commands > 0 {
            log_indented!(
                "Failures: {} exposures, {} commands",
                self.summary.failed_exposures,
                self.summary.failed_commands
            );
        }
        Ok(self.summary)
    }

    fn roll_over_if_needed(&mut self, now: DateTime<Utc>) -> Result<bool, SessionError> {
        if now < self.boundaries.sunrise() {
            return Ok(false);
        }
        let next = next_night(self.ephemeris.as_ref(), &self.site, &self.boundaries, now)?;
        if self.debug_enabled {
            log_pipe!();
            log_debug!(
                "Rolled over from anchor {} to {}",
                self.boundaries.anchor(),
                next.anchor()
            );
        }
        self.boundaries = next;
        self.summary.nights += 1;
        log_boundaries(self.ephemeris.as_ref(), &self.site, &self.boundaries);
        Ok(true)
    }

    fn announce_phase(&self, phase: SkyPhase, desired: &ExposureConfig, now: DateTime<Utc>) {
        log_block_start!("It is {phase}. {desired}");
        if let Some((next, at)) = next_transition(now, &self.boundaries) {
            log_indented!(
                "{} begins at {}",
                next,
                self.site.local_time(at).format("%H:%M:%S %Z")
            );
        }
    }

    /// Send each pending setting; returns (applied, failed).
    fn apply_changes(
        &mut self,
        phase: SkyPhase,
        desired: &ExposureConfig,
    ) -> Result<(usize, usize), SessionError> {
        let mut applied = 0;
        let mut failed = 0;

        for (parameter, label) in self.camera_state.pending_changes(desired) {
            if !self.is_running() {
                break;
            }
            let command = self.camera.command(parameter, &label)?;
            match self.device.set(&command) {
                Ok(output) => {
                    self.camera_state.confirm(parameter, desired);
                    applied += 1;
                    if self.debug_enabled {
                        log_debug!("{parameter} set to {label}");
                        if !output.output.is_empty() {
                            log_indented!("{}", output.output);
                        }
                    }
                }
                Err(e) => {
                    failed += 1;
                    self.summary.failed_commands += 1;
                    log_pipe!();
                    log_error!("Failed to set {parameter} to {label} during {phase}: {e}");
                    if !e.output().is_empty() {
                        log_indented!("Device output: {}", e.output());
                    }
                    log_indented!("Will retry on next exposure...");
                }
            }
        }

        Ok((applied, failed))
    }

    /// Capture bound: the applied exposure time plus the margin. With an
    /// automatic shutter only the margin applies.
    fn exposure_timeout(&self) -> Duration {
        let exposure = self
            .camera_state
            .applied()
            .exposure_time
            .as_ref()
            .and_then(|time| time.seconds())
            .map(Duration::from_secs_f64)
            .unwrap_or_default();
        exposure + self.exposure_timeout_margin
    }

    fn expose(&mut self, phase: SkyPhase) -> bool {
        match self.device.trigger_exposure(self.exposure_timeout()) {
            Ok(output) => {
                self.summary.frames += 1;
                if self.debug_enabled {
                    log_debug!("Frame {} captured", self.summary.frames);
                    if !output.output.is_empty() {
                        log_indented!("{}", output.output);
                    }
                }
                true
            }
            Err(e) => {
                self.summary.failed_exposures += 1;
                log_pipe!();
                log_error!("Exposure failed during {phase}: {e}");
                log_indented!("Camera settings: {}", self.camera_state.applied());
                if !e.output().is_empty() {
                    log_indented!("Device output: {}", e.output());
                }
                log_indented!("Will retry on next tick...");
                false
            }
        }
    }

    /// Sleep in short steps so a shutdown request is honoured promptly.
    fn pause(&self, duration: Duration) {
        let step = Duration::from_secs(CHECK_INTERVAL_SECS);
        let mut remaining = duration;
        while !remaining.is_zero() && self.is_running() && !self.clock.is_ended() {
            let slice = remaining.min(step);
            self.clock.sleep(slice);
            remaining -= slice;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SimulatedClock;
    use crate::device::{DeviceOutput, MockDeviceChannel};
    use crate::errors::{DeviceError, EphemerisError};
    use crate::exposure::camera::CANON_5D;
    use crate::exposure::{ExposureTime, policy_for};
    use crate::testing::{DeviceCall, FixedEphemeris, ScriptedDevice};
    use chrono::{Duration as ChronoDuration, TimeZone};

    fn anchor() -> DateTime<Utc> {
        // 2013-08-23 12:00 HST
        Utc.with_ymd_and_hms(2013, 8, 23, 22, 0, 0).unwrap()
    }

    fn ephemeris() -> FixedEphemeris {
        FixedEphemeris::evenly_spaced(anchor())
    }

    fn clock_at(start: DateTime<Utc>) -> Arc<SimulatedClock> {
        Arc::new(SimulatedClock::fast_forward(start, start + ChronoDuration::days(3)))
    }

    fn params(device: Box<dyn DeviceChannel>, clock: Arc<SimulatedClock>) -> SessionParams {
        SessionParams {
            site: ObserverSite::maunakea(),
            camera: &CANON_5D,
            policy: ExposurePolicy::default(),
            image_format: "RAW".to_string(),
            focus_mode: "manual".to_string(),
            exposure_timeout_margin: Duration::from_secs(30),
            frame_interval: Duration::ZERO,
            device,
            ephemeris: Box::new(ephemeris()),
            clock,
            running: Arc::new(AtomicBool::new(true)),
            debug_enabled: false,
        }
    }

    fn ok_output() -> Result<DeviceOutput, DeviceError> {
        Ok(DeviceOutput::default())
    }

    #[test]
    fn test_night_tick_applies_manual_settings() {
        let night = ephemeris().boundaries().astronomical_end() + ChronoDuration::minutes(5);
        let device = ScriptedDevice::new();
        let mut session = Session::new(params(Box::new(device.clone()), clock_at(night))).unwrap();

        let report = session.tick().unwrap();

        assert_eq!(report.phase, SkyPhase::Night);
        assert!(report.exposed);
        assert_eq!(
            device.set_calls(),
            vec![
                (Parameter::ShootingMode, "M".to_string()),
                (Parameter::Aperture, "2.0".to_string()),
                (Parameter::ExposureTime, "20".to_string()),
                (Parameter::Iso, "1600".to_string()),
            ]
        );
        assert_eq!(session.camera_state().applied(), &policy_for(SkyPhase::Night));
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[test]
    fn test_unchanged_config_sends_no_commands() {
        let night = ephemeris().boundaries().astronomical_end();
        let mut device = MockDeviceChannel::new();
        device.expect_channel_name().return_const("mock");
        device.expect_set().times(4).returning(|_| ok_output());
        device.expect_trigger_exposure().times(3).returning(|_| ok_output());

        let mut session = Session::new(params(Box::new(device), clock_at(night))).unwrap();
        for _ in 0..3 {
            session.tick().unwrap();
        }
    }

    #[test]
    fn test_failed_aperture_is_retried_next_tick() {
        let night = ephemeris().boundaries().astronomical_end() + ChronoDuration::minutes(1);
        let mut device = MockDeviceChannel::new();
        device.expect_channel_name().return_const("mock");

        // Rejected on the first attempt, accepted on the retry
        let mut aperture_attempts = 0;
        device
            .expect_set()
            .withf(|c| c.parameter == Parameter::Aperture && c.label == "2.0")
            .times(2)
            .returning(move |c| {
                aperture_attempts += 1;
                if aperture_attempts == 1 {
                    Err(DeviceError::Command {
                        command: c.to_string(),
                        output: "*** Error: busy ***".to_string(),
                    })
                } else {
                    ok_output()
                }
            });
        device
            .expect_set()
            .withf(|c| c.parameter != Parameter::Aperture)
            .times(3)
            .returning(|_| ok_output());
        device.expect_trigger_exposure().times(2).returning(|_| ok_output());

        let mut session = Session::new(params(Box::new(device), clock_at(night))).unwrap();

        let first = session.tick().unwrap();
        assert_eq!(first.commands_failed, 1);
        assert_eq!(session.camera_state().applied().aperture, None);
        assert_eq!(
            session.camera_state().applied().exposure_time,
            Some(ExposureTime::Fixed("20".to_string()))
        );

        let second = session.tick().unwrap();
        assert_eq!(second.commands_applied, 1);
        assert_eq!(session.camera_state().applied(), &policy_for(SkyPhase::Night));
    }

    #[test]
    fn test_failed_exposure_does_not_end_session() {
        let night = ephemeris().boundaries().astronomical_end();
        let device = ScriptedDevice::new();
        device.fail_exposures(1);
        let mut session = Session::new(params(Box::new(device.clone()), clock_at(night))).unwrap();

        assert!(!session.tick().unwrap().exposed);
        assert!(session.tick().unwrap().exposed);
        assert_eq!(session.summary().failed_exposures, 1);
        assert_eq!(session.summary().frames, 1);
    }

    #[test]
    fn test_exposure_bound_includes_applied_exposure_time() {
        let night = ephemeris().boundaries().astronomical_end();
        let device = ScriptedDevice::new();
        let mut session = Session::new(params(Box::new(device.clone()), clock_at(night))).unwrap();

        session.tick().unwrap();
        assert_eq!(
            device.calls().last(),
            Some(&DeviceCall::Expose {
                timeout: Duration::from_secs(50)
            })
        );
    }

    #[test]
    fn test_sunrise_passing_rolls_over_to_next_night() {
        let boundaries = ephemeris().boundaries();
        let clock = clock_at(boundaries.civil_begin());
        let device = ScriptedDevice::new();
        let mut session = Session::new(params(Box::new(device), clock.clone())).unwrap();

        assert_eq!(session.tick().unwrap().phase, SkyPhase::MorningCivilTwilight);

        clock.sleep(Duration::from_secs(45 * 60));
        let report = session.tick().unwrap();

        assert!(report.rolled_over);
        assert_eq!(report.phase, SkyPhase::Day);
        assert_eq!(session.boundaries().anchor(), anchor() + ChronoDuration::days(1));
        assert!(session.boundaries().sunrise() > report.now);

        // Later ticks on the same day do not recompute again
        clock.sleep(Duration::from_secs(60));
        assert!(!session.tick().unwrap().rolled_over);
        assert_eq!(session.summary().nights, 2);
    }

    #[test]
    fn test_rollover_failure_is_fatal() {
        let boundaries = ephemeris().boundaries();
        let clock = clock_at(boundaries.sunrise() - ChronoDuration::minutes(1));
        let mut p = params(Box::new(ScriptedDevice::new()), clock.clone());
        p.ephemeris = Box::new(ephemeris().frozen());
        let mut session = Session::new(p).unwrap();

        session.tick().unwrap();
        clock.sleep(Duration::from_secs(120));

        let result = session.tick();
        assert!(matches!(result, Err(SessionError::Ephemeris(_))));
    }

    #[test]
    fn test_unsupported_policy_is_rejected_before_anything_is_sent() {
        let device = ScriptedDevice::new();
        let mut p = params(Box::new(device.clone()), clock_at(anchor()));
        p.policy = ExposurePolicy::new(
            crate::exposure::Aperture::parse("1.0").unwrap(),
            ExposureTime::Fixed("20".to_string()),
            crate::exposure::Iso(1600),
        );

        let result = Session::new(p);
        assert!(matches!(result, Err(SessionError::Configuration(_))));
        assert!(device.calls().is_empty());
    }

    #[test]
    fn test_missing_crossing_fails_at_startup() {
        let mut p = params(Box::new(ScriptedDevice::new()), clock_at(anchor()));
        p.ephemeris = Box::new(ephemeris().without(crate::astro::Horizon::Nautical));

        let result = Session::new(p);
        assert!(matches!(
            result,
            Err(SessionError::Ephemeris(EphemerisError::NoCrossing { .. }))
        ));
    }

    #[test]
    fn test_startup_settings_are_sent_once() {
        let device = ScriptedDevice::new();
        let mut session = Session::new(params(Box::new(device.clone()), clock_at(anchor()))).unwrap();

        session.apply_startup_settings();
        session.apply_startup_settings();

        assert_eq!(
            device.set_calls(),
            vec![
                (Parameter::ImageFormat, "RAW".to_string()),
                (Parameter::FocusMode, "manual".to_string()),
            ]
        );
    }

    #[test]
    fn test_shutdown_request_skips_exposure() {
        let device = ScriptedDevice::new();
        let p = params(Box::new(device.clone()), clock_at(anchor()));
        let running = p.running.clone();
        let mut session = Session::new(p).unwrap();

        running.store(false, Ordering::SeqCst);
        let report = session.tick().unwrap();

        assert!(!report.exposed);
        assert_eq!(device.exposures(), 0);
    }
}
