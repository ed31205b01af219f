//! Unix signal handling.
//!
//! SIGINT, SIGTERM and SIGHUP clear the shared `running` flag. The session
//! notices it between device calls, so the command in flight always
//! completes. A second signal while that call is still running kills the
//! camera command in flight and exits immediately.

use anyhow::{Context, Result};
use signal_hook::{
    consts::signal::{SIGHUP, SIGINT, SIGTERM},
    iterator::Signals,
};
use std::{
    sync::Arc,
    sync::atomic::{AtomicBool, Ordering},
    thread,
};

use crate::constants::EXIT_FAILURE;
use crate::device::gphoto::kill_running_commands;

/// Signal handling state shared with the session.
pub struct SignalState {
    /// Cleared once a shutdown signal arrives.
    pub running: Arc<AtomicBool>,
}

/// What to do about one received signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalAction {
    /// Finish the current device call, then stop.
    Shutdown,
    /// A shutdown was already requested; abort the camera command and stop.
    ForceExit,
    Ignore,
}

fn signal_name(sig: i32) -> &'static str {
    match sig {
        SIGINT => "SIGINT",
        SIGTERM => "SIGTERM",
        SIGHUP => "SIGHUP",
        _ => "signal",
    }
}

/// Decide how to react to `sig` and update `running` accordingly.
pub fn handle_signal(sig: i32, running: &AtomicBool) -> SignalAction {
    match sig {
        SIGINT | SIGTERM | SIGHUP => {
            if running.swap(false, Ordering::SeqCst) {
                SignalAction::Shutdown
            } else {
                SignalAction::ForceExit
            }
        }
        _ => SignalAction::Ignore,
    }
}

/// Register the handlers and spawn the thread that watches for signals.
pub fn setup_signal_handler(debug_enabled: bool) -> Result<SignalState> {
    let running = Arc::new(AtomicBool::new(true));

    let mut signals =
        Signals::new([SIGINT, SIGTERM, SIGHUP]).context("failed to register signal handlers")?;

    let running_clone = running.clone();
    thread::spawn(move || {
        for sig in signals.forever() {
            if debug_enabled {
                log_pipe!();
                log_debug!("Received {} (PID {})", signal_name(sig), std::process::id());
            }
            match handle_signal(sig, &running_clone) {
                SignalAction::Shutdown => {
                    log_pipe!();
                    log_info!(
                        "Received {}, stopping after the current camera command",
                        signal_name(sig)
                    );
                }
                SignalAction::ForceExit => {
                    log_pipe!();
                    log_warning!("Received {} again, exiting immediately", signal_name(sig));
                    let killed = kill_running_commands();
                    if killed > 0 {
                        log_indented!("Aborted {killed} camera command(s) in flight");
                    }
                    log_end!();
                    std::process::exit(EXIT_FAILURE);
                }
                SignalAction::Ignore => {}
            }
        }
    });

    Ok(SignalState { running })
}
