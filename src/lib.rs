//! # nightlapse
//!
//! Twilight-aware time-lapse controller for DSLR cameras driven through
//! gphoto2.
//!
//! ## Architecture
//!
//! - **Entry point**: [`Nightlapse`] acquires the lock, signal handlers and
//!   camera channel, then runs a [`session::Session`]
//! - **Astronomy**: `astro` computes each night's eight horizon crossings;
//!   `phase` classifies an instant against them
//! - **Exposure**: `exposure` maps sky phases to camera settings and holds the
//!   per-model gphoto2 vocabularies
//! - **Devices**: `device` talks to the camera (gphoto2 or dry run)
//! - **Configuration**: `config` for the TOML settings file
//! - **Infrastructure**: clock, signal handling, lock file and logging

// Import macros from logger module for use in all submodules
#[macro_use]
pub mod logger;

pub mod args;
pub mod astro;
pub mod clock;
pub mod commands;
pub mod config;
pub mod constants;
pub mod device;
pub mod errors;
pub mod exposure;
pub mod io;
pub mod phase;
pub mod session;

mod nightlapse;

#[cfg(any(test, feature = "testing-support"))]
pub mod testing;

pub use crate::nightlapse::Nightlapse;
