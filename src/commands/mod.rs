//! One-shot command handlers.
//!
//! `times` reports a night's boundaries without touching the camera;
//! `simulate` replays the session loop on a simulated clock.

pub mod simulate;
pub mod times;
