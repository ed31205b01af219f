//! Application constants and default values for nightlapse.
//!
//! Configuration defaults, validation limits, observatory presets and the
//! operational timing constants used throughout the session loop.

// ═══ Application Configuration Defaults ═══
// Used when a config option is not specified by the user

pub const DEFAULT_SITE: &str = "mko";
pub const DEFAULT_TIMEZONE: &str = "Pacific/Honolulu";
pub const DEFAULT_CAMERA_MODEL: &str = "canon-5d";
pub const DEFAULT_GPHOTO2_COMMAND: &str = "gphoto2";
pub const DEFAULT_IMAGE_FORMAT: &str = "RAW";
pub const DEFAULT_FOCUS_MODE: &str = "manual";
pub const DEFAULT_NIGHT_APERTURE: &str = "2.0"; // f-number
pub const DEFAULT_NIGHT_EXPOSURE: &str = "20"; // seconds
pub const DEFAULT_NIGHT_ISO: u32 = 1600;
pub const DEFAULT_COMMAND_TIMEOUT: u64 = 10; // seconds
pub const DEFAULT_EXPOSURE_TIMEOUT_MARGIN: u64 = 30; // seconds on top of the exposure time
pub const DEFAULT_FRAME_INTERVAL: u64 = 0; // seconds, 0 = exposure-bound cadence

pub const CONFIG_FILE_NAME: &str = "nightlapse.toml";
pub const LOCK_FILE_NAME: &str = "nightlapse.lock";
pub const LOG_FILE_PREFIX: &str = "log_";

// ═══ Observatory Presets ═══

// Maunakea Observatories
pub const MKO_LATITUDE: f64 = 19.825_503; // +19:49:31.81
pub const MKO_LONGITUDE: f64 = -155.476_028; // -155:28:33.7
pub const MKO_ELEVATION: f64 = 4200.0; // metres
pub const MKO_TEMPERATURE: f64 = 1.0; // °C
pub const MKO_PRESSURE: f64 = 625.0; // mbar

// Mauna Loa Observatory
pub const MLO_LATITUDE: f64 = 19.536_017; // +19:32:09.66
pub const MLO_LONGITUDE: f64 = -155.576_083; // -155:34:33.9
pub const MLO_ELEVATION: f64 = 3400.0;
pub const MLO_TEMPERATURE: f64 = 10.0;
pub const MLO_PRESSURE: f64 = 680.0;

// ═══ Validation Limits ═══

pub const MINIMUM_LATITUDE: f64 = -90.0;
pub const MAXIMUM_LATITUDE: f64 = 90.0;
pub const MINIMUM_LONGITUDE: f64 = -180.0;
pub const MAXIMUM_LONGITUDE: f64 = 180.0;

pub const MINIMUM_ELEVATION: f64 = -500.0; // metres (Dead Sea shore and below)
pub const MAXIMUM_ELEVATION: f64 = 9000.0;

pub const MINIMUM_PRESSURE: f64 = 0.0; // mbar
pub const MAXIMUM_PRESSURE: f64 = 1100.0;

pub const MINIMUM_TEMPERATURE: f64 = -80.0; // °C
pub const MAXIMUM_TEMPERATURE: f64 = 60.0;

pub const MINIMUM_COMMAND_TIMEOUT: u64 = 1; // seconds
pub const MAXIMUM_COMMAND_TIMEOUT: u64 = 120;

pub const MINIMUM_EXPOSURE_TIMEOUT_MARGIN: u64 = 1; // seconds
pub const MAXIMUM_EXPOSURE_TIMEOUT_MARGIN: u64 = 600;

pub const MINIMUM_FRAME_INTERVAL: u64 = 0; // seconds
pub const MAXIMUM_FRAME_INTERVAL: u64 = 3600;

// ═══ Horizon Depressions ═══
// Degrees below the horizon that close each twilight band

pub const GEOMETRIC_HORIZON_DEGREES: f64 = 0.0;
pub const CIVIL_TWILIGHT_DEGREES: f64 = -6.0;
pub const NAUTICAL_TWILIGHT_DEGREES: f64 = -12.0;
pub const ASTRONOMICAL_TWILIGHT_DEGREES: f64 = -18.0;

// ═══ Ephemeris Constants ═══

pub const NIGHT_ANCHOR_HOUR: u32 = 12; // local noon
pub const MAX_CROSSING_SEARCH_HOURS: i64 = 36; // a night's crossings all fall within this window of its anchor
pub const MAX_ROLLOVER_ATTEMPTS: usize = 3; // recomputes per rollover before giving up
pub const CROSSING_SEED_WINDOW_MINUTES: i64 = 60; // search radius around the `sunrise` estimate
pub const CROSSING_PRECISION_MS: i64 = 500; // bisection stops below this bracket width

// Standard atmosphere used to scale the refraction correction
pub const STANDARD_PRESSURE: f64 = 1010.0; // mbar
pub const STANDARD_TEMPERATURE_KELVIN: f64 = 283.0;

// ═══ Operational Timing Constants ═══

pub const DEVICE_POLL_INTERVAL_MS: u64 = 50; // how often a running gphoto2 child is polled
pub const CHECK_INTERVAL_SECS: u64 = 1; // how often the running flag is checked while pacing
pub const FAILED_EXPOSURE_BACKOFF_SECS: u64 = 5; // pause after a failed trigger before the next tick
pub const DRY_RUN_AUTO_EXPOSURE_SECS: u64 = 30; // simulated cadence when the camera picks the shutter speed
pub const DEFAULT_SIMULATION_MULTIPLIER: f64 = 3600.0; // one simulated hour per second

// ═══ Exit Codes ═══

pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILURE: i32 = 1;
