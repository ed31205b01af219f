use super::validation::validate_config;
use super::*;
use crate::exposure::ShootingMode;
use crate::phase::SkyPhase;
use serial_test::serial;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

fn parse(content: &str) -> Config {
    toml::from_str(content).unwrap()
}

/// Run `f` with `XDG_CONFIG_HOME` pointed at `dir`, restoring it afterwards.
fn with_config_home<T>(dir: &Path, f: impl FnOnce() -> T) -> T {
    let original = std::env::var("XDG_CONFIG_HOME").ok();
    unsafe {
        std::env::set_var("XDG_CONFIG_HOME", dir);
    }

    let result = f();

    unsafe {
        match original {
            Some(val) => std::env::set_var("XDG_CONFIG_HOME", val),
            None => std::env::remove_var("XDG_CONFIG_HOME"),
        }
    }
    result
}

#[test]
#[serial]
fn test_config_load_default_creation() {
    let temp_dir = tempdir().unwrap();
    let config_path = temp_dir.path().join("nightlapse").join("nightlapse.toml");

    let result = with_config_home(temp_dir.path(), Config::load);

    if let Err(e) = &result {
        eprintln!("Config::load() failed: {:?}", e);
    }
    let config = result.unwrap();
    assert!(config_path.exists());
    assert_eq!(config.site.as_deref(), Some("mko"));
}

#[test]
#[serial]
fn test_config_load_keeps_existing_file() {
    let temp_dir = tempdir().unwrap();
    let dir = temp_dir.path().join("nightlapse");
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("nightlapse.toml"), "site = \"mlo\"\nnight_iso = 800\n").unwrap();

    let config = with_config_home(temp_dir.path(), Config::load).unwrap();

    assert_eq!(config.site.as_deref(), Some("mlo"));
    assert_eq!(config.night_iso, Some(800));
    let content = fs::read_to_string(dir.join("nightlapse.toml")).unwrap();
    assert_eq!(content, "site = \"mlo\"\nnight_iso = 800\n");
}

#[test]
fn test_load_from_missing_path_is_an_error() {
    let temp_dir = tempdir().unwrap();
    let result = Config::load_from_path(&temp_dir.path().join("absent.toml"));
    assert!(result.is_err());
    assert!(format!("{:#}", result.unwrap_err()).contains("not found"));
}

#[test]
fn test_load_from_path_reports_parse_errors() {
    let temp_dir = tempdir().unwrap();
    let path = temp_dir.path().join("nightlapse.toml");
    fs::write(&path, "night_iso = \"lots\"\n").unwrap();
    assert!(Config::load_from_path(&path).is_err());
}

#[test]
fn test_unknown_keys_are_rejected() {
    let result: Result<Config, _> = toml::from_str("sunset = \"19:00:00\"\n");
    assert!(result.is_err());
}

#[test]
fn test_empty_config_uses_defaults() {
    let config = Config::default();
    validate_config(&config).unwrap();

    let site = config.observer_site().unwrap();
    assert_eq!(site, ObserverSite::maunakea());
    assert_eq!(config.camera().unwrap().key, "canon-5d");
    assert_eq!(config.command_timeout(), Duration::from_secs(10));
    assert_eq!(config.exposure_timeout_margin(), Duration::from_secs(30));
    assert!(config.frame_interval().is_zero());
    assert_eq!(config.gphoto2_command(), "gphoto2");
    assert_eq!(config.image_format(), "RAW");
    assert_eq!(config.focus_mode(), "manual");
    assert!(config.log_dir().is_none());

    let night = config.exposure_policy().unwrap().config_for(SkyPhase::Night);
    assert_eq!(night.mode, Some(ShootingMode::Manual));
    assert_eq!(night.to_string(), "Mode = M. Av = f/2.0. Tv = 20s. ISO = 1600.");
}

#[test]
fn test_preset_fields_can_be_overridden() {
    let config = parse("site = \"mlo\"\nelevation = 3397.0\npressure = 670.0\n");
    let site = config.observer_site().unwrap();
    assert_eq!(site.name, "Mauna Loa");
    assert_eq!(site.latitude, MLO_LATITUDE);
    assert_eq!(site.elevation, 3397.0);
    assert_eq!(site.pressure, 670.0);
    assert_eq!(site.temperature, MLO_TEMPERATURE);
}

#[test]
fn test_custom_site() {
    let config = parse(
        "site = \"custom\"\nlatitude = 52.52\nlongitude = 13.405\ntimezone = \"Europe/Berlin\"\n",
    );
    validate_config(&config).unwrap();
    let site = config.observer_site().unwrap();
    assert_eq!(site.latitude, 52.52);
    assert_eq!(site.longitude, 13.405);
    assert_eq!(site.elevation, 0.0);
    assert_eq!(site.timezone, chrono_tz::Europe::Berlin);
}

#[test]
fn test_custom_site_requires_coordinates() {
    let config = parse("site = \"custom\"\nlatitude = 52.52\n");
    let err = validate_config(&config).unwrap_err();
    assert!(err.to_string().contains("latitude and longitude"));
}

#[test]
fn test_unknown_site_and_timezone_are_rejected() {
    assert!(validate_config(&parse("site = \"palomar\"\n")).is_err());
    assert!(validate_config(&parse("timezone = \"Mars/Olympus_Mons\"\n")).is_err());
}

#[test]
fn test_site_ranges() {
    for content in [
        "latitude = 91.0\n",
        "longitude = -180.5\n",
        "elevation = 12000.0\n",
        "temperature = -100.0\n",
        "pressure = 2000.0\n",
    ] {
        assert!(
            validate_config(&parse(content)).is_err(),
            "accepted {content:?}"
        );
    }

    // Boundaries are inclusive
    validate_config(&parse("latitude = 90.0\nlongitude = -180.0\n")).unwrap();
}

#[test]
fn test_timing_ranges() {
    assert!(validate_config(&parse("command_timeout = 0\n")).is_err());
    assert!(validate_config(&parse("command_timeout = 121\n")).is_err());
    assert!(validate_config(&parse("exposure_timeout_margin = 0\n")).is_err());
    assert!(validate_config(&parse("frame_interval = 3601\n")).is_err());
    assert!(validate_config(&parse("gphoto2 = \"  \"\n")).is_err());

    let config = parse("command_timeout = 120\nexposure_timeout_margin = 600\nframe_interval = 60\n");
    validate_config(&config).unwrap();
    assert_eq!(config.frame_interval(), Duration::from_secs(60));
}

#[test]
fn test_exposure_settings_must_exist_on_the_camera() {
    assert!(validate_config(&parse("night_aperture = \"1.9\"\n")).is_err());
    assert!(validate_config(&parse("night_exposure = \"45\"\n")).is_err());
    assert!(validate_config(&parse("night_iso = 1000\n")).is_err());
    assert!(validate_config(&parse("camera_model = \"pinhole\"\n")).is_err());
    assert!(validate_config(&parse("image_format = \"TIFF\"\n")).is_err());

    let config = parse("night_aperture = \"f/2.8\"\nnight_exposure = \"1/4\"\nnight_iso = 400\n");
    validate_config(&config).unwrap();
    let night = config.exposure_policy().unwrap().config_for(SkyPhase::Night);
    assert_eq!(night.to_string(), "Mode = M. Av = f/2.8. Tv = 1/4s. ISO = 400.");
}

#[test]
fn test_home_expansion() {
    let Some(home) = dirs::home_dir() else {
        return;
    };
    assert_eq!(loading::expand_home("~/logs"), home.join("logs"));
    assert_eq!(loading::expand_home("/var/log"), PathBuf::from("/var/log"));
    assert_eq!(loading::private_path(&home.join("a.toml")), "~/a.toml");

    let config = parse("log_dir = \"~/nightlapse-logs\"\n");
    assert_eq!(config.log_dir(), Some(home.join("nightlapse-logs")));
}
