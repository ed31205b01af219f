//! Command-line argument parsing.
//!
//! Hand-rolled so that unknown options produce the structured help output
//! instead of a generic usage error.

use chrono::NaiveDate;

use crate::constants::DEFAULT_SIMULATION_MULTIPLIER;

/// What the command line asks for.
#[derive(Debug, PartialEq)]
pub enum CliAction {
    /// Run the time-lapse session against the real camera.
    Run {
        debug_enabled: bool,
        port: Option<String>,
        config_dir: Option<String>,
    },
    /// Print one night's phase boundaries and exit.
    Times {
        debug_enabled: bool,
        date: Option<NaiveDate>,
        json: bool,
        config_dir: Option<String>,
    },
    /// Run the session loop on a simulated clock with a dry-run camera.
    Simulate {
        debug_enabled: bool,
        start_time: String,
        end_time: String,
        /// Time acceleration; zero or less fast-forwards.
        multiplier: f64,
        config_dir: Option<String>,
    },
    ShowHelp,
    ShowVersion,
    /// Show help due to invalid arguments and exit with failure.
    ShowHelpDueToError,
}

/// Result of parsing command-line arguments.
pub struct ParsedArgs {
    pub action: CliAction,
}

impl ParsedArgs {
    /// Parse `args`, including the program name in first position.
    pub fn parse<I, S>(args: I) -> ParsedArgs
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        ParsedArgs {
            action: parse_action(args.into_iter().skip(1).map(|s| s.as_ref().to_string()).collect()),
        }
    }

    pub fn from_env() -> ParsedArgs {
        Self::parse(std::env::args())
    }
}

fn parse_action(args: Vec<String>) -> CliAction {
    let mut debug_enabled = false;
    let mut display_help = false;
    let mut display_version = false;
    let mut json = false;
    let mut fast_forward = false;
    let mut config_dir: Option<String> = None;
    let mut port: Option<String> = None;
    let mut date: Option<String> = None;
    let mut positionals: Vec<String> = Vec::new();

    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-h" | "--help" => display_help = true,
            "-V" | "--version" => display_version = true,
            "-v" | "--verbose" | "-d" | "--debug" => debug_enabled = true,
            "--json" => json = true,
            "--fast-forward" => fast_forward = true,
            "-c" | "--config" | "--port" | "--date" => {
                let Some(value) = args.next().filter(|value| !value.starts_with('-')) else {
                    log_warning!("Missing value for {arg}");
                    return CliAction::ShowHelpDueToError;
                };
                match arg.as_str() {
                    "--port" => port = Some(value),
                    "--date" => date = Some(value),
                    _ => config_dir = Some(value),
                }
            }
            _ if arg.starts_with('-') && arg.parse::<f64>().is_err() => {
                log_warning!("Unknown option: {arg}");
                return CliAction::ShowHelpDueToError;
            }
            _ => positionals.push(arg),
        }
    }

    if display_version {
        return CliAction::ShowVersion;
    }
    if display_help {
        return CliAction::ShowHelp;
    }

    let mut positionals = positionals.into_iter();
    let command = positionals.next();
    let rest: Vec<String> = positionals.collect();

    match command.as_deref() {
        None => {
            if date.is_some() || json {
                log_warning!("--date and --json only apply to the times command");
                return CliAction::ShowHelpDueToError;
            }
            CliAction::Run {
                debug_enabled,
                port,
                config_dir,
            }
        }
        Some("times" | "t") => {
            if !rest.is_empty() {
                log_warning!("Unexpected argument for times: {}", rest[0]);
                return CliAction::ShowHelpDueToError;
            }
            let date = match date.as_deref().map(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d")) {
                None => None,
                Some(Ok(date)) => Some(date),
                Some(Err(_)) => {
                    log_warning!("Invalid date. Usage: nightlapse times [--date YYYY-MM-DD] [--json]");
                    return CliAction::ShowHelpDueToError;
                }
            };
            CliAction::Times {
                debug_enabled,
                date,
                json,
                config_dir,
            }
        }
        Some("simulate" | "s") => {
            let usage = "Usage: nightlapse simulate \"YYYY-MM-DD HH:MM:SS\" \"YYYY-MM-DD HH:MM:SS\" [multiplier | --fast-forward]";
            let (start_time, end_time, multiplier) = match rest.as_slice() {
                [start, end] => (start.clone(), end.clone(), DEFAULT_SIMULATION_MULTIPLIER),
                [start, end, multiplier] => match multiplier.parse::<f64>() {
                    Ok(m) if m > 0.0 && m.is_finite() => (start.clone(), end.clone(), m),
                    _ => {
                        log_warning!("Multiplier must be a positive number. {usage}");
                        return CliAction::ShowHelpDueToError;
                    }
                },
                _ => {
                    log_warning!("Missing or extra arguments for simulate. {usage}");
                    return CliAction::ShowHelpDueToError;
                }
            };
            CliAction::Simulate {
                debug_enabled,
                start_time,
                end_time,
                multiplier: if fast_forward { 0.0 } else { multiplier },
                config_dir,
            }
        }
        Some(other) => {
            log_warning!("Unknown command: {other}");
            CliAction::ShowHelpDueToError
        }
    }
}

/// Displays version information using the logging style.
pub fn display_version_info() {
    log_version!();
    log_pipe!();
    log_decorated!(env!("CARGO_PKG_DESCRIPTION"));
    log_end!();
}

/// Displays the help message using the logging style.
pub fn display_help() {
    log_version!();
    log_block_start!(env!("CARGO_PKG_DESCRIPTION"));
    log_block_start!("Usage:");
    log_indented!("nightlapse [OPTIONS] [COMMAND]");
    log_block_start!("Options:");
    log_indented!("-c, --config <dir>     Use custom configuration directory");
    log_indented!("    --port <id>        gphoto2 camera port (overrides the config)");
    log_indented!("-v, --verbose          Log every camera command and its output");
    log_indented!("-h, --help             Print help information");
    log_indented!("-V, --version          Print version information");
    log_block_start!("Commands:");
    log_indented!("times, t               Print tonight's sky phase boundaries");
    log_indented!("                       Usage: times [--date YYYY-MM-DD] [--json]");
    log_indented!("simulate, s            Run the session on a simulated clock with a dry-run camera");
    log_indented!("                       Usage: simulate <start> <end> [multiplier | --fast-forward]");
    log_indented!("                       Times are site-local, \"YYYY-MM-DD HH:MM:SS\"");
    log_end!();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> CliAction {
        ParsedArgs::parse(std::iter::once("nightlapse").chain(args.iter().copied())).action
    }

    #[test]
    fn test_parse_no_args() {
        assert_eq!(
            parse(&[]),
            CliAction::Run {
                debug_enabled: false,
                port: None,
                config_dir: None,
            }
        );
    }

    #[test]
    fn test_parse_run_options() {
        assert_eq!(
            parse(&["--verbose", "--port", "usb:001,004", "-c", "/etc/nightlapse"]),
            CliAction::Run {
                debug_enabled: true,
                port: Some("usb:001,004".to_string()),
                config_dir: Some("/etc/nightlapse".to_string()),
            }
        );
        assert_eq!(
            parse(&["-v"]),
            CliAction::Run {
                debug_enabled: true,
                port: None,
                config_dir: None,
            }
        );
    }

    #[test]
    fn test_parse_help_and_version() {
        assert_eq!(parse(&["--help"]), CliAction::ShowHelp);
        assert_eq!(parse(&["-h"]), CliAction::ShowHelp);
        assert_eq!(parse(&["-V"]), CliAction::ShowVersion);
        // Version takes precedence
        assert_eq!(parse(&["--version", "--help", "-v"]), CliAction::ShowVersion);
        assert_eq!(parse(&["times", "--help"]), CliAction::ShowHelp);
    }

    #[test]
    fn test_parse_unknown_arguments() {
        assert_eq!(parse(&["--unknown"]), CliAction::ShowHelpDueToError);
        assert_eq!(parse(&["-v", "--invalid"]), CliAction::ShowHelpDueToError);
        assert_eq!(parse(&["reload"]), CliAction::ShowHelpDueToError);
        assert_eq!(parse(&["--port"]), CliAction::ShowHelpDueToError);
        assert_eq!(parse(&["--config", "--verbose"]), CliAction::ShowHelpDueToError);
    }

    #[test]
    fn test_parse_times() {
        assert_eq!(
            parse(&["times"]),
            CliAction::Times {
                debug_enabled: false,
                date: None,
                json: false,
                config_dir: None,
            }
        );
        assert_eq!(
            parse(&["t", "--date", "2013-08-23", "--json", "-c", "/tmp/nl"]),
            CliAction::Times {
                debug_enabled: false,
                date: NaiveDate::from_ymd_opt(2013, 8, 23),
                json: true,
                config_dir: Some("/tmp/nl".to_string()),
            }
        );
        assert_eq!(parse(&["times", "--date", "23/08/2013"]), CliAction::ShowHelpDueToError);
        assert_eq!(parse(&["--json"]), CliAction::ShowHelpDueToError);
        assert_eq!(parse(&["times", "extra"]), CliAction::ShowHelpDueToError);
    }

    #[test]
    fn test_parse_simulate() {
        assert_eq!(
            parse(&["simulate", "2013-08-23 17:00:00", "2013-08-24 07:00:00", "600"]),
            CliAction::Simulate {
                debug_enabled: false,
                start_time: "2013-08-23 17:00:00".to_string(),
                end_time: "2013-08-24 07:00:00".to_string(),
                multiplier: 600.0,
                config_dir: None,
            }
        );
        assert_eq!(
            parse(&["-v", "s", "2013-08-23 17:00:00", "2013-08-24 07:00:00"]),
            CliAction::Simulate {
                debug_enabled: true,
                start_time: "2013-08-23 17:00:00".to_string(),
                end_time: "2013-08-24 07:00:00".to_string(),
                multiplier: DEFAULT_SIMULATION_MULTIPLIER,
                config_dir: None,
            }
        );
    }

    #[test]
    fn test_parse_simulate_fast_forward() {
        assert_eq!(
            parse(&["simulate", "2013-08-23 17:00:00", "2013-08-24 07:00:00", "--fast-forward"]),
            CliAction::Simulate {
                debug_enabled: false,
                start_time: "2013-08-23 17:00:00".to_string(),
                end_time: "2013-08-24 07:00:00".to_string(),
                multiplier: 0.0,
                config_dir: None,
            }
        );
    }

    #[test]
    fn test_parse_simulate_errors() {
        assert_eq!(parse(&["simulate", "2013-08-23 17:00:00"]), CliAction::ShowHelpDueToError);
        assert_eq!(
            parse(&["simulate", "2013-08-23 17:00:00", "2013-08-24 07:00:00", "fast"]),
            CliAction::ShowHelpDueToError
        );
        assert_eq!(
            parse(&["simulate", "2013-08-23 17:00:00", "2013-08-24 07:00:00", "-5"]),
            CliAction::ShowHelpDueToError
        );
    }
}
