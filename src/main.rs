//! Command-line entry point.
//!
//! Parses arguments and dispatches to the session runner or one of the
//! one-shot commands. Fatal errors are logged in the structured style and
//! turn into a non-zero exit status.

use anyhow::Result;

use nightlapse::args::{self, CliAction, ParsedArgs};
use nightlapse::commands;
use nightlapse::config;
use nightlapse::constants::EXIT_FAILURE;
use nightlapse::logger::Log;
use nightlapse::{Nightlapse, log_end, log_error_exit, log_indented};

fn main() {
    if let Err(e) = run() {
        // JSON output may have silenced the logger; errors always show
        Log::set_enabled(true);
        log_error_exit!("{e}");
        for cause in e.chain().skip(1) {
            log_indented!("Caused by: {cause}");
        }
        log_end!();
        std::process::exit(EXIT_FAILURE);
    }
}

fn run() -> Result<()> {
    let parsed_args = ParsedArgs::from_env();

    match parsed_args.action {
        CliAction::ShowVersion => {
            args::display_version_info();
            Ok(())
        }
        CliAction::ShowHelp => {
            args::display_help();
            Ok(())
        }
        CliAction::ShowHelpDueToError => {
            args::display_help();
            std::process::exit(EXIT_FAILURE);
        }
        CliAction::Run {
            debug_enabled,
            port,
            config_dir,
        } => {
            config::set_config_dir(config_dir)?;
            Nightlapse::new(debug_enabled).with_port(port).run()?;
            Ok(())
        }
        CliAction::Times {
            debug_enabled,
            date,
            json,
            config_dir,
        } => {
            config::set_config_dir(config_dir)?;
            commands::times::run_times_command(date, json, debug_enabled)
        }
        CliAction::Simulate {
            debug_enabled,
            start_time,
            end_time,
            multiplier,
            config_dir,
        } => {
            config::set_config_dir(config_dir)?;
            commands::simulate::handle_simulate_command(start_time, end_time, multiplier, debug_enabled)?;
            Ok(())
        }
    }
}
