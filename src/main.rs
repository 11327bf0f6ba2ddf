//! Binary entry point: parse arguments and dispatch.

use duskmode::{
    Duskmode,
    args::{CliAction, ParsedArgs},
    commands,
    common::constants::{EXIT_FAILURE, EXIT_SUCCESS},
    common::logger::Log,
    config,
    core::ScheduleError,
    log_critical, log_end, log_error_exit, log_indented, log_pipe,
};

fn main() {
    let parsed = ParsedArgs::parse(std::env::args());

    let result = match parsed.action {
        CliAction::ShowVersion => {
            println!("duskmode {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        CliAction::ShowHelp => {
            commands::help::display_usage();
            Ok(())
        }
        CliAction::ShowHelpDueToError => {
            commands::help::display_usage();
            std::process::exit(EXIT_FAILURE);
        }
        CliAction::HelpCommand { command } => commands::help::run_help_command(command.as_deref()),
        CliAction::SetCommand {
            debug_enabled,
            mode,
            config_dir,
        } => config::set_config_dir(config_dir)
            .and_then(|()| commands::set::handle_set_command(mode, debug_enabled)),
        CliAction::PredictCommand {
            debug_enabled,
            config_dir,
        } => config::set_config_dir(config_dir)
            .and_then(|()| commands::predict::handle_predict_command(debug_enabled)),
        CliAction::Run {
            debug_enabled,
            config_dir,
            log_file,
        } => run_daemon(debug_enabled, config_dir, log_file),
    };

    match result {
        Ok(()) => std::process::exit(EXIT_SUCCESS),
        Err(e) => {
            log_pipe!();
            if e.downcast_ref::<ScheduleError>().is_some() {
                log_critical!("Scheduling failed: {}", e);
            } else {
                log_error_exit!("{}", e);
                for cause in e.chain().skip(1) {
                    log_indented!("{}", cause);
                }
            }
            log_end!();
            std::process::exit(EXIT_FAILURE);
        }
    }
}

fn run_daemon(
    debug_enabled: bool,
    config_dir: Option<String>,
    log_file: Option<String>,
) -> anyhow::Result<()> {
    config::set_config_dir(config_dir)?;

    // Held until the daemon returns so the file is flushed
    let _log_guard = match log_file {
        Some(path) => Some(Log::start_file_logging(path)?),
        None => None,
    };

    Duskmode::new(debug_enabled).run()
}
