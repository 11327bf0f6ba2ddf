//! Command-line argument parsing and processing.
//!
//! Flags may appear anywhere on the command line. The first positional
//! argument selects a command; without one the daemon runs.

use crate::theme::Mode;

/// Represents the parsed command-line arguments and their intended actions.
#[derive(Debug, PartialEq)]
pub enum CliAction {
    /// Run the daemon
    Run {
        debug_enabled: bool,
        config_dir: Option<String>,
        log_file: Option<String>,
    },
    /// Apply a theme once and exit
    SetCommand {
        debug_enabled: bool,
        mode: Mode,
        config_dir: Option<String>,
    },
    /// Print the current predictions and exit
    PredictCommand {
        debug_enabled: bool,
        config_dir: Option<String>,
    },
    /// Help for one command, or the general help
    HelpCommand { command: Option<String> },

    /// Display help information and exit
    ShowHelp,
    /// Display version information and exit
    ShowVersion,
    /// Show help due to unknown arguments and exit
    ShowHelpDueToError,
}

/// Result of parsing command-line arguments.
pub struct ParsedArgs {
    pub action: CliAction,
}

impl ParsedArgs {
    /// Parse command-line arguments into a structured result.
    ///
    /// The first item is the program name and is skipped.
    pub fn parse<I, S>(args: I) -> ParsedArgs
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut debug_enabled = false;
        let mut display_help = false;
        let mut display_version = false;
        let mut config_dir: Option<String> = None;
        let mut log_file: Option<String> = None;
        let mut positionals: Vec<String> = Vec::new();

        let args_vec: Vec<String> = args
            .into_iter()
            .skip(1)
            .map(|s| s.as_ref().to_string())
            .collect();

        let mut i = 0;
        while i < args_vec.len() {
            let arg_str = &args_vec[i];
            match arg_str.as_str() {
                "--help" | "-h" => display_help = true,
                "--version" | "-V" | "-v" => display_version = true,
                "--debug" | "-d" => debug_enabled = true,
                "--config" | "-c" => {
                    // Parse: --config <directory>
                    if i + 1 < args_vec.len() && !args_vec[i + 1].starts_with('-') {
                        config_dir = Some(args_vec[i + 1].clone());
                        i += 1;
                    } else {
                        log_warning!("Missing directory for --config. Usage: --config <directory>");
                        return error();
                    }
                }
                "--log" => {
                    // Parse: --log <file>
                    if i + 1 < args_vec.len() && !args_vec[i + 1].starts_with('-') {
                        log_file = Some(args_vec[i + 1].clone());
                        i += 1;
                    } else {
                        log_warning!("Missing file for --log. Usage: --log <file>");
                        return error();
                    }
                }
                other if other.starts_with('-') => {
                    log_warning!("Unknown argument: {}", other);
                    return error();
                }
                _ => positionals.push(arg_str.clone()),
            }
            i += 1;
        }

        // Help and version take precedence over everything else
        if display_version {
            return ParsedArgs {
                action: CliAction::ShowVersion,
            };
        }
        if display_help {
            return ParsedArgs {
                action: CliAction::ShowHelp,
            };
        }

        let Some((command, rest)) = positionals.split_first() else {
            return ParsedArgs {
                action: CliAction::Run {
                    debug_enabled,
                    config_dir,
                    log_file,
                },
            };
        };

        if log_file.is_some() {
            log_warning!("--log is only valid when running the daemon");
            return error();
        }

        let action = match command.as_str() {
            "set" | "s" => match rest {
                [mode] => match mode.parse::<Mode>() {
                    Ok(mode) => CliAction::SetCommand {
                        debug_enabled,
                        mode,
                        config_dir,
                    },
                    Err(e) => {
                        log_warning!("{}", e);
                        return error();
                    }
                },
                [] => {
                    log_warning!("Missing mode. Usage: duskmode set <light|dark|auto>");
                    return error();
                }
                _ => return too_many(command),
            },
            "predict" | "p" => {
                if !rest.is_empty() {
                    return too_many(command);
                }
                CliAction::PredictCommand {
                    debug_enabled,
                    config_dir,
                }
            }
            "help" => match rest {
                [] => CliAction::HelpCommand { command: None },
                [topic] => CliAction::HelpCommand {
                    command: Some(topic.clone()),
                },
                _ => return too_many(command),
            },
            _ => {
                log_warning!("Unknown command: {}", command);
                return error();
            }
        };

        ParsedArgs { action }
    }
}

fn error() -> ParsedArgs {
    ParsedArgs {
        action: CliAction::ShowHelpDueToError,
    }
}

fn too_many(command: &str) -> ParsedArgs {
    log_warning!("Too many arguments for '{}'", command);
    error()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> CliAction {
        crate::common::logger::Log::set_enabled(false);
        ParsedArgs::parse(std::iter::once("duskmode").chain(args.iter().copied())).action
    }

    #[test]
    fn test_parse_no_args() {
        assert_eq!(
            parse(&[]),
            CliAction::Run {
                debug_enabled: false,
                config_dir: None,
                log_file: None,
            }
        );
    }

    #[test]
    fn test_parse_daemon_flags() {
        assert_eq!(
            parse(&["-d", "--config", "/tmp/cfg", "--log", "/tmp/out.log"]),
            CliAction::Run {
                debug_enabled: true,
                config_dir: Some("/tmp/cfg".into()),
                log_file: Some("/tmp/out.log".into()),
            }
        );
    }

    #[test]
    fn test_parse_set_command() {
        assert_eq!(
            parse(&["set", "dark", "--debug"]),
            CliAction::SetCommand {
                debug_enabled: true,
                mode: Mode::Dark,
                config_dir: None,
            }
        );
        assert_eq!(parse(&["set"]), CliAction::ShowHelpDueToError);
        assert_eq!(parse(&["set", "dusk"]), CliAction::ShowHelpDueToError);
        assert_eq!(parse(&["set", "dark", "light"]), CliAction::ShowHelpDueToError);
    }

    #[test]
    fn test_parse_predict_command() {
        assert_eq!(
            parse(&["-c", "/cfg", "predict"]),
            CliAction::PredictCommand {
                debug_enabled: false,
                config_dir: Some("/cfg".into()),
            }
        );
    }

    #[test]
    fn test_help_and_version_take_precedence() {
        assert_eq!(parse(&["predict", "--help"]), CliAction::ShowHelp);
        assert_eq!(parse(&["-h", "-V"]), CliAction::ShowVersion);
        assert_eq!(
            parse(&["help", "set"]),
            CliAction::HelpCommand {
                command: Some("set".into())
            }
        );
    }

    #[test]
    fn test_invalid_arguments() {
        assert_eq!(parse(&["--bogus"]), CliAction::ShowHelpDueToError);
        assert_eq!(parse(&["frobnicate"]), CliAction::ShowHelpDueToError);
        assert_eq!(parse(&["--config"]), CliAction::ShowHelpDueToError);
        assert_eq!(parse(&["predict", "--log", "x"]), CliAction::ShowHelpDueToError);
    }
}
