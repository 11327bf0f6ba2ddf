//! Help command implementation for duskmode.
//!
//! Dispatches to command-specific help or shows the general help.

use anyhow::Result;

/// Run the help command (dispatcher)
///
/// # Arguments
/// * `command` - Optional command name to get help for (None = general help)
pub fn run_help_command(command: Option<&str>) -> Result<()> {
    match command {
        None => display_general_help(),
        Some("set") | Some("s") => super::set::display_help(),
        Some("predict") | Some("p") => super::predict::display_help(),
        Some("help") => display_help_help(),
        Some(unknown) => {
            log_warning_standalone!("Unknown command: {}", unknown);
            display_general_help();
        }
    }
    Ok(())
}

/// The `--help` output: options, commands and signals.
pub fn display_usage() {
    log_version!();
    log_block_start!("Usage: duskmode [OPTIONS] [COMMAND]");
    log_block_start!("Options:");
    log_indented!("-c, --config <dir>   Use <dir> instead of ~/.config/duskmode");
    log_indented!("-d, --debug          Verbose output; scheduling errors stop the daemon");
    log_indented!("    --log <file>     Write daemon output to <file>");
    log_indented!("-h, --help           Show this help");
    log_indented!("-V, --version        Show the version");
    display_command_list();
    log_block_start!("Signals:");
    log_indented!("SIGUSR2, SIGHUP      Reload the configuration");
    log_indented!("SIGINT, SIGTERM      Shut down");
    log_end!();
}

/// Display general help focused on commands (for the help command)
fn display_general_help() {
    log_version!();
    display_command_list();
    log_pipe!();
    log_info!("Use 'duskmode help <command>' to see detailed help for a specific command.");
    log_indented!("Use 'duskmode --help' to see all options and general usage.");
    log_end!();
}

fn display_command_list() {
    log_block_start!("Available Commands:");
    log_indented!("(none)               Run the daemon");
    log_indented!("set, s <mode>        Apply light, dark or the sun's theme once");
    log_indented!("predict, p           Show the next sunrise or sunset");
    log_indented!("help [COMMAND]       Show detailed help for a command");
}

/// Display help for the help command itself
fn display_help_help() {
    log_version!();
    log_block_start!("help - Display help information");
    log_block_start!("Usage: duskmode help [COMMAND]");
    log_block_start!("Arguments:");
    log_indented!("COMMAND  Optional command to get help for");
    log_indented!("         If omitted, shows general help");
    log_block_start!("Examples:");
    log_indented!("duskmode help");
    log_indented!("duskmode help predict");
    log_end!();
}
