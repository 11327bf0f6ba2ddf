//! Platform primitives for reading and setting the desktop theme.
//!
//! The current scheme is read from the XDG desktop portal
//! (`org.freedesktop.appearance color-scheme`) over the session bus. Setting
//! it is delegated to user-configurable shell commands: a scripted command that
//! flips the scheme discretely, and an optional transition command that is
//! expected to cross-fade the screen while doing so.

use std::process::Command;
use std::sync::{Mutex, PoisonError};

use zbus::blocking::Connection;
use zbus::zvariant::OwnedValue;

use super::Theme;
use crate::common::utils::find_on_path;

/// Desktop portal settings interface.
#[zbus::proxy(
    interface = "org.freedesktop.portal.Settings",
    default_service = "org.freedesktop.portal.Desktop",
    default_path = "/org/freedesktop/portal/desktop"
)]
trait PortalSettings {
    fn read_one(&self, namespace: &str, key: &str) -> zbus::Result<OwnedValue>;
}

/// Platform theme operations.
#[cfg_attr(test, mockall::automock)]
pub trait ThemeBackend: Send + Sync {
    /// Human-readable backend name for logs.
    fn name(&self) -> &'static str;

    /// The theme the desktop currently shows, if it can be observed.
    fn current_theme(&self) -> Option<Theme>;

    /// Whether the animated strategy is available.
    fn can_animate(&self) -> bool;

    /// Flip the theme under an animated cross-fade.
    fn set_animated(&self, theme: Theme) -> Result<(), String>;

    /// Flip the theme discretely through the scripted fallback.
    fn run_script(&self, theme: Theme) -> Result<(), String>;
}

/// Shell-command backend with portal-based theme detection.
pub struct CommandBackend {
    script_command: String,
    transition_command: Option<String>,
    session: Option<Connection>,
    // Fallback when the portal cannot be read
    last_applied: Mutex<Option<Theme>>,
}

impl CommandBackend {
    pub fn new(script_command: String, transition_command: Option<String>) -> Self {
        let session = match Connection::session() {
            Ok(connection) => Some(connection),
            Err(e) => {
                log_warning!("Session D-Bus unavailable, theme detection disabled: {e}");
                None
            }
        };

        Self {
            script_command,
            transition_command,
            session,
            last_applied: Mutex::new(None),
        }
    }

    fn read_portal_theme(&self) -> Option<Theme> {
        let connection = self.session.as_ref()?;
        let proxy = PortalSettingsProxyBlocking::new(connection).ok()?;
        let value = proxy
            .read_one("org.freedesktop.appearance", "color-scheme")
            .ok()?;
        // 0 = no preference, 1 = prefer dark, 2 = prefer light
        match u32::try_from(value).ok()? {
            1 => Some(Theme::Dark),
            _ => Some(Theme::Light),
        }
    }

    fn record(&self, theme: Theme) {
        *self
            .last_applied
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(theme);
    }
}

impl ThemeBackend for CommandBackend {
    fn name(&self) -> &'static str {
        "command"
    }

    fn current_theme(&self) -> Option<Theme> {
        self.read_portal_theme().or_else(|| {
            *self
                .last_applied
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
        })
    }

    fn can_animate(&self) -> bool {
        self.transition_command
            .as_deref()
            .and_then(|command| command.split_whitespace().next())
            .is_some_and(|program| find_on_path(program).is_some())
    }

    fn set_animated(&self, theme: Theme) -> Result<(), String> {
        let command = self
            .transition_command
            .as_deref()
            .ok_or_else(|| "no transition_command configured".to_string())?;
        run_shell(command, theme)?;
        self.record(theme);
        Ok(())
    }

    fn run_script(&self, theme: Theme) -> Result<(), String> {
        run_shell(&self.script_command, theme)?;
        self.record(theme);
        Ok(())
    }
}

/// Substitute `{theme}` and `{scheme}` into a command template.
pub fn render_command(template: &str, theme: Theme) -> String {
    template
        .replace("{theme}", &theme.to_string())
        .replace("{scheme}", theme.color_scheme())
}

/// Run a templated command through `sh -c`, returning its raw error text.
fn run_shell(template: &str, theme: Theme) -> Result<(), String> {
    let command = render_command(template, theme);
    let output = Command::new("sh")
        .arg("-c")
        .arg(&command)
        .output()
        .map_err(|e| format!("failed to run '{command}': {e}"))?;

    if output.status.success() {
        return Ok(());
    }

    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    if stderr.is_empty() {
        Err(format!("'{command}' exited with {}", output.status))
    } else {
        Err(stderr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_command_placeholders() {
        assert_eq!(
            render_command("set-theme {theme} --scheme={scheme}", Theme::Dark),
            "set-theme dark --scheme=prefer-dark"
        );
        assert_eq!(render_command("true", Theme::Light), "true");
    }

    #[test]
    fn test_run_shell_reports_stderr() {
        assert!(run_shell("true", Theme::Light).is_ok());
        assert_eq!(
            run_shell("echo boom >&2; exit 3", Theme::Light),
            Err("boom".to_string())
        );
        assert!(
            run_shell("exit 4", Theme::Dark)
                .unwrap_err()
                .contains("exited with")
        );
    }
}
