//! File watching module for hot config reloading.
//!
//! Changes to `duskmode.toml` or `geo.toml` are turned into
//! [`SignalMessage::Reload`] on the main loop's channel, the same message a
//! SIGHUP produces.

use anyhow::{Context, Result};
use notify::{
    Config as NotifyConfig, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher,
};
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use std::thread;
use std::time::{Duration, Instant};

use super::loading::get_config_base_dir;
use crate::common::constants::{CONFIG_DEBOUNCE_MS, CONFIG_FILE_NAME, GEO_FILE_NAME};
use crate::common::utils::private_path;
use crate::io::signals::SignalMessage;

/// Configuration file watcher that monitors for changes and triggers reloads.
pub struct ConfigWatcher {
    /// Channel sender for sending reload signals to the main loop
    signal_sender: Sender<SignalMessage>,
    debug_enabled: bool,
    /// Directory holding the watched files
    config_dir: PathBuf,
}

impl ConfigWatcher {
    pub fn new(signal_sender: Sender<SignalMessage>, config_dir: PathBuf, debug_enabled: bool) -> Self {
        Self {
            signal_sender,
            debug_enabled,
            config_dir,
        }
    }

    /// Start watching the configuration directory.
    ///
    /// The directory is watched rather than the files so that editors which
    /// replace files on save and a `geo.toml` created later are both noticed.
    pub fn start(self) -> Result<()> {
        if !self.config_dir.is_dir() {
            if self.debug_enabled {
                log_pipe!();
                log_debug!("No configuration directory to watch for hot reload");
            }
            return Ok(());
        }

        if self.debug_enabled {
            log_pipe!();
            log_debug!("Starting config file watcher for hot reload:");
            log_indented!("Watching: {}", private_path(&self.config_dir));
        }

        let (tx, rx) = std::sync::mpsc::channel();

        let mut watcher = RecommendedWatcher::new(
            move |res: Result<Event, notify::Error>| {
                if let Ok(event) = res {
                    match event.kind {
                        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_) => {
                            let _ = tx.send(event);
                        }
                        _ => {}
                    }
                }
            },
            NotifyConfig::default(),
        )
        .context("Failed to create file watcher")?;

        watcher
            .watch(&self.config_dir, RecursiveMode::NonRecursive)
            .with_context(|| {
                format!(
                    "Failed to watch directory: {}",
                    private_path(&self.config_dir)
                )
            })?;

        let signal_sender = self.signal_sender;
        let debug_enabled = self.debug_enabled;

        thread::Builder::new()
            .name("config-watcher".into())
            .spawn(move || {
                // The watcher stops when dropped
                let _watcher = watcher;
                let mut last_reload: Option<Instant> = None;

                for event in rx {
                    if !event.paths.iter().any(|path| is_config_file(path)) {
                        continue;
                    }

                    if let Some(last) = last_reload
                        && last.elapsed() < Duration::from_millis(CONFIG_DEBOUNCE_MS)
                    {
                        continue;
                    }

                    if debug_enabled {
                        log_pipe!();
                        log_info!("Configuration file change detected");
                    }

                    if signal_sender.send(SignalMessage::Reload).is_err() {
                        break;
                    }
                    last_reload = Some(Instant::now());
                }
            })
            .context("Failed to spawn config watcher thread")?;

        Ok(())
    }
}

/// Whether an event path names one of our files, including the temporary
/// siblings editors write before renaming (`duskmode.toml~`, `geo.toml.swp`).
fn is_config_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.starts_with(CONFIG_FILE_NAME) || name.starts_with(GEO_FILE_NAME))
}

/// Start the configuration file watcher.
///
/// This is called from the main application to enable hot config reloading.
pub fn start_config_watcher(
    signal_sender: Sender<SignalMessage>,
    debug_enabled: bool,
) -> Result<()> {
    let watcher = ConfigWatcher::new(signal_sender, get_config_base_dir()?, debug_enabled);
    watcher.start()
}
