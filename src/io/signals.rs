//! Unix signal handling.
//!
//! Signals are translated into [`SignalMessage`]s on a channel shared with
//! the config watcher, so the main loop has a single place to wait on.

use anyhow::{Context, Result};
use signal_hook::{
    consts::signal::{SIGHUP, SIGINT, SIGTERM, SIGUSR2},
    iterator::Signals,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, Sender};
use std::thread;

/// Message delivered to the main loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalMessage {
    /// Re-read the configuration (SIGUSR2, SIGHUP, config file change)
    Reload,
    /// Stop the daemon (SIGTERM, SIGINT)
    Shutdown,
}

/// Signal handling state shared between threads
pub struct SignalState {
    /// Cleared once a shutdown signal arrives
    pub running: Arc<AtomicBool>,
    pub signal_receiver: Receiver<SignalMessage>,
    /// Extra sender for other producers such as the config watcher
    pub signal_sender: Sender<SignalMessage>,
}

/// Register handlers for SIGINT, SIGTERM, SIGHUP and SIGUSR2 and start the
/// thread that forwards them.
pub fn setup_signal_handler(debug_enabled: bool) -> Result<SignalState> {
    let running = Arc::new(AtomicBool::new(true));
    let (signal_sender, signal_receiver) = std::sync::mpsc::channel::<SignalMessage>();

    let mut signals = Signals::new([SIGINT, SIGTERM, SIGHUP, SIGUSR2])
        .context("failed to register signal handlers")?;

    let running_clone = running.clone();
    let signal_sender_clone = signal_sender.clone();

    thread::Builder::new()
        .name("signals".into())
        .spawn(move || {
            for sig in signals.forever() {
                match sig {
                    SIGUSR2 | SIGHUP => {
                        if signal_sender_clone.send(SignalMessage::Reload).is_err() {
                            break;
                        }
                        log_pipe!();
                        log_info!("Received configuration reload signal");
                    }
                    SIGTERM | SIGINT => {
                        log_pipe!();
                        if debug_enabled && sig == SIGINT {
                            log_info!("Received SIGINT (Ctrl+C), initiating graceful shutdown...");
                        } else {
                            log_info!("Received termination request, initiating graceful shutdown...");
                        }

                        if let Err(e) = signal_sender_clone.send(SignalMessage::Shutdown) {
                            log_warning!("Failed to send shutdown message: {e}");
                        }
                        running_clone.store(false, Ordering::SeqCst);
                        break;
                    }
                    _ => {}
                }
            }
        })
        .context("failed to spawn signal handler thread")?;

    Ok(SignalState {
        running,
        signal_receiver,
        signal_sender,
    })
}

impl SignalState {
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}
