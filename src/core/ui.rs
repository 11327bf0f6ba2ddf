//! UI-affine execution context.
//!
//! Everything a user can see (intensity readout, predictions, the applied
//! theme) is owned by one dedicated thread. Other threads never touch those
//! publishers directly: they post closures to the thread through a
//! [`UiHandle`], which keeps observers seeing changes in a single order.

use anyhow::{Context, Result};
use std::sync::mpsc::{Receiver, Sender, channel};
use std::thread::JoinHandle;

use super::cell::{Publisher, Subscriber, observable};
use super::deadline::Intensity;
use crate::geo::PhasePredictions;
use crate::theme::Theme;

/// UI-visible state, only ever borrowed on the UI thread.
pub struct UiState {
    pub intensity: Publisher<Intensity>,
    pub predictions: Publisher<Option<PhasePredictions>>,
    pub theme: Publisher<Option<Theme>>,
}

type UiJob = Box<dyn FnOnce(&mut UiState) + Send>;

enum UiMessage {
    Run(UiJob),
    Shutdown,
}

/// Read side of the UI-visible state.
#[derive(Clone, Debug)]
pub struct UiObservers {
    pub intensity: Subscriber<Intensity>,
    pub predictions: Subscriber<Option<PhasePredictions>>,
    pub theme: Subscriber<Option<Theme>>,
}

/// Sends work to the UI thread.
#[derive(Clone)]
pub struct UiHandle {
    tx: Sender<UiMessage>,
}

impl UiHandle {
    /// Queue `job` without waiting. Returns `false` if the UI thread is gone.
    pub fn post(&self, job: impl FnOnce(&mut UiState) + Send + 'static) -> bool {
        self.tx.send(UiMessage::Run(Box::new(job))).is_ok()
    }

    /// Run `job` on the UI thread and wait for its result.
    ///
    /// Returns `None` if the UI thread is gone. Must not be called from the
    /// UI thread itself.
    pub fn call<R: Send + 'static>(
        &self,
        job: impl FnOnce(&mut UiState) -> R + Send + 'static,
    ) -> Option<R> {
        let (result_tx, result_rx) = channel();
        let posted = self.post(move |state| {
            let _ = result_tx.send(job(state));
        });
        if !posted {
            return None;
        }
        result_rx.recv().ok()
    }
}

/// Owner of the UI thread.
pub struct UiContext {
    handle: UiHandle,
    thread: Option<JoinHandle<()>>,
}

impl UiContext {
    /// Start the UI thread with fresh state.
    pub fn spawn() -> Result<(Self, UiObservers)> {
        let (intensity, intensity_rx) = observable(Intensity::Undetermined);
        let (predictions, predictions_rx) = observable(None);
        let (theme, theme_rx) = observable(None);

        let state = UiState {
            intensity,
            predictions,
            theme,
        };
        let (tx, rx) = channel();

        let thread = std::thread::Builder::new()
            .name("ui".into())
            .spawn(move || run_ui_thread(state, rx))
            .context("Failed to spawn UI thread")?;

        Ok((
            Self {
                handle: UiHandle { tx },
                thread: Some(thread),
            },
            UiObservers {
                intensity: intensity_rx,
                predictions: predictions_rx,
                theme: theme_rx,
            },
        ))
    }

    pub fn handle(&self) -> UiHandle {
        self.handle.clone()
    }

    /// Drain queued work and stop the thread.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        let _ = self.handle.tx.send(UiMessage::Shutdown);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for UiContext {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_ui_thread(mut state: UiState, rx: Receiver<UiMessage>) {
    while let Ok(message) = rx.recv() {
        match message {
            UiMessage::Run(job) => job(&mut state),
            UiMessage::Shutdown => break,
        }
    }
}
