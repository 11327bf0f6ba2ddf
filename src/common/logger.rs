//! Structured logging with box-drawing output.
//!
//! Every message is rendered as one or more lines hanging off a vertical pipe,
//! so a whole daemon session reads as a single connected tree:
//!
//! ```text
//! ┏ duskmode v0.1.0 ━━╸
//! ┃
//! ┣ Loaded configuration
//! ┃   Mode: auto
//! ┣[INFO] Location resolved: 52.520°N, 13.405°E
//! ╹
//! ```
//!
//! ## Conventions
//!
//! - **`log_block_start!`** opens a new conceptual block (a pipe for spacing,
//!   then `┣ message`). Follow-up lines use `log_decorated!` or `log_indented!`.
//! - **`log_decorated!`** prints `┣ message` inside the current block.
//! - **`log_indented!`** prints `┃   message` for details that belong to the
//!   line above.
//! - **`log_pipe!`** inserts an empty `┃` line. Use it before a level-tagged
//!   message that starts its own block, never right before `log_end!`.
//! - **`log_info!`, `log_warning!`, `log_error!`, `log_debug!`,
//!   `log_critical!`** carry a colored `[LEVEL]` tag.
//! - **`log_version!`** / **`log_end!`** open and close the session.
//!
//! Output can be silenced at runtime with [`Log::set_enabled`], and routed to a
//! file with [`Log::start_file_logging`].

use std::io::Write;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Sender, channel};

static LOGGING_ENABLED: AtomicBool = AtomicBool::new(true);
static TIMESTAMPS_ENABLED: AtomicBool = AtomicBool::new(false);

// Set once when --log is active
static LOG_CHANNEL: OnceLock<Sender<LogMessage>> = OnceLock::new();

enum LogMessage {
    Formatted(String),
    Shutdown,
}

/// Line decoration applied by the logging macros.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Style {
    /// `┣ message`
    Decorated,
    /// `┃   message`
    Indented,
    /// `┃` then `┣ message`
    BlockStart,
    /// `┃` then `┗[ERROR] message`
    ErrorExit,
    /// `┣[LEVEL] message`
    Level(Level),
    /// `[LEVEL] message`, no pipe
    Standalone(Level),
}

/// Severity tag and its ANSI color.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Debug,
    Warning,
    Error,
    Critical,
}

impl Level {
    fn tag(self) -> &'static str {
        match self {
            Level::Info => "\x1b[32mINFO\x1b[0m",
            Level::Debug => "\x1b[32mDEBUG\x1b[0m",
            Level::Warning => "\x1b[33mWARNING\x1b[0m",
            Level::Error => "\x1b[31mERROR\x1b[0m",
            Level::Critical => "\x1b[31mCRITICAL\x1b[0m",
        }
    }
}

/// Main logging interface used by the macros.
pub struct Log;

impl Log {
    /// Enable or disable logging.
    ///
    /// One-shot commands and tests use this to keep their output clean.
    pub fn set_enabled(enabled: bool) {
        LOGGING_ENABLED.store(enabled, Ordering::SeqCst);
    }

    /// Check if logging is currently enabled.
    pub fn is_enabled() -> bool {
        LOGGING_ENABLED.load(Ordering::SeqCst)
    }

    /// Prefix every line with the local wall-clock time.
    pub fn set_timestamps(enabled: bool) {
        TIMESTAMPS_ENABLED.store(enabled, Ordering::SeqCst);
    }

    /// Route all further output to `file_path`.
    ///
    /// The returned guard flushes and closes the file when dropped.
    pub fn start_file_logging(file_path: String) -> anyhow::Result<LoggerGuard> {
        let (tx, rx) = channel();

        LOG_CHANNEL
            .set(tx.clone())
            .map_err(|_| anyhow::anyhow!("Logger channel already initialized"))?;

        let handle = std::thread::Builder::new()
            .name("log-writer".into())
            .spawn(move || {
                let mut file = std::fs::File::create(&file_path)?;
                loop {
                    match rx.recv() {
                        Ok(LogMessage::Formatted(text)) => file.write_all(text.as_bytes())?,
                        Ok(LogMessage::Shutdown) | Err(_) => {
                            file.flush()?;
                            break;
                        }
                    }
                }
                Ok::<(), anyhow::Error>(())
            })?;

        // Files are read later, so wall-clock context matters there
        Self::set_timestamps(true);

        Ok(LoggerGuard {
            tx,
            handle: Some(handle),
        })
    }

    /// Render and emit one message. Called by the macros.
    pub fn emit(style: Style, message: &str) {
        if !Self::is_enabled() {
            return;
        }
        let prefix = Self::timestamp_prefix();
        let formatted = match style {
            Style::Decorated => format!("{prefix}┣ {message}\n"),
            Style::Indented => format!("{prefix}┃   {message}\n"),
            Style::BlockStart => format!("{prefix}┃\n{prefix}┣ {message}\n"),
            Style::ErrorExit => format!(
                "{prefix}┃\n{prefix}┗[{}] {message}\n",
                Level::Error.tag()
            ),
            Style::Level(level) => format!("{prefix}┣[{}] {message}\n", level.tag()),
            Style::Standalone(level) => format!("{prefix}[{}] {message}\n", level.tag()),
        };
        write_output(&formatted);
    }

    /// Emit a bare line such as the version header or the end marker.
    pub fn emit_raw(line: &str) {
        if Self::is_enabled() {
            let prefix = Self::timestamp_prefix();
            write_output(&format!("{prefix}{line}\n"));
        }
    }

    fn timestamp_prefix() -> String {
        if TIMESTAMPS_ENABLED.load(Ordering::SeqCst) {
            format!("[{}] ", chrono::Local::now().format("%H:%M:%S"))
        } else {
            String::new()
        }
    }
}

/// Guard for file logging that ensures clean shutdown.
pub struct LoggerGuard {
    tx: Sender<LogMessage>,
    handle: Option<std::thread::JoinHandle<anyhow::Result<()>>>,
}

impl Drop for LoggerGuard {
    fn drop(&mut self) {
        let _ = self.tx.send(LogMessage::Shutdown);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// Strip ANSI color sequences (`ESC [ ... m`) for file output.
fn strip_ansi_codes(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '\x1b' && chars.peek() == Some(&'[') {
            chars.next();
            for ch in chars.by_ref() {
                if ch == 'm' {
                    break;
                }
            }
        } else {
            result.push(ch);
        }
    }

    result
}

/// Write formatted text to the active sink.
pub fn write_output(text: &str) {
    if let Some(tx) = LOG_CHANNEL.get() {
        let _ = tx.send(LogMessage::Formatted(strip_ansi_codes(text)));
    } else {
        print!("{text}");
        let _ = std::io::stdout().flush();
    }
}

// # Logging Macros

/// Log a message inside the current block: `┣ message`.
#[macro_export]
macro_rules! log_decorated {
    ($($arg:tt)+) => {
        $crate::common::logger::Log::emit(
            $crate::common::logger::Style::Decorated,
            &format!($($arg)+),
        )
    };
}

/// Log a nested detail line: `┃   message`.
#[macro_export]
macro_rules! log_indented {
    ($($arg:tt)+) => {
        $crate::common::logger::Log::emit(
            $crate::common::logger::Style::Indented,
            &format!($($arg)+),
        )
    };
}

/// Log an empty pipe line for vertical spacing.
#[macro_export]
macro_rules! log_pipe {
    () => {
        $crate::common::logger::Log::emit_raw("┃")
    };
}

/// Open a new block: `┃` followed by `┣ message`.
#[macro_export]
macro_rules! log_block_start {
    ($($arg:tt)+) => {
        $crate::common::logger::Log::emit(
            $crate::common::logger::Style::BlockStart,
            &format!($($arg)+),
        )
    };
}

/// Log the application version header.
#[macro_export]
macro_rules! log_version {
    () => {
        $crate::common::logger::Log::emit_raw(&format!(
            "┏ duskmode v{} ━━╸",
            env!("CARGO_PKG_VERSION")
        ))
    };
}

/// Log the final termination marker.
#[macro_export]
macro_rules! log_end {
    () => {
        $crate::common::logger::Log::emit_raw("╹")
    };
}

/// Log a warning: `┣[WARNING] message`.
#[macro_export]
macro_rules! log_warning {
    ($($arg:tt)+) => {
        $crate::common::logger::Log::emit(
            $crate::common::logger::Style::Level($crate::common::logger::Level::Warning),
            &format!($($arg)+),
        )
    };
}

/// Log a warning without the pipe prefix.
#[macro_export]
macro_rules! log_warning_standalone {
    ($($arg:tt)+) => {
        $crate::common::logger::Log::emit(
            $crate::common::logger::Style::Standalone($crate::common::logger::Level::Warning),
            &format!($($arg)+),
        )
    };
}

/// Log an error: `┣[ERROR] message`.
#[macro_export]
macro_rules! log_error {
    ($($arg:tt)+) => {
        $crate::common::logger::Log::emit(
            $crate::common::logger::Style::Level($crate::common::logger::Level::Error),
            &format!($($arg)+),
        )
    };
}

/// Log an error that terminates the flow: `┃` then `┗[ERROR] message`.
#[macro_export]
macro_rules! log_error_exit {
    ($($arg:tt)+) => {
        $crate::common::logger::Log::emit(
            $crate::common::logger::Style::ErrorExit,
            &format!($($arg)+),
        )
    };
}

/// Log an informational message: `┣[INFO] message`.
#[macro_export]
macro_rules! log_info {
    ($($arg:tt)+) => {
        $crate::common::logger::Log::emit(
            $crate::common::logger::Style::Level($crate::common::logger::Level::Info),
            &format!($($arg)+),
        )
    };
}

/// Log an operational detail: `┣[DEBUG] message`.
#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)+) => {
        $crate::common::logger::Log::emit(
            $crate::common::logger::Style::Level($crate::common::logger::Level::Debug),
            &format!($($arg)+),
        )
    };
}

/// Log a critical message: `┣[CRITICAL] message`.
#[macro_export]
macro_rules! log_critical {
    ($($arg:tt)+) => {
        $crate::common::logger::Log::emit(
            $crate::common::logger::Style::Level($crate::common::logger::Level::Critical),
            &format!($($arg)+),
        )
    };
}
