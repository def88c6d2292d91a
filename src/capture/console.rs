// SPDX-License-Identifier: MIT
//! Console channel interception.
//!
//! The host-visible console is a dispatch slot holding the active
//! [`ConsoleSink`]. [`ConsoleInterceptor::start`] swaps in a recording
//! wrapper that mirrors every call into a [`LogRing`] before forwarding the
//! unchanged arguments to the sink that was active at `start()` time.
//! [`ConsoleInterceptor::stop`] puts that exact sink reference back (not a
//! new wrapper), so interception is fully reversible across repeated
//! start/stop cycles. The original reference is taken at `start()` time,
//! never at construction.

use std::fmt::Debug;
use std::sync::{Arc, Mutex, RwLock};

use once_cell::sync::Lazy;
use serde::Serialize;
use tracing::debug;

use super::buffer::{LogEntry, LogLevel, LogRing};

// ─── Console arguments ────────────────────────────────────────────────────────

/// One argument to a console call.
#[derive(Debug, Clone)]
pub enum ConsoleArg {
    /// Plain text, passed through untouched.
    Text(String),
    /// A structured value, stringified at the call site.
    Value(String),
    /// An error-like value: display message plus captured backtrace text.
    Error { message: String, stack: String },
}

impl ConsoleArg {
    pub fn text(s: impl Into<String>) -> Self {
        Self::Text(s.into())
    }

    /// Stringify a structured value. JSON serialization is attempted first;
    /// values that cannot be serialized fall back to their `Debug` rendering.
    pub fn value<T: Serialize + Debug>(v: &T) -> Self {
        match serde_json::to_string(v) {
            Ok(s) => Self::Value(s),
            Err(_) => Self::Value(format!("{v:?}")),
        }
    }

    /// Capture an error-like value together with its backtrace text.
    pub fn error<E: std::error::Error + ?Sized>(err: &E) -> Self {
        Self::Error {
            message: err.to_string(),
            stack: std::backtrace::Backtrace::force_capture().to_string(),
        }
    }

    /// The display form forwarded to sinks and recorded in log entries.
    pub fn render(&self) -> &str {
        match self {
            Self::Text(s) | Self::Value(s) => s,
            Self::Error { message, .. } => message,
        }
    }

    fn stack(&self) -> Option<&str> {
        match self {
            Self::Error { stack, .. } => Some(stack),
            _ => None,
        }
    }
}

pub(crate) fn join_args(args: &[ConsoleArg]) -> String {
    args.iter()
        .map(ConsoleArg::render)
        .collect::<Vec<_>>()
        .join(" ")
}

// ─── Sinks ────────────────────────────────────────────────────────────────────

/// Receives console calls. The active sink lives in the console's dispatch
/// slot and may be swapped; swapping is what interception is.
pub trait ConsoleSink: Send + Sync {
    fn write(&self, level: LogLevel, args: &[ConsoleArg]);
}

pub type SharedSink = Arc<dyn ConsoleSink>;

/// Default sink: forwards to the `tracing` macros.
pub struct TracingSink;

impl ConsoleSink for TracingSink {
    fn write(&self, level: LogLevel, args: &[ConsoleArg]) {
        let message = join_args(args);
        match level {
            LogLevel::Info => tracing::info!(target: "console", "{message}"),
            LogLevel::Warning => tracing::warn!(target: "console", "{message}"),
            LogLevel::Error => tracing::error!(target: "console", "{message}"),
        }
    }
}

/// Wrapper sink installed by the interceptor: records into the ring buffer
/// first, then forwards the unchanged arguments to the original sink.
struct RecordingSink {
    buffer: Arc<LogRing>,
    inner: SharedSink,
}

impl ConsoleSink for RecordingSink {
    fn write(&self, level: LogLevel, args: &[ConsoleArg]) {
        // An error-like first argument on the error channel carries its stack.
        let stack = match (level, args.first()) {
            (LogLevel::Error, Some(arg)) => arg.stack().map(str::to_owned),
            _ => None,
        };
        self.buffer.record(LogEntry::new(level, join_args(args), stack));
        self.inner.write(level, args);
    }
}

// ─── Console ──────────────────────────────────────────────────────────────────

/// A three-channel logging console.
///
/// Host code logs through [`info`](Console::info) /
/// [`warn`](Console::warn) / [`error`](Console::error); the widget observes
/// those calls by swapping the sink.
pub struct Console {
    sink: RwLock<SharedSink>,
}

impl Console {
    pub fn new(sink: SharedSink) -> Self {
        Self {
            sink: RwLock::new(sink),
        }
    }

    /// The process-wide console used when the host doesn't supply its own.
    pub fn global() -> Arc<Console> {
        static GLOBAL: Lazy<Arc<Console>> = Lazy::new(|| Arc::new(Console::default()));
        GLOBAL.clone()
    }

    pub fn info(&self, args: &[ConsoleArg]) {
        self.current().write(LogLevel::Info, args);
    }

    pub fn warn(&self, args: &[ConsoleArg]) {
        self.current().write(LogLevel::Warning, args);
    }

    pub fn error(&self, args: &[ConsoleArg]) {
        self.current().write(LogLevel::Error, args);
    }

    /// The currently installed sink.
    pub fn current(&self) -> SharedSink {
        self.sink.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Install `sink`, returning the previously installed one.
    pub fn swap(&self, sink: SharedSink) -> SharedSink {
        let mut slot = self.sink.write().unwrap_or_else(|e| e.into_inner());
        std::mem::replace(&mut *slot, sink)
    }
}

impl Default for Console {
    fn default() -> Self {
        Self::new(Arc::new(TracingSink))
    }
}

// ─── Interceptor ──────────────────────────────────────────────────────────────

/// Installs and removes the recording wrapper on a [`Console`].
pub struct ConsoleInterceptor {
    console: Arc<Console>,
    buffer: Arc<LogRing>,
    /// The sink that was active when the current cycle began. `Some` while
    /// interception is active.
    original: Mutex<Option<SharedSink>>,
}

impl ConsoleInterceptor {
    pub fn new(console: Arc<Console>, buffer: Arc<LogRing>) -> Self {
        Self {
            console,
            buffer,
            original: Mutex::new(None),
        }
    }

    /// Begin mirroring console calls into the ring buffer. Idempotent while
    /// active: a second `start()` never double-wraps.
    pub fn start(&self) {
        let mut original = self.lock_original();
        if original.is_some() {
            return;
        }
        let inner = self.console.current();
        let wrapper: SharedSink = Arc::new(RecordingSink {
            buffer: self.buffer.clone(),
            inner: inner.clone(),
        });
        self.console.swap(wrapper);
        *original = Some(inner);
        debug!("console interception started");
    }

    /// Restore the exact sink reference that was active at `start()`.
    /// Idempotent when not active.
    pub fn stop(&self) {
        if let Some(sink) = self.lock_original().take() {
            self.console.swap(sink);
            debug!("console interception stopped");
        }
    }

    pub fn is_active(&self) -> bool {
        self.lock_original().is_some()
    }

    fn lock_original(&self) -> std::sync::MutexGuard<'_, Option<SharedSink>> {
        self.original.lock().unwrap_or_else(|e| e.into_inner())
    }
}

// ─── `log` facade bridge ──────────────────────────────────────────────────────

/// Routes the `log` facade into a console, so host code using
/// `log::info!`-style macros is captured like direct console calls.
struct LogBridge {
    console: Arc<Console>,
}

impl log::Log for LogBridge {
    fn enabled(&self, _metadata: &log::Metadata<'_>) -> bool {
        true
    }

    fn log(&self, record: &log::Record<'_>) {
        let args = [ConsoleArg::Text(record.args().to_string())];
        match record.level() {
            log::Level::Error => self.console.error(&args),
            log::Level::Warn => self.console.warn(&args),
            _ => self.console.info(&args),
        }
    }

    fn flush(&self) {}
}

/// Install the `log`-facade bridge for `console`. Quietly does nothing when
/// the host has already installed its own logger.
pub fn install_log_bridge(console: Arc<Console>) {
    if log::set_boxed_logger(Box::new(LogBridge { console })).is_ok() {
        log::set_max_level(log::LevelFilter::Info);
    }
}
