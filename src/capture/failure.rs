// SPDX-License-Identifier: MIT
//! Uncaught-failure interception.
//!
//! Two process-global failure signals feed a single retained
//! [`ErrorRecord`]: the panic hook (uncaught panic) and the task-failure
//! channel (background-task errors reported by the host). A newer failure
//! silently replaces the stored one; a debug report carries at most one
//! error, so only the latest matters. No buffering, no classification.

use std::panic::PanicHookInfo;
use std::sync::{Arc, Mutex};

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;

/// Location and text of the most recent uncaught failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorRecord {
    pub message: String,
    pub stack: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<u32>,
}

// ─── Task-failure channel ─────────────────────────────────────────────────────

/// A failure in a background task, reported via [`report`].
#[derive(Debug, Clone)]
pub struct TaskFailure {
    pub message: String,
    pub stack: String,
}

static TASK_FAILURES: Lazy<broadcast::Sender<TaskFailure>> =
    Lazy::new(|| broadcast::channel(64).0);

/// Report an unhandled background-task failure to any active interceptor.
/// Safe to call when none is listening.
pub fn report(err: &(impl std::fmt::Display + ?Sized)) {
    let failure = TaskFailure {
        message: err.to_string(),
        stack: std::backtrace::Backtrace::force_capture().to_string(),
    };
    let _ = TASK_FAILURES.send(failure);
}

/// Spawn a task whose `Err` outcome is reported as an unhandled failure.
pub fn spawn_reported<F, T, E>(fut: F) -> tokio::task::JoinHandle<()>
where
    F: std::future::Future<Output = Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    tokio::spawn(async move {
        if let Err(e) = fut.await {
            report(&e);
        }
    })
}

// ─── Interceptor ──────────────────────────────────────────────────────────────

type PanicHook = Box<dyn Fn(&PanicHookInfo<'_>) + Send + Sync + 'static>;
type SharedHook = Arc<Mutex<Option<PanicHook>>>;

/// Subscribes to the two global failure signals and retains the most
/// recent [`ErrorRecord`].
///
/// The previous panic hook is stored at `start()` time and invoked from
/// the wrapper, so host panic behavior is preserved; `stop()` reinstalls
/// that exact hook, supporting repeated start/stop cycles.
pub struct ErrorInterceptor {
    latest: Arc<Mutex<Option<ErrorRecord>>>,
    previous_hook: SharedHook,
    listener: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl Default for ErrorInterceptor {
    fn default() -> Self {
        Self::new()
    }
}

impl ErrorInterceptor {
    pub fn new() -> Self {
        Self {
            latest: Arc::new(Mutex::new(None)),
            previous_hook: Arc::new(Mutex::new(None)),
            listener: Mutex::new(None),
        }
    }

    /// Subscribe to both failure signals. Idempotent while active.
    ///
    /// Must be called from within a Tokio runtime (the task-failure
    /// listener is a spawned task).
    pub fn start(&self) {
        {
            let mut previous = lock(&self.previous_hook);
            if previous.is_some() {
                return;
            }
            *previous = Some(std::panic::take_hook());
        }

        let latest = self.latest.clone();
        let chain = self.previous_hook.clone();
        std::panic::set_hook(Box::new(move |info| {
            *lock(&latest) = Some(record_from_panic(info));
            if let Some(hook) = lock(&chain).as_ref() {
                hook(info);
            }
        }));

        let latest = self.latest.clone();
        let mut rx = TASK_FAILURES.subscribe();
        let handle = tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(failure) => {
                        *lock(&latest) = Some(ErrorRecord {
                            message: failure.message,
                            stack: failure.stack,
                            source_file: None,
                            line: None,
                            column: None,
                        });
                    }
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
        *lock(&self.listener) = Some(handle);
        debug!("failure interception started");
    }

    /// Reinstall the stored panic hook and cancel the task-failure
    /// subscription. Idempotent when not active.
    pub fn stop(&self) {
        if let Some(hook) = lock(&self.previous_hook).take() {
            std::panic::set_hook(hook);
            debug!("failure interception stopped");
        }
        if let Some(handle) = lock(&self.listener).take() {
            handle.abort();
        }
    }

    /// The most recent uncaught failure, if any was observed.
    pub fn latest(&self) -> Option<ErrorRecord> {
        lock(&self.latest).clone()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

fn record_from_panic(info: &PanicHookInfo<'_>) -> ErrorRecord {
    let message = info
        .payload()
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| info.payload().downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
        .to_string();

    let (source_file, line, column) = match info.location() {
        Some(loc) => (
            Some(loc.file().to_string()),
            Some(loc.line()),
            Some(loc.column()),
        ),
        None => (None, None, None),
    };

    ErrorRecord {
        message,
        stack: std::backtrace::Backtrace::force_capture().to_string(),
        source_file,
        line,
        column,
    }
}
