// SPDX-License-Identifier: MIT
//! Bounded, insertion-ordered store of captured console entries.
//!
//! Recording is synchronous with the originating console call, so buffer
//! order exactly matches call order, including interleavings with the host's
//! own code. Eviction is strict FIFO: once the buffer is full, each new
//! entry drops the oldest one.

use std::collections::VecDeque;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

/// Severity of a captured console entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Warning,
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Warning => write!(f, "warning"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// One captured console call. Immutable once created; owned by the ring
/// buffer, which only ever hands out clones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub level: LogLevel,
    pub message: String,
    /// Epoch milliseconds at the moment of the originating call.
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

impl LogEntry {
    pub fn new(level: LogLevel, message: impl Into<String>, stack: Option<String>) -> Self {
        Self {
            level,
            message: message.into(),
            timestamp: chrono::Utc::now().timestamp_millis(),
            stack,
        }
    }
}

/// Bounded FIFO buffer of console entries.
pub struct LogRing {
    entries: Mutex<VecDeque<LogEntry>>,
    capacity: usize,
}

impl LogRing {
    /// Capacity values below 1 are clamped to 1.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    /// Append one entry, evicting the oldest when full. O(1) amortized.
    pub fn record(&self, entry: LogEntry) {
        let mut entries = self.lock();
        while entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(entry);
    }

    /// A defensive copy of the current contents, oldest first. Callers
    /// never observe later mutations through the returned value.
    pub fn snapshot(&self) -> Vec<LogEntry> {
        self.lock().iter().cloned().collect()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<LogEntry>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}
