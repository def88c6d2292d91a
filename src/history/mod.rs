// SPDX-License-Identifier: MIT
//! Durable widget state: session history and user settings.
//!
//! Persistence is best-effort by design: corrupt or unwritable storage
//! degrades to defaults with a logged warning. Losing history is
//! preferable to crashing the widget.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Most recent submissions kept on disk; older entries are dropped at
/// save time, oldest first.
pub const MAX_RECORDS: usize = 50;

const SESSIONS_FILE: &str = "sessions.json";
const SETTINGS_FILE: &str = "settings.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SessionStatus {
    Pending,
    Answered,
    /// Retained for compatibility with peer tooling; this client never
    /// produces it (there is no client-side wait timeout).
    TimedOut,
}

/// One past submission and its outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub id: String,
    pub timestamp: i64,
    pub comment: String,
    pub status: SessionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub peer_session_id: Option<String>,
}

/// Settings record, persisted independently from session history.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StoredSettings {
    pub project_path: String,
    pub debug_mode: bool,
    pub theme: String,
}

pub struct SessionStore {
    dir: PathBuf,
}

impl SessionStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: data_dir.into(),
        }
    }

    /// Read the persisted history, oldest first. Absent or corrupt storage
    /// yields an empty list, never an error.
    pub fn load(&self) -> Vec<SessionRecord> {
        read_json(&self.dir.join(SESSIONS_FILE)).unwrap_or_default()
    }

    /// Write the history, truncated to the most recent [`MAX_RECORDS`]
    /// entries. Failures are logged and swallowed.
    pub fn save(&self, records: &[SessionRecord]) {
        let start = records.len().saturating_sub(MAX_RECORDS);
        write_json(&self.dir, &self.dir.join(SESSIONS_FILE), &records[start..]);
    }

    /// Append one record, applying the cap.
    pub fn append(&self, record: SessionRecord) {
        let mut records = self.load();
        records.push(record);
        self.save(&records);
    }

    /// Flip the record matching `peer_session_id` to `answered`.
    pub fn mark_answered(&self, peer_session_id: &str) {
        let mut records = self.load();
        let mut changed = false;
        for record in &mut records {
            if record.peer_session_id.as_deref() == Some(peer_session_id) {
                record.status = SessionStatus::Answered;
                changed = true;
            }
        }
        if changed {
            self.save(&records);
        } else {
            warn!(peer_session_id, "no session record matched answered update");
        }
    }

    pub fn load_settings(&self) -> StoredSettings {
        read_json(&self.dir.join(SETTINGS_FILE)).unwrap_or_default()
    }

    pub fn save_settings(&self, settings: &StoredSettings) {
        write_json(&self.dir, &self.dir.join(SETTINGS_FILE), settings);
    }
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Option<T> {
    let contents = std::fs::read_to_string(path).ok()?;
    match serde_json::from_str(&contents) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(path = %path.display(), err = %e, "corrupt store file — starting empty");
            None
        }
    }
}

fn write_json<T: Serialize + ?Sized>(dir: &Path, path: &Path, value: &T) {
    if let Err(e) = std::fs::create_dir_all(dir) {
        warn!(dir = %dir.display(), err = %e, "store directory unavailable — not saved");
        return;
    }
    let json = match serde_json::to_string_pretty(value) {
        Ok(json) => json,
        Err(e) => {
            warn!(err = %e, "store serialization failed — not saved");
            return;
        }
    };
    if let Err(e) = std::fs::write(path, json) {
        warn!(path = %path.display(), err = %e, "store write failed — not saved");
    }
}
