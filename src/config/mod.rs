// SPDX-License-Identifier: MIT
//! Widget configuration.
//!
//! Read once at startup and never re-read; changing any source afterwards
//! takes effect at the next start.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::error;

const DEFAULT_PEER_URL: &str = "http://127.0.0.1:4310";
const DEFAULT_SHORTCUT: &str = "ctrl+shift+d";
const DEFAULT_MAX_LOG_ENTRIES: i64 = 100;
/// 5 MiB cap on attached payloads (screenshots).
const DEFAULT_MAX_FILE_SIZE: i64 = 5 * 1024 * 1024;

/// Corner of the host surface the widget is anchored to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Corner {
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    Dark,
    Auto,
}

/// Process-wide widget configuration.
#[derive(Debug, Clone)]
pub struct WidgetConfig {
    pub enabled: bool,
    /// HTTP base of the peer; the duplex URL is derived from it.
    pub peer_url: String,
    pub project_path: String,
    pub position: Corner,
    pub theme: Theme,
    pub hide_screenshot: bool,
    pub keyboard_shortcut: String,
    /// Ring-buffer capacity. Non-positive values are clamped to 1 at use
    /// sites via [`log_capacity`](Self::log_capacity).
    pub max_log_entries: i64,
    /// Upper bound in bytes on attached payloads.
    pub max_file_size: i64,
    /// Where session history and settings are persisted.
    pub data_dir: PathBuf,
}

/// Host-supplied partial configuration, shallow-merged over defaults.
/// Doubles as the shape of `{data_dir}/config.toml`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WidgetOverrides {
    pub enabled: Option<bool>,
    pub peer_url: Option<String>,
    pub project_path: Option<String>,
    pub position: Option<Corner>,
    pub theme: Option<Theme>,
    pub hide_screenshot: Option<bool>,
    pub keyboard_shortcut: Option<String>,
    pub max_log_entries: Option<i64>,
    pub max_file_size: Option<i64>,
    pub data_dir: Option<PathBuf>,
}

impl WidgetConfig {
    /// Build the effective configuration.
    ///
    /// Priority (highest to lowest):
    ///   1. host-supplied overrides
    ///   2. `BUGLINK_*` environment variables
    ///   3. `{data_dir}/config.toml`
    ///   4. built-in defaults
    pub fn load(overrides: Option<WidgetOverrides>) -> Self {
        let overrides = overrides.unwrap_or_default();

        let data_dir = overrides
            .data_dir
            .clone()
            .or_else(|| std::env::var("BUGLINK_DATA_DIR").ok().map(PathBuf::from))
            .unwrap_or_else(default_data_dir);

        let toml = load_toml(&data_dir).unwrap_or_default();

        let peer_url = overrides
            .peer_url
            .or_else(|| std::env::var("BUGLINK_PEER_URL").ok().filter(|s| !s.is_empty()))
            .or(toml.peer_url)
            .unwrap_or_else(|| DEFAULT_PEER_URL.to_string());

        Self {
            enabled: overrides.enabled.or(toml.enabled).unwrap_or(true),
            peer_url,
            project_path: overrides
                .project_path
                .or(toml.project_path)
                .unwrap_or_default(),
            position: overrides
                .position
                .or(toml.position)
                .unwrap_or(Corner::BottomRight),
            theme: overrides.theme.or(toml.theme).unwrap_or(Theme::Auto),
            hide_screenshot: overrides
                .hide_screenshot
                .or(toml.hide_screenshot)
                .unwrap_or(false),
            keyboard_shortcut: overrides
                .keyboard_shortcut
                .or(toml.keyboard_shortcut)
                .unwrap_or_else(|| DEFAULT_SHORTCUT.to_string()),
            max_log_entries: overrides
                .max_log_entries
                .or(toml.max_log_entries)
                .unwrap_or(DEFAULT_MAX_LOG_ENTRIES),
            max_file_size: overrides
                .max_file_size
                .or(toml.max_file_size)
                .unwrap_or(DEFAULT_MAX_FILE_SIZE),
            data_dir,
        }
    }

    /// Ring-buffer capacity with the non-positive guard applied.
    pub fn log_capacity(&self) -> usize {
        self.max_log_entries.max(1) as usize
    }
}

impl Default for WidgetConfig {
    fn default() -> Self {
        Self::load(Some(WidgetOverrides {
            data_dir: Some(default_data_dir()),
            ..Default::default()
        }))
    }
}

fn load_toml(data_dir: &Path) -> Option<WidgetOverrides> {
    let path = data_dir.join("config.toml");
    let contents = std::fs::read_to_string(&path).ok()?;
    match toml::from_str::<WidgetOverrides>(&contents) {
        Ok(overrides) => Some(overrides),
        Err(e) => {
            error!(path = %path.display(), err = %e, "failed to parse config.toml — using defaults");
            None
        }
    }
}

fn default_data_dir() -> PathBuf {
    #[cfg(target_os = "macos")]
    {
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home)
                .join("Library")
                .join("Application Support")
                .join("buglink");
        }
    }
    #[cfg(target_os = "linux")]
    {
        if let Ok(xdg) = std::env::var("XDG_DATA_HOME") {
            return PathBuf::from(xdg).join("buglink");
        }
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home)
                .join(".local")
                .join("share")
                .join("buglink");
        }
    }
    #[cfg(target_os = "windows")]
    {
        if let Ok(appdata) = std::env::var("APPDATA") {
            return PathBuf::from(appdata).join("buglink");
        }
    }
    PathBuf::from(".buglink")
}
