// SPDX-License-Identifier: MIT
//! The transient outbound report, assembled once per send.

use serde::{Deserialize, Serialize};

use crate::capture::buffer::LogEntry;
use crate::capture::failure::ErrorRecord;
use crate::capture::screenshot::ImagePayload;

/// How the peer should treat the report.
///
/// `wait` asks for an interactive session (the client stays in
/// `awaiting-peer` for a question batch); `backlog` files the report for
/// later with no waiting semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportMode {
    Wait,
    Backlog,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportPriority {
    Low,
    Medium,
    High,
}

/// Everything the peer needs to triage one report.
///
/// Exists only for the duration of one outbound request, never persisted.
/// The `logs` field is a point-in-time snapshot taken when the send began;
/// entries recorded afterwards never appear in it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DebugReport {
    pub logs: Vec<LogEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screenshot: Option<ImagePayload>,
    pub comment: String,
    /// Host surface the report was filed from, as supplied by the host.
    pub page_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_path: Option<String>,
    pub timestamp: i64,
    pub client_info: String,
    pub mode: ReportMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<ReportPriority>,
}

/// Identifies this client build to the peer, e.g. `buglink/0.1.0 (linux)`.
pub fn client_info() -> String {
    format!(
        "buglink/{} ({})",
        env!("CARGO_PKG_VERSION"),
        std::env::consts::OS
    )
}
