// SPDX-License-Identifier: MIT
//! HTTP sync client — the two outbound request types against the peer.
//!
//! Neither operation retries on its own; the interaction controller owns
//! that decision.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::report::DebugReport;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Failure taxonomy for peer requests.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// The network call could not complete.
    #[error("peer unreachable: {0}")]
    PeerUnreachable(#[from] reqwest::Error),
    /// The peer answered with a non-success status; `detail` carries the
    /// response's status text.
    #[error("peer rejected request: {status} {detail}")]
    PeerRejected { status: u16, detail: String },
}

/// Peer acknowledgement for a submitted report.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitReceipt {
    pub report_id: String,
    pub timestamp: i64,
    /// Present when the peer opened an interactive session (`wait` mode).
    #[serde(default)]
    pub session_id: Option<String>,
    /// Present when the report was filed to the backlog.
    #[serde(default)]
    pub backlog_item_id: Option<String>,
}

/// Peer responses wrap their payload in a `data` envelope.
#[derive(Debug, Deserialize)]
struct DataEnvelope<T> {
    data: T,
}

/// One answered question, as submitted back to the peer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionAnswer {
    pub question_id: String,
    pub answer: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AnswerSubmission<'a> {
    session_id: &'a str,
    answers: &'a [QuestionAnswer],
}

pub struct SyncClient {
    http: reqwest::Client,
    base_url: String,
}

impl SyncClient {
    /// `base_url` is the peer's HTTP base, e.g. `http://127.0.0.1:4310`.
    pub fn new(base_url: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Submit one report. `POST {peer}/api/debug`.
    pub async fn submit_report(&self, report: &DebugReport) -> Result<SubmitReceipt, SyncError> {
        let url = format!("{}/api/debug", self.base_url);
        let resp = self.http.post(&url).json(report).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(rejected(status));
        }
        let envelope: DataEnvelope<SubmitReceipt> = resp.json().await?;
        debug!(report_id = %envelope.data.report_id, "report accepted by peer");
        Ok(envelope.data)
    }

    /// Submit the answers for one question session.
    /// `POST {peer}/api/questions/answer`.
    pub async fn submit_answers(
        &self,
        session_id: &str,
        answers: &[QuestionAnswer],
    ) -> Result<(), SyncError> {
        let url = format!("{}/api/questions/answer", self.base_url);
        let body = AnswerSubmission {
            session_id,
            answers,
        };
        let resp = self.http.post(&url).json(&body).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(rejected(status));
        }
        debug!(session_id, count = answers.len(), "answers accepted by peer");
        Ok(())
    }

    /// Probe the peer. `GET {peer}/api/health`. Never errors; any failure
    /// collapses to `false`.
    pub async fn health_check(&self) -> bool {
        let url = format!("{}/api/health", self.base_url);
        match self.http.get(&url).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(_) => false,
        }
    }
}

fn rejected(status: reqwest::StatusCode) -> SyncError {
    SyncError::PeerRejected {
        status: status.as_u16(),
        detail: status.canonical_reason().unwrap_or("unknown").to_string(),
    }
}
