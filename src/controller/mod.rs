// SPDX-License-Identifier: MIT
//! The UI-visible interaction state machine.
//!
//! ```text
//! idle ──(screenshot)──► capturing-screenshot ──► idle
//! idle ──(send)──► sending-report ──┬─(wait mode)──► awaiting-peer
//!                                   └─(backlog mode / failure)──► idle
//! awaiting-peer ──(question batch)──► answering ◄──(edit)── reviewing
//! answering ──(next past last)──► reviewing
//! reviewing ──(submit)──► submitting-answers ──► idle
//! ```
//!
//! Exactly one send may be in flight at a time, and the log snapshot for a
//! report is taken at the transition into `sending-report`: entries
//! recorded afterwards never appear in that report.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

use crate::capture::buffer::LogRing;
use crate::capture::failure::ErrorInterceptor;
use crate::capture::screenshot::{ImagePayload, ScreenshotSource};
use crate::channel::QuestionBatch;
use crate::config::WidgetConfig;
use crate::history::{SessionRecord, SessionStatus, SessionStore};
use crate::questions::{Question, QuestionSession};
use crate::report::{client_info, DebugReport, ReportMode, ReportPriority};
use crate::sync::SyncClient;

/// States of the interaction flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WidgetState {
    Idle,
    CapturingScreenshot,
    SendingReport,
    AwaitingPeer,
    Answering,
    Reviewing,
    SubmittingAnswers,
}

impl std::fmt::Display for WidgetState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::CapturingScreenshot => write!(f, "capturing-screenshot"),
            Self::SendingReport => write!(f, "sending-report"),
            Self::AwaitingPeer => write!(f, "awaiting-peer"),
            Self::Answering => write!(f, "answering"),
            Self::Reviewing => write!(f, "reviewing"),
            Self::SubmittingAnswers => write!(f, "submitting-answers"),
        }
    }
}

struct ControllerInner {
    state: WidgetState,
    status: Option<String>,
    comment: String,
    screenshot: Option<ImagePayload>,
    session: Option<QuestionSession>,
}

/// Orchestrates capture, send, wait, and the answer flow.
///
/// Cheaply cloneable; clones share the same state.
#[derive(Clone)]
pub struct InteractionController {
    inner: Arc<Mutex<ControllerInner>>,
    config: Arc<WidgetConfig>,
    buffer: Arc<LogRing>,
    failures: Arc<ErrorInterceptor>,
    screenshots: Arc<dyn ScreenshotSource>,
    sync: Arc<SyncClient>,
    store: Arc<SessionStore>,
}

impl InteractionController {
    pub fn new(
        config: Arc<WidgetConfig>,
        buffer: Arc<LogRing>,
        failures: Arc<ErrorInterceptor>,
        screenshots: Arc<dyn ScreenshotSource>,
        sync: Arc<SyncClient>,
        store: Arc<SessionStore>,
    ) -> Self {
        Self {
            inner: Arc::new(Mutex::new(ControllerInner {
                state: WidgetState::Idle,
                status: None,
                comment: String::new(),
                screenshot: None,
                session: None,
            })),
            config,
            buffer,
            failures,
            screenshots,
            sync,
            store,
        }
    }

    // ─── Observers ───────────────────────────────────────────────────────────

    pub async fn state(&self) -> WidgetState {
        self.inner.lock().await.state
    }

    pub async fn status(&self) -> Option<String> {
        self.inner.lock().await.status.clone()
    }

    pub async fn comment(&self) -> String {
        self.inner.lock().await.comment.clone()
    }

    /// The question under the cursor, while an answer flow is active.
    pub async fn current_question(&self) -> Option<Question> {
        self.inner
            .lock()
            .await
            .session
            .as_ref()
            .and_then(|s| s.current().cloned())
    }

    /// `(current index, total)` of the active answer flow.
    pub async fn question_progress(&self) -> Option<(usize, usize)> {
        self.inner
            .lock()
            .await
            .session
            .as_ref()
            .map(|s| (s.current_index(), s.len()))
    }

    // ─── Draft editing ───────────────────────────────────────────────────────

    pub async fn set_comment(&self, comment: impl Into<String>) {
        self.inner.lock().await.comment = comment.into();
    }

    /// Capture a screenshot into the draft report. Only valid while idle.
    /// Failure surfaces a status message and changes nothing else.
    pub async fn request_screenshot(&self) {
        if self.config.hide_screenshot {
            warn!("screenshot request ignored — hidden by configuration");
            return;
        }
        {
            let mut inner = self.inner.lock().await;
            if inner.state != WidgetState::Idle {
                warn!(state = %inner.state, "screenshot request ignored");
                return;
            }
            inner.state = WidgetState::CapturingScreenshot;
            inner.status = None;
        }

        let result = self.screenshots.capture().await;

        let mut inner = self.inner.lock().await;
        // A send may have started while the rasterizer ran; only leave the
        // capture sub-state if we are still in it.
        if inner.state == WidgetState::CapturingScreenshot {
            inner.state = WidgetState::Idle;
        }
        match result {
            Ok(image) => {
                inner.screenshot = Some(image);
                inner.status = Some("screenshot captured".into());
            }
            Err(e) => {
                inner.status = Some(format!("screenshot failed: {e}"));
                warn!(err = %e, "screenshot capture failed");
            }
        }
    }

    // ─── Report submission ───────────────────────────────────────────────────

    /// Assemble and submit a report. Returns `true` on acceptance.
    ///
    /// The log snapshot and latest error are captured atomically at the
    /// transition into `sending-report`. A second send while one is in
    /// flight (or while waiting on the peer) is rejected.
    pub async fn send_report(
        &self,
        mode: ReportMode,
        priority: Option<ReportPriority>,
        page_url: &str,
    ) -> bool {
        let report = {
            let mut inner = self.inner.lock().await;
            match inner.state {
                WidgetState::Idle | WidgetState::CapturingScreenshot => {}
                WidgetState::SendingReport | WidgetState::AwaitingPeer => {
                    inner.status = Some("a report is already in flight".into());
                    warn!(state = %inner.state, "send rejected — report already in flight");
                    return false;
                }
                other => {
                    warn!(state = %other, "send request ignored");
                    return false;
                }
            }
            inner.state = WidgetState::SendingReport;
            inner.status = Some("sending report".into());

            let screenshot = inner.screenshot.clone().filter(|image| {
                if image.len() as i64 > self.config.max_file_size {
                    warn!(
                        bytes = image.len(),
                        cap = self.config.max_file_size,
                        "screenshot exceeds max_file_size — sent without it"
                    );
                    return false;
                }
                true
            });

            DebugReport {
                logs: self.buffer.snapshot(),
                error: self.failures.latest(),
                screenshot,
                comment: inner.comment.clone(),
                page_url: page_url.to_string(),
                project_path: (!self.config.project_path.is_empty())
                    .then(|| self.config.project_path.clone()),
                timestamp: chrono::Utc::now().timestamp_millis(),
                client_info: client_info(),
                mode,
                priority,
            }
        };

        let outcome = self.sync.submit_report(&report).await;

        let mut inner = self.inner.lock().await;
        match outcome {
            Ok(receipt) => {
                self.store.append(SessionRecord {
                    id: Uuid::new_v4().to_string(),
                    timestamp: report.timestamp,
                    comment: report.comment.clone(),
                    status: SessionStatus::Pending,
                    report_id: Some(receipt.report_id.clone()),
                    peer_session_id: receipt.session_id.clone(),
                });
                // The draft is consumed on success only.
                inner.comment.clear();
                inner.screenshot = None;
                match mode {
                    ReportMode::Wait => {
                        inner.state = WidgetState::AwaitingPeer;
                        inner.status = Some("waiting for the peer to respond".into());
                    }
                    ReportMode::Backlog => {
                        inner.state = WidgetState::Idle;
                        inner.status = Some("report added to the backlog".into());
                    }
                }
                info!(report_id = %receipt.report_id, mode = ?mode, "report submitted");
                true
            }
            Err(e) => {
                // The comment stays put so the user can retry the send.
                inner.state = WidgetState::Idle;
                inner.status = Some(format!("send failed: {e}"));
                warn!(err = %e, "report submission failed");
                false
            }
        }
    }

    // ─── Answer flow ─────────────────────────────────────────────────────────

    /// Peer-initiated question batch.
    ///
    /// Preempts `awaiting-peer` unconditionally, discarding the stale wait
    /// status, and also opens the answer flow from `idle`. In any other
    /// state the batch is dropped so an active flow is never clobbered.
    pub async fn on_question_batch(&self, batch: QuestionBatch) {
        if batch.questions.is_empty() {
            warn!(session_id = %batch.session_id, "empty question batch dropped");
            return;
        }
        let mut inner = self.inner.lock().await;
        match inner.state {
            WidgetState::AwaitingPeer | WidgetState::Idle => {
                info!(
                    session_id = %batch.session_id,
                    count = batch.questions.len(),
                    "question batch opens the answer flow"
                );
                inner.session = Some(QuestionSession::new(batch.session_id, batch.questions));
                inner.state = WidgetState::Answering;
                inner.status = None;
            }
            other => {
                warn!(state = %other, session_id = %batch.session_id, "question batch dropped");
            }
        }
    }

    pub async fn set_answer(&self, question_id: &str, answer: &str) {
        let mut inner = self.inner.lock().await;
        if inner.state != WidgetState::Answering {
            return;
        }
        if let Some(session) = inner.session.as_mut() {
            session.set_answer(question_id, answer);
        }
    }

    /// Advance to the next question; moving past the last one enters
    /// review. A no-op (returning `false`) while the current required
    /// question is unanswered.
    pub async fn next_question(&self) -> bool {
        let mut inner = self.inner.lock().await;
        if inner.state != WidgetState::Answering {
            return false;
        }
        let Some(session) = inner.session.as_mut() else {
            return false;
        };
        if !session.next() {
            return false;
        }
        if session.in_review() {
            inner.state = WidgetState::Reviewing;
        }
        true
    }

    /// Step back one question. No-op at the first.
    pub async fn back_question(&self) {
        let mut inner = self.inner.lock().await;
        if inner.state != WidgetState::Answering {
            return;
        }
        if let Some(session) = inner.session.as_mut() {
            session.back();
        }
    }

    /// From review, jump back to one question for editing.
    pub async fn edit_question(&self, index: usize) {
        let mut inner = self.inner.lock().await;
        if inner.state != WidgetState::Reviewing {
            return;
        }
        let Some(session) = inner.session.as_mut() else {
            return;
        };
        session.jump_to(index);
        inner.state = WidgetState::Answering;
    }

    /// Submit the reviewed answers. Returns `true` on acceptance.
    ///
    /// On success the matching session record flips to `answered` and the
    /// question session is destroyed. On failure the flow returns to
    /// review with the answers intact so the user can retry.
    pub async fn submit_answers(&self) -> bool {
        let (session_id, payload) = {
            let mut inner = self.inner.lock().await;
            if inner.state != WidgetState::Reviewing {
                warn!(state = %inner.state, "answer submission ignored");
                return false;
            }
            let Some(session) = inner.session.as_ref() else {
                return false;
            };
            let session_id = session.session_id.clone();
            let payload = session.payload();
            inner.state = WidgetState::SubmittingAnswers;
            inner.status = Some("submitting answers".into());
            (session_id, payload)
        };

        let outcome = self.sync.submit_answers(&session_id, &payload).await;

        let mut inner = self.inner.lock().await;
        match outcome {
            Ok(()) => {
                self.store.mark_answered(&session_id);
                inner.session = None;
                inner.state = WidgetState::Idle;
                inner.status = Some("answers submitted".into());
                info!(session_id = %session_id, "answers submitted");
                true
            }
            Err(e) => {
                inner.state = WidgetState::Reviewing;
                inner.status = Some(format!("answer submission failed: {e}"));
                warn!(err = %e, "answer submission failed");
                false
            }
        }
    }

    /// Give up waiting for the peer. Valid only in `awaiting-peer`.
    pub async fn dismiss_waiting(&self) {
        let mut inner = self.inner.lock().await;
        if inner.state == WidgetState::AwaitingPeer {
            inner.state = WidgetState::Idle;
            inner.status = None;
        }
    }

    /// Drop any in-progress answer flow and return to idle (widget
    /// teardown).
    pub(crate) async fn teardown(&self) {
        let mut inner = self.inner.lock().await;
        inner.session = None;
        inner.state = WidgetState::Idle;
        inner.status = None;
    }
}
