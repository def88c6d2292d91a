// SPDX-License-Identifier: MIT
//! Reconnecting duplex channel to the peer.
//!
//! The peer pushes question-batch notifications over a persistent
//! WebSocket. On any close (error or clean termination) the channel
//! schedules exactly one reconnect attempt after a fixed delay: an
//! in-flight timer suppresses further scheduling, which bounds attempts to
//! one per window no matter how often the link flaps. Retries are
//! unlimited at a fixed interval with no backoff growth; the peer is a
//! local, eventually-available process.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context as _, Result};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};

use crate::questions::Question;

pub const RECONNECT_DELAY: Duration = Duration::from_millis(5000);

/// Connection lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Disconnected,
    Connecting,
    Connected,
}

impl std::fmt::Display for ChannelState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::Connecting => write!(f, "connecting"),
            Self::Connected => write!(f, "connected"),
        }
    }
}

/// A batch of clarification questions pushed by the peer.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionBatch {
    pub session_id: String,
    pub questions: Vec<Question>,
}

/// Inbound wire messages. Only `questions` is defined by the peer
/// contract; anything else fails to parse and is dropped.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
enum InboundMessage {
    Questions { data: QuestionBatch },
}

type BatchHandler = Arc<dyn Fn(QuestionBatch) + Send + Sync>;

struct ChannelInner {
    state: ChannelState,
    /// The single pending reconnect timer. Presence here suppresses any
    /// further scheduling until the timer fires or is cancelled.
    reconnect_timer: Option<JoinHandle<()>>,
    conn_task: Option<JoinHandle<()>>,
    handler: Option<BatchHandler>,
    shutdown: bool,
}

/// Reconnecting WebSocket client. Cheaply cloneable; clones share state.
#[derive(Clone)]
pub struct DuplexChannel {
    inner: Arc<Mutex<ChannelInner>>,
    url: Arc<str>,
    reconnect_delay: Duration,
    attempts: Arc<AtomicU64>,
}

impl DuplexChannel {
    /// `peer_url` is the peer's HTTP base; the duplex URL swaps the scheme
    /// (`http → ws`, `https → wss`).
    pub fn new(peer_url: &str) -> Self {
        Self::with_delay(peer_url, RECONNECT_DELAY)
    }

    pub fn with_delay(peer_url: &str, reconnect_delay: Duration) -> Self {
        Self {
            inner: Arc::new(Mutex::new(ChannelInner {
                state: ChannelState::Disconnected,
                reconnect_timer: None,
                conn_task: None,
                handler: None,
                shutdown: false,
            })),
            url: duplex_url(peer_url).into(),
            reconnect_delay,
            attempts: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Register the question-batch callback. One callback only; a later
    /// registration replaces the earlier one.
    pub fn on_questions(&self, handler: impl Fn(QuestionBatch) + Send + Sync + 'static) {
        self.lock().handler = Some(Arc::new(handler));
    }

    pub fn state(&self) -> ChannelState {
        self.lock().state
    }

    /// Total connection attempts made so far (diagnostics).
    pub fn attempts(&self) -> u64 {
        self.attempts.load(Ordering::Relaxed)
    }

    /// Open the connection. No-op unless currently disconnected.
    pub fn connect(&self) {
        {
            let mut inner = self.lock();
            if inner.state != ChannelState::Disconnected {
                return;
            }
            inner.shutdown = false;
            inner.state = ChannelState::Connecting;
        }
        self.attempts.fetch_add(1, Ordering::Relaxed);

        let this = self.clone();
        let task = tokio::spawn(async move {
            if let Err(e) = this.run_connection().await {
                debug!(err = %e, "duplex connection ended");
            }
            let reconnect = {
                let mut inner = this.lock();
                inner.state = ChannelState::Disconnected;
                inner.conn_task = None;
                !inner.shutdown
            };
            if reconnect {
                this.schedule_reconnect();
            }
        });
        self.lock().conn_task = Some(task);
    }

    /// Close the channel: cancel any pending reconnect timer and the
    /// active connection if present. Idempotent.
    pub fn disconnect(&self) {
        let mut inner = self.lock();
        inner.shutdown = true;
        if let Some(timer) = inner.reconnect_timer.take() {
            timer.abort();
        }
        if let Some(task) = inner.conn_task.take() {
            task.abort();
        }
        if inner.state != ChannelState::Disconnected {
            info!("duplex channel disconnected");
            inner.state = ChannelState::Disconnected;
        }
    }

    /// Arrange one reconnect attempt after the fixed delay. A pending
    /// timer suppresses the request entirely; this is the invariant that
    /// keeps flapping from piling up parallel attempts.
    fn schedule_reconnect(&self) {
        let mut inner = self.lock();
        if inner.shutdown || inner.reconnect_timer.is_some() {
            return;
        }
        debug!(
            delay_ms = self.reconnect_delay.as_millis() as u64,
            "duplex reconnect scheduled"
        );
        let this = self.clone();
        inner.reconnect_timer = Some(tokio::spawn(async move {
            tokio::time::sleep(this.reconnect_delay).await;
            this.lock().reconnect_timer = None;
            this.connect();
        }));
    }

    async fn run_connection(&self) -> Result<()> {
        info!(url = %self.url, "duplex channel connecting");
        let (mut ws, _) = connect_async(self.url.as_ref())
            .await
            .context("duplex connect failed")?;
        {
            let mut inner = self.lock();
            if inner.shutdown {
                return Ok(());
            }
            inner.state = ChannelState::Connected;
        }
        info!("duplex channel connected");

        while let Some(msg) = ws.next().await {
            match msg {
                Ok(Message::Text(text)) => self.handle_payload(&text),
                Ok(Message::Ping(payload)) => {
                    ws.send(Message::Pong(payload))
                        .await
                        .context("pong send failed")?;
                }
                Ok(Message::Close(_)) => break,
                Ok(_) => {}
                Err(e) => return Err(e).context("duplex read failed"),
            }
        }
        Ok(())
    }

    /// Parse one inbound payload. Malformed payloads are logged and
    /// dropped; bad input never kills the channel.
    fn handle_payload(&self, text: &str) {
        match serde_json::from_str::<InboundMessage>(text) {
            Ok(InboundMessage::Questions { data }) => {
                debug!(
                    session_id = %data.session_id,
                    count = data.questions.len(),
                    "question batch received"
                );
                let handler = self.lock().handler.clone();
                match handler {
                    Some(handler) => handler(data),
                    None => warn!("question batch dropped — no subscriber registered"),
                }
            }
            Err(e) => warn!(err = %e, "unparseable duplex payload dropped"),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ChannelInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Derive the duplex URL from the peer's HTTP base by swapping the scheme.
pub fn duplex_url(peer_url: &str) -> String {
    if let Some(rest) = peer_url.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = peer_url.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        peer_url.to_string()
    }
}
