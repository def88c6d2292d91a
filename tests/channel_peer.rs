//! Duplex channel against a real WebSocket listener.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

use buglink::channel::{ChannelState, DuplexChannel, QuestionBatch};

const QUESTIONS_PAYLOAD: &str = r#"{
    "type": "questions",
    "data": {
        "sessionId": "s1",
        "questions": [
            {"id": "q1", "text": "Why?", "kind": "text", "required": true}
        ]
    }
}"#;

/// WebSocket peer that optionally drops the first connection, then serves
/// every later one by pushing `payloads` and holding the socket open.
async fn spawn_ws_peer(payloads: Vec<String>, drop_first: bool) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let mut first = true;
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                break;
            };
            let Ok(mut ws) = tokio_tungstenite::accept_async(stream).await else {
                continue;
            };
            if drop_first && first {
                first = false;
                let _ = ws.close(None).await;
                continue;
            }
            for payload in &payloads {
                if ws.send(Message::Text(payload.clone())).await.is_err() {
                    break;
                }
            }
            while let Some(msg) = ws.next().await {
                if msg.is_err() {
                    break;
                }
            }
        }
    });
    format!("http://{addr}")
}

async fn recv_batch(rx: &mut mpsc::UnboundedReceiver<QuestionBatch>) -> QuestionBatch {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for a question batch")
        .expect("batch channel closed")
}

#[tokio::test]
async fn delivers_question_batches_to_the_subscriber() {
    let peer = spawn_ws_peer(vec![QUESTIONS_PAYLOAD.to_string()], false).await;
    let channel = DuplexChannel::with_delay(&peer, Duration::from_millis(100));

    let (tx, mut rx) = mpsc::unbounded_channel();
    channel.on_questions(move |batch| {
        let _ = tx.send(batch);
    });
    channel.connect();

    let batch = recv_batch(&mut rx).await;
    assert_eq!(batch.session_id, "s1");
    assert_eq!(batch.questions.len(), 1);
    assert_eq!(batch.questions[0].id, "q1");
    assert_eq!(channel.state(), ChannelState::Connected);

    channel.disconnect();
    assert_eq!(channel.state(), ChannelState::Disconnected);
}

#[tokio::test]
async fn malformed_payloads_do_not_kill_the_connection() {
    let peer = spawn_ws_peer(
        vec![
            "garbage".to_string(),
            r#"{"type":"unknown"}"#.to_string(),
            QUESTIONS_PAYLOAD.to_string(),
        ],
        false,
    )
    .await;
    let channel = DuplexChannel::with_delay(&peer, Duration::from_millis(100));

    let (tx, mut rx) = mpsc::unbounded_channel();
    channel.on_questions(move |batch| {
        let _ = tx.send(batch);
    });
    channel.connect();

    // Only the valid payload is dispatched; the bad ones were dropped
    // without closing the socket.
    let batch = recv_batch(&mut rx).await;
    assert_eq!(batch.session_id, "s1");
    assert_eq!(channel.state(), ChannelState::Connected);

    channel.disconnect();
}

#[tokio::test]
async fn reconnects_after_the_peer_drops_the_connection() {
    let peer = spawn_ws_peer(vec![QUESTIONS_PAYLOAD.to_string()], true).await;
    let channel = DuplexChannel::with_delay(&peer, Duration::from_millis(100));

    let (tx, mut rx) = mpsc::unbounded_channel();
    channel.on_questions(move |batch| {
        let _ = tx.send(batch);
    });
    channel.connect();

    // First connection is dropped by the peer; the batch arrives over the
    // second one after the fixed reconnect delay.
    let batch = recv_batch(&mut rx).await;
    assert_eq!(batch.session_id, "s1");
    assert!(channel.attempts() >= 2, "attempts = {}", channel.attempts());

    channel.disconnect();
}
