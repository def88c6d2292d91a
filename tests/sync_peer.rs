//! Sync client behavior against the peer's HTTP interface.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};

use buglink::report::{client_info, DebugReport, ReportMode};
use buglink::sync::{QuestionAnswer, SyncClient, SyncError};

#[derive(Clone)]
struct PeerConfig {
    reject: bool,
    healthy: bool,
}

async fn debug_handler(
    State(cfg): State<Arc<PeerConfig>>,
    Json(_body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    if cfg.reject {
        return (StatusCode::SERVICE_UNAVAILABLE, Json(json!({})));
    }
    (
        StatusCode::OK,
        Json(json!({
            "data": {
                "reportId": "r42",
                "timestamp": 1234,
                "backlogItemId": "b7"
            }
        })),
    )
}

async fn answer_handler(State(cfg): State<Arc<PeerConfig>>) -> StatusCode {
    if cfg.reject {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    }
}

async fn health_handler(State(cfg): State<Arc<PeerConfig>>) -> StatusCode {
    if cfg.healthy {
        StatusCode::OK
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

async fn spawn_peer(cfg: PeerConfig) -> String {
    let app = Router::new()
        .route("/api/debug", post(debug_handler))
        .route("/api/questions/answer", post(answer_handler))
        .route("/api/health", get(health_handler))
        .with_state(Arc::new(cfg));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

fn minimal_report() -> DebugReport {
    DebugReport {
        logs: vec![],
        error: None,
        screenshot: None,
        comment: String::new(),
        page_url: "app://test".into(),
        project_path: None,
        timestamp: 0,
        client_info: client_info(),
        mode: ReportMode::Backlog,
        priority: None,
    }
}

#[tokio::test]
async fn submit_report_decodes_the_data_envelope() {
    let peer = spawn_peer(PeerConfig {
        reject: false,
        healthy: true,
    })
    .await;
    let client = SyncClient::new(&peer);

    let receipt = client.submit_report(&minimal_report()).await.unwrap();
    assert_eq!(receipt.report_id, "r42");
    assert_eq!(receipt.timestamp, 1234);
    assert!(receipt.session_id.is_none());
    assert_eq!(receipt.backlog_item_id.as_deref(), Some("b7"));
}

#[tokio::test]
async fn non_success_status_is_peer_rejected_with_status_text() {
    let peer = spawn_peer(PeerConfig {
        reject: true,
        healthy: true,
    })
    .await;
    let client = SyncClient::new(&peer);

    let err = client.submit_report(&minimal_report()).await.unwrap_err();
    match err {
        SyncError::PeerRejected { status, detail } => {
            assert_eq!(status, 503);
            assert_eq!(detail, "Service Unavailable");
        }
        other => panic!("expected PeerRejected, got {other:?}"),
    }

    let answers = [QuestionAnswer {
        question_id: "q1".into(),
        answer: "a".into(),
    }];
    let err = client.submit_answers("s1", &answers).await.unwrap_err();
    assert!(matches!(err, SyncError::PeerRejected { status: 503, .. }));
}

#[tokio::test]
async fn transport_failure_is_peer_unreachable() {
    let client = SyncClient::new("http://127.0.0.1:1");
    let err = client.submit_report(&minimal_report()).await.unwrap_err();
    assert!(matches!(err, SyncError::PeerUnreachable(_)));
}

#[tokio::test]
async fn health_check_never_errors() {
    let healthy = spawn_peer(PeerConfig {
        reject: false,
        healthy: true,
    })
    .await;
    assert!(SyncClient::new(&healthy).health_check().await);

    let sick = spawn_peer(PeerConfig {
        reject: false,
        healthy: false,
    })
    .await;
    assert!(!SyncClient::new(&sick).health_check().await);

    // Unreachable collapses to false as well.
    assert!(!SyncClient::new("http://127.0.0.1:1").health_check().await);
}
