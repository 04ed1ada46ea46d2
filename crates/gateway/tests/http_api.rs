//! Integration tests for the HTTP API: status, pairing pages, sending,
//! and the API-key guard.

use std::{net::SocketAddr, sync::Arc};

use {
    async_trait::async_trait,
    secrecy::Secret,
    tokio::{
        net::TcpListener,
        sync::{Mutex, watch},
    },
};

use {
    warelay_gateway::{AppState, build_app},
    warelay_session::{
        Outbound, SessionEvent, SessionHandle, SessionSnapshot, SessionTracker,
        error::{Error, Result},
    },
};

/// Outbound double that records deliveries instead of talking to WhatsApp.
#[derive(Default)]
struct MockOutbound {
    calls: Mutex<Vec<(String, String)>>,
    next_error: Mutex<Option<Error>>,
}

impl MockOutbound {
    async fn fail_next(&self, error: Error) {
        *self.next_error.lock().await = Some(error);
    }

    async fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().await.clone()
    }
}

#[async_trait]
impl Outbound for MockOutbound {
    async fn send_text(&self, to: &str, body: &str) -> Result<String> {
        if let Some(error) = self.next_error.lock().await.take() {
            return Err(error);
        }
        self.calls
            .lock()
            .await
            .push((to.to_string(), body.to_string()));
        Ok("3EB0MOCKID".to_string())
    }
}

/// Spawn the app on an ephemeral port with a controllable session.
async fn start_server(
    api_key: Option<&str>,
) -> (SocketAddr, watch::Sender<SessionSnapshot>, Arc<MockOutbound>) {
    let (snapshot_tx, snapshot_rx) = watch::channel(SessionSnapshot::initial());
    let outbound = Arc::new(MockOutbound::default());
    let handle = SessionHandle::new(snapshot_rx, outbound.clone());
    let state = AppState::new(handle, api_key.map(|k| Secret::new(k.to_string())));
    let app = build_app(state);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, snapshot_tx, outbound)
}

/// Run a tracker through `events` and return the final snapshot.
fn snapshot_after(events: &[SessionEvent]) -> SessionSnapshot {
    let mut tracker = SessionTracker::new();
    let mut snap = tracker.snapshot().clone();
    for event in events {
        snap = tracker.apply(event.clone());
    }
    snap
}

fn ready_snapshot() -> SessionSnapshot {
    snapshot_after(&[SessionEvent::Ready])
}

fn pairing_snapshot() -> SessionSnapshot {
    snapshot_after(&[SessionEvent::QrIssued {
        code: "2@mock-pairing-payload".to_string(),
    }])
}

/// The root endpoint reports the session phase without side effects.
#[tokio::test]
async fn status_reports_phase_and_uptime() {
    let (addr, _tx, _outbound) = start_server(None).await;

    let body: serde_json::Value = reqwest::get(format!("http://{addr}/"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body["status"], "online");
    assert_eq!(body["whatsappReady"], false);
    assert_eq!(body["state"], "initializing");
    assert!(body["uptimeSecs"].is_u64());
    assert!(body.get("qrAgeSecs").is_none());
}

/// Polling the root endpoint never changes the reported state.
#[tokio::test]
async fn status_is_idempotent() {
    let (addr, tx, _outbound) = start_server(None).await;
    tx.send(ready_snapshot()).unwrap();

    for _ in 0..3 {
        let body: serde_json::Value = reqwest::get(format!("http://{addr}/"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["state"], "ready");
        assert_eq!(body["whatsappReady"], true);
    }
}

/// While a pairing code is live the status carries its age.
#[tokio::test]
async fn status_exposes_code_age_while_pairing() {
    let (addr, tx, _outbound) = start_server(None).await;
    tx.send(pairing_snapshot()).unwrap();

    let body: serde_json::Value = reqwest::get(format!("http://{addr}/"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body["state"], "pairing_required");
    assert!(body["qrAgeSecs"].is_u64());
}

/// The health endpoint answers regardless of the session phase.
#[tokio::test]
async fn health_is_always_ok() {
    let (addr, tx, _outbound) = start_server(None).await;

    let body: serde_json::Value = reqwest::get(format!("http://{addr}/health"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "ok");
    assert!(body["uptime"].is_u64());

    tx.send(snapshot_after(&[SessionEvent::Disconnected {
        reason: "socket closed".to_string(),
    }]))
    .unwrap();

    let resp = reqwest::get(format!("http://{addr}/health")).await.unwrap();
    assert_eq!(resp.status(), 200);
}

/// The pairing page shows a spinner before any code exists.
#[tokio::test]
async fn qr_page_waits_while_initializing() {
    let (addr, _tx, _outbound) = start_server(None).await;

    let html = reqwest::get(format!("http://{addr}/qr"))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(html.contains("loader"));
    assert!(!html.contains("data:image/png;base64,"));
}

/// The pairing page embeds the code image while pairing is required.
#[tokio::test]
async fn qr_page_shows_code_while_pairing() {
    let (addr, tx, _outbound) = start_server(None).await;
    tx.send(pairing_snapshot()).unwrap();

    let html = reqwest::get(format!("http://{addr}/qr"))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(html.contains("Scan this QR code"));
    assert!(html.contains("data:image/png;base64,"));
}

/// Once connected the pairing page stops showing any code.
#[tokio::test]
async fn qr_page_confirms_connection_when_ready() {
    let (addr, tx, _outbound) = start_server(None).await;
    tx.send(ready_snapshot()).unwrap();

    let html = reqwest::get(format!("http://{addr}/qr"))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(html.contains("WhatsApp is connected"));
    assert!(!html.contains("data:image/png;base64,"));
}

/// The JSON pairing endpoint returns the raw payload while pairing.
#[tokio::test]
async fn qr_json_carries_payload_only_while_pairing() {
    let (addr, tx, _outbound) = start_server(None).await;
    tx.send(pairing_snapshot()).unwrap();

    let body: serde_json::Value = reqwest::get(format!("http://{addr}/qr.json"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "pairing_required");
    assert_eq!(body["qr"], "2@mock-pairing-payload");

    tx.send(ready_snapshot()).unwrap();
    let body: serde_json::Value = reqwest::get(format!("http://{addr}/qr.json"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "ready");
    assert!(body.get("qr").is_none());
}

/// Sending is refused with 503 in every phase except ready.
#[tokio::test]
async fn send_refused_unless_ready() {
    let (addr, tx, outbound) = start_server(None).await;
    let client = reqwest::Client::new();

    let not_ready = [
        SessionSnapshot::initial(),
        pairing_snapshot(),
        snapshot_after(&[
            SessionEvent::Ready,
            SessionEvent::Disconnected {
                reason: "socket closed".to_string(),
            },
        ]),
    ];

    // Well-formed and broken payloads alike: readiness is decided first,
    // so a not-ready session never answers 400.
    let payloads = [
        serde_json::json!({"number": "50912345678", "message": "hi"}),
        serde_json::json!({}),
        serde_json::json!({"number": ""}),
    ];

    for snapshot in not_ready {
        tx.send(snapshot).unwrap();
        for payload in &payloads {
            let resp = client
                .post(format!("http://{addr}/send-message"))
                .json(payload)
                .send()
                .await
                .unwrap();
            assert_eq!(resp.status(), 503, "payload {payload} should get 503");
            let body: serde_json::Value = resp.json().await.unwrap();
            assert_eq!(body["success"], false);
        }
    }

    assert!(outbound.calls().await.is_empty());
}

/// On a ready session, missing fields are rejected before delegation.
#[tokio::test]
async fn send_validates_payload_first() {
    let (addr, tx, outbound) = start_server(None).await;
    tx.send(ready_snapshot()).unwrap();
    let client = reqwest::Client::new();

    let bad_payloads = [
        serde_json::json!({}),
        serde_json::json!({"number": "50912345678"}),
        serde_json::json!({"message": "hi"}),
        serde_json::json!({"number": "", "message": "hi"}),
        serde_json::json!({"number": "50912345678", "message": ""}),
    ];

    for payload in bad_payloads {
        let resp = client
            .post(format!("http://{addr}/send-message"))
            .json(&payload)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 400);
        let body: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "number and message are required");
    }

    assert!(outbound.calls().await.is_empty());
}

/// Bare numbers gain the chat suffix; qualified ones pass through.
#[tokio::test]
async fn send_normalizes_the_recipient() {
    let (addr, tx, outbound) = start_server(None).await;
    tx.send(ready_snapshot()).unwrap();
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("http://{addr}/send-message"))
        .json(&serde_json::json!({"number": "50912345678", "message": "hello"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["to"], "50912345678");

    let resp = client
        .post(format!("http://{addr}/send-message"))
        .json(&serde_json::json!({"number": "50912345678@c.us", "message": "again"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let calls = outbound.calls().await;
    assert_eq!(
        calls,
        vec![
            ("50912345678@c.us".to_string(), "hello".to_string()),
            ("50912345678@c.us".to_string(), "again".to_string()),
        ]
    );
}

/// A delegation failure surfaces as 500 with the underlying reason.
#[tokio::test]
async fn send_reports_delegation_failures() {
    let (addr, tx, outbound) = start_server(None).await;
    tx.send(ready_snapshot()).unwrap();
    outbound
        .fail_next(Error::send("giving up after 3 attempts: timed out"))
        .await;

    let client = reqwest::Client::new();
    let resp = client
        .post(format!("http://{addr}/send-message"))
        .json(&serde_json::json!({"number": "50912345678", "message": "hi"}))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 500);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "message delivery failed");
    assert!(
        body["error"]
            .as_str()
            .unwrap()
            .contains("giving up after 3 attempts")
    );
}

/// Without a configured key the sending route is open.
#[tokio::test]
async fn guard_passes_through_when_unconfigured() {
    let (addr, tx, _outbound) = start_server(None).await;
    tx.send(ready_snapshot()).unwrap();

    let resp = reqwest::Client::new()
        .post(format!("http://{addr}/send-message"))
        .json(&serde_json::json!({"number": "50912345678", "message": "hi"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
}

/// A configured key turns missing credentials into 401 and wrong ones
/// into 403, for both header styles.
#[tokio::test]
async fn guard_distinguishes_missing_from_wrong() {
    let (addr, tx, _outbound) = start_server(Some("sk-secret")).await;
    tx.send(ready_snapshot()).unwrap();
    let client = reqwest::Client::new();
    let payload = serde_json::json!({"number": "50912345678", "message": "hi"});

    let resp = client
        .post(format!("http://{addr}/send-message"))
        .json(&payload)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["message"], "missing api key");

    let resp = client
        .post(format!("http://{addr}/send-message"))
        .header("X-API-Key", "wrong")
        .json(&payload)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);

    let resp = client
        .post(format!("http://{addr}/send-message"))
        .header("Authorization", "Bearer wrong")
        .json(&payload)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);
}

/// Both credential styles are accepted when the key matches.
#[tokio::test]
async fn guard_accepts_raw_and_bearer_credentials() {
    let (addr, tx, outbound) = start_server(Some("sk-secret")).await;
    tx.send(ready_snapshot()).unwrap();
    let client = reqwest::Client::new();
    let payload = serde_json::json!({"number": "50912345678", "message": "hi"});

    let resp = client
        .post(format!("http://{addr}/send-message"))
        .header("X-API-Key", "sk-secret")
        .json(&payload)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let resp = client
        .post(format!("http://{addr}/send-message"))
        .header("Authorization", "Bearer sk-secret")
        .json(&payload)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    assert_eq!(outbound.calls().await.len(), 2);
}

/// The status and pairing surfaces stay public when a key is configured.
#[tokio::test]
async fn guard_leaves_read_surfaces_public() {
    let (addr, tx, _outbound) = start_server(Some("sk-secret")).await;
    tx.send(pairing_snapshot()).unwrap();

    for path in ["/", "/health", "/qr", "/qr.json"] {
        let resp = reqwest::get(format!("http://{addr}{path}")).await.unwrap();
        assert_eq!(resp.status(), 200, "{path} should not require a key");
    }
}
