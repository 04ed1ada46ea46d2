//! Route handlers.

use {
    axum::{
        Json,
        extract::State,
        response::{Html, IntoResponse},
    },
    serde::Deserialize,
    serde_json::{Value, json},
    tracing::{info, warn},
};

use warelay_session::address::normalize_chat_id;

use crate::{error::ApiError, state::AppState, templates};

const NOT_CONNECTED_HINT: &str = "whatsapp is not connected; scan the pairing code at /qr first";

/// Connection status summary.
pub async fn status_handler(State(state): State<AppState>) -> impl IntoResponse {
    let snapshot = state.session.snapshot();
    let mut body = json!({
        "status": "online",
        "whatsappReady": snapshot.is_ready(),
        "state": snapshot.phase,
        "message": snapshot.status_message(),
        "uptimeSecs": state.uptime_secs(),
    });
    if let Some(code) = &snapshot.pairing {
        body["qrAgeSecs"] = json!(code.age_secs());
    }
    Json(body)
}

/// Liveness probe.
pub async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "uptime": state.uptime_secs(),
    }))
}

/// Pairing page, keyed on the current session phase.
pub async fn qr_page_handler(State(state): State<AppState>) -> impl IntoResponse {
    let snapshot = state.session.snapshot();
    Html(templates::pairing_page(&snapshot))
}

/// Pairing state as JSON, for programmatic polling.
pub async fn qr_json_handler(State(state): State<AppState>) -> impl IntoResponse {
    let snapshot = state.session.snapshot();
    let body = match &snapshot.pairing {
        Some(code) => json!({
            "status": snapshot.phase,
            "qr": code.code,
        }),
        None => json!({
            "status": snapshot.phase,
            "message": snapshot.status_message(),
        }),
    };
    Json(body)
}

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    #[serde(default)]
    pub number: String,
    #[serde(default)]
    pub message: String,
}

/// Deliver a text message through the delegated session.
pub async fn send_message_handler(
    State(state): State<AppState>,
    Json(request): Json<SendMessageRequest>,
) -> Result<Json<Value>, ApiError> {
    // Readiness is checked before the payload: a not-ready session answers
    // 503 no matter what the body looks like.
    if !state.session.snapshot().is_ready() {
        return Err(ApiError::not_ready(NOT_CONNECTED_HINT));
    }

    if request.number.is_empty() || request.message.is_empty() {
        return Err(ApiError::validation("number and message are required"));
    }

    let chat_id = normalize_chat_id(&request.number);
    match state.session.send_text(&chat_id, &request.message).await {
        Ok(id) => {
            info!(to = %chat_id, message_id = %id, "message delivered");
            Ok(Json(json!({
                "success": true,
                "message": "message sent",
                "to": request.number,
            })))
        },
        Err(warelay_session::Error::NotConnected) => Err(ApiError::not_ready(NOT_CONNECTED_HINT)),
        Err(e) => {
            warn!(error = %e, "message delivery failed");
            Err(ApiError::Delegation { source: e })
        },
    }
}
