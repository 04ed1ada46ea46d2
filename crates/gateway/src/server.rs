//! Router assembly and serving.

use {
    axum::{
        Router,
        middleware::from_fn_with_state,
        routing::{get, post},
    },
    tokio::net::TcpListener,
    tokio_util::sync::CancellationToken,
    tower_http::{
        cors::{Any, CorsLayer},
        trace::TraceLayer,
    },
    tracing::info,
};

use crate::{auth::require_api_key, routes, state::AppState};

/// Build the HTTP application (shared between production startup and tests).
///
/// Status, health, and pairing pages are public; only the sending route
/// sits behind the API-key guard.
pub fn build_app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let guarded = Router::new()
        .route("/send-message", post(routes::send_message_handler))
        .layer(from_fn_with_state(state.clone(), require_api_key));

    Router::new()
        .route("/", get(routes::status_handler))
        .route("/health", get(routes::health_handler))
        .route("/qr", get(routes::qr_page_handler))
        .route("/qr.json", get(routes::qr_json_handler))
        .merge(guarded)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Serve `app` on `listener` until `cancel` fires.
pub async fn serve(
    listener: TcpListener,
    app: Router,
    cancel: CancellationToken,
) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!("listening on http://{addr}");
        info!("pairing page at http://{addr}/qr");
    }

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await
}
