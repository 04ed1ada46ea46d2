//! Construction of the delegated client and bridging of its events.

use std::sync::Arc;

use {
    tokio::sync::mpsc,
    tracing::info,
    wacore::types::events::Event,
    whatsapp_rust::bot::Bot,
    whatsapp_rust_tokio_transport::TokioWebSocketTransportFactory,
    whatsapp_rust_ureq_http_client::UreqHttpClient,
};

use crate::{
    error::{Error, Result},
    outbound::ClientSlot,
    state::SessionEvent,
    store::SessionStore,
};

/// Build the delegated client and start its background tasks.
///
/// Library events are mapped onto [`SessionEvent`]s and forwarded over
/// `events`. Each call owns one generation: once the receiving side is
/// dropped the forwarding closure stops touching the shared client slot,
/// so a superseded client cannot clobber its replacement's handle.
pub(crate) async fn build_and_run(
    store: Arc<SessionStore>,
    device_name: &str,
    events: mpsc::UnboundedSender<SessionEvent>,
    slot: ClientSlot,
) -> Result<()> {
    info!(device_name, "starting delegated messaging client");

    let mut bot = Bot::builder()
        .with_backend(store)
        .with_transport_factory(TokioWebSocketTransportFactory::new())
        .with_http_client(UreqHttpClient::new())
        .with_os_info(Some(device_name.to_string()), None)
        .on_event(move |event, client| {
            let events = events.clone();
            let slot = slot.clone();
            async move {
                let mapped = match event {
                    Event::PairingQrCode { code, .. } => SessionEvent::QrIssued { code },
                    Event::PairSuccess(_) => SessionEvent::PairAccepted,
                    Event::Connected(_) => SessionEvent::Ready,
                    Event::LoggedOut(_) => SessionEvent::AuthFailure {
                        reason: "logged out from the paired phone".to_string(),
                    },
                    Event::Disconnected(_) => SessionEvent::Disconnected {
                        reason: "connection to the service closed".to_string(),
                    },
                    _ => return,
                };

                // A closed channel means a newer generation owns the session.
                if events.send(mapped.clone()).is_err() {
                    return;
                }

                match mapped {
                    SessionEvent::Ready => {
                        *slot.lock().await = Some(client);
                    },
                    SessionEvent::Disconnected { .. } | SessionEvent::AuthFailure { .. } => {
                        *slot.lock().await = None;
                    },
                    _ => {},
                }
            }
        })
        .build()
        .await
        .map_err(|e| Error::client(format!("client build failed: {e}")))?;

    // run() spawns the connection tasks and returns; progress is observed
    // through the event channel.
    let _handle = bot
        .run()
        .await
        .map_err(|e| Error::client(format!("client run failed: {e}")))?;

    Ok(())
}
