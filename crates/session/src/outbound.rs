//! Outbound send seam.
//!
//! The HTTP layer talks to [`Outbound`] only; the live implementation sends
//! through the client slot the runtime keeps populated while connected.

use std::{sync::Arc, time::Duration};

use {
    async_trait::async_trait,
    tokio::sync::Mutex,
    tracing::warn,
    whatsapp_rust::client::Client,
};

use crate::{
    address,
    error::{Error, Result},
};

/// Sink for outbound text messages.
#[async_trait]
pub trait Outbound: Send + Sync {
    /// Send `body` to the chat identified by `to` (a normalized chat
    /// identifier). Returns the client-assigned message id.
    async fn send_text(&self, to: &str, body: &str) -> Result<String>;
}

/// Delays between send attempts: 500ms, 1s, 2s.
const RETRY_DELAYS_MS: [u64; 3] = [500, 1000, 2000];

/// Live client slot shared between the runtime and the send path.
pub type ClientSlot = Arc<Mutex<Option<Arc<Client>>>>;

/// Sends through the live client while one is connected.
pub struct ClientOutbound {
    slot: ClientSlot,
}

impl ClientOutbound {
    pub fn new(slot: ClientSlot) -> Self {
        Self { slot }
    }
}

#[async_trait]
impl Outbound for ClientOutbound {
    async fn send_text(&self, to: &str, body: &str) -> Result<String> {
        // Clone the handle out so the slot is free during the send.
        let client = self
            .slot
            .lock()
            .await
            .as_ref()
            .cloned()
            .ok_or(Error::NotConnected)?;

        let jid = address::to_jid(to)?;
        let message = waproto::whatsapp::Message {
            conversation: Some(body.to_string()),
            ..Default::default()
        };

        let mut last_err = String::new();
        for (attempt, delay_ms) in RETRY_DELAYS_MS.iter().enumerate() {
            match client.send_message(jid.clone(), message.clone()).await {
                Ok(message_id) => return Ok(message_id),
                Err(e) => {
                    last_err = e.to_string();
                    let attempt_num = attempt + 1;
                    if attempt_num < RETRY_DELAYS_MS.len() {
                        warn!(
                            attempt = attempt_num,
                            error = %last_err,
                            "send attempt failed, retrying in {delay_ms}ms"
                        );
                        tokio::time::sleep(Duration::from_millis(*delay_ms)).await;
                    }
                },
            }
        }

        Err(Error::send(format!(
            "giving up after {} attempts: {last_err}",
            RETRY_DELAYS_MS.len()
        )))
    }
}
