//! Supervised session runtime.
//!
//! One background task owns the session state and the delegated client's
//! lifecycle. The HTTP layer only ever sees [`SessionHandle`]: snapshots
//! arrive through a watch channel, outbound messages go through the
//! [`Outbound`] trait.

use std::{path::Path, sync::Arc, time::Duration};

use {
    tokio::{
        sync::{Mutex, mpsc, watch},
        task::JoinHandle,
        time::sleep,
    },
    tokio_util::sync::CancellationToken,
    tracing::{info, warn},
};

use crate::{
    client,
    error::Result,
    outbound::{ClientOutbound, ClientSlot, Outbound},
    qr,
    state::{SessionEvent, SessionSnapshot, SessionTracker},
    store::SessionStore,
};

/// Pause between losing the session and the next initialization attempt.
const REINIT_DELAY: Duration = Duration::from_secs(5);

/// Cloneable view of the session for the HTTP layer.
#[derive(Clone)]
pub struct SessionHandle {
    snapshot_rx: watch::Receiver<SessionSnapshot>,
    outbound: Arc<dyn Outbound>,
}

impl SessionHandle {
    /// Assemble a handle from a snapshot channel and an outbound sender.
    #[must_use]
    pub fn new(snapshot_rx: watch::Receiver<SessionSnapshot>, outbound: Arc<dyn Outbound>) -> Self {
        Self {
            snapshot_rx,
            outbound,
        }
    }

    /// Latest published view of the session.
    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshot_rx.borrow().clone()
    }

    /// Deliver a text message through the delegated client.
    pub async fn send_text(&self, to: &str, body: &str) -> Result<String> {
        self.outbound.send_text(to, body).await
    }
}

/// Open the session store and spawn the supervisor task.
///
/// The returned handle stays valid across reconnects. Cancelling `cancel`
/// winds the supervisor down after its current step.
pub async fn start(
    data_dir: &Path,
    device_name: &str,
    cancel: CancellationToken,
) -> Result<(SessionHandle, JoinHandle<()>)> {
    std::fs::create_dir_all(data_dir)?;
    let store = Arc::new(SessionStore::open(&data_dir.join("session.db")).await?);

    let (snapshot_tx, snapshot_rx) = watch::channel(SessionSnapshot::initial());
    let slot: ClientSlot = Arc::new(Mutex::new(None));
    let outbound: Arc<dyn Outbound> = Arc::new(ClientOutbound::new(slot.clone()));

    let supervisor = tokio::spawn(run_supervisor(
        store,
        device_name.to_string(),
        snapshot_tx,
        slot,
        cancel,
    ));

    Ok((SessionHandle::new(snapshot_rx, outbound), supervisor))
}

/// Drive the session through build, event pump, and reinitialization cycles.
///
/// Exactly one client generation is live at a time. Every generation gets
/// a fresh event channel; once the supervisor moves on, events from an
/// orphaned client hit a closed channel and never reach the tracker.
async fn run_supervisor(
    store: Arc<SessionStore>,
    device_name: String,
    snapshot_tx: watch::Sender<SessionSnapshot>,
    slot: ClientSlot,
    cancel: CancellationToken,
) {
    let mut tracker = SessionTracker::new();

    'supervise: loop {
        if cancel.is_cancelled() {
            break;
        }

        let (events_tx, mut events_rx) = mpsc::unbounded_channel();

        match client::build_and_run(store.clone(), &device_name, events_tx, slot.clone()).await {
            Ok(()) => {
                let mut reset_store = false;

                loop {
                    tokio::select! {
                        () = cancel.cancelled() => break 'supervise,
                        event = events_rx.recv() => {
                            let Some(event) = event else { break };

                            if let SessionEvent::QrIssued { code } = &event {
                                match qr::render_terminal(code) {
                                    Ok(rendered) => {
                                        info!("pairing required; scan the code below:\n{rendered}");
                                    },
                                    Err(e) => warn!(error = %e, "terminal pairing code rendering failed"),
                                }
                            }

                            let generation_over = matches!(
                                event,
                                SessionEvent::Disconnected { .. } | SessionEvent::AuthFailure { .. }
                            );
                            if matches!(event, SessionEvent::AuthFailure { .. }) {
                                reset_store = true;
                            }

                            let snap = tracker.apply(event);
                            let _ = snapshot_tx.send(snap);

                            if generation_over {
                                break;
                            }
                        },
                    }
                }

                *slot.lock().await = None;

                if reset_store {
                    // Stale credentials stop the library from issuing fresh
                    // pairing codes, so drop them before the next attempt.
                    if let Err(e) = store.reset().await {
                        warn!(error = %e, "session store reset failed");
                    }
                }
            },
            Err(e) => {
                warn!(error = %e, "client initialization failed");
                let snap = tracker.apply(SessionEvent::Disconnected {
                    reason: format!("initialization failed: {e}"),
                });
                let _ = snapshot_tx.send(snap);
            },
        }

        info!(
            delay_secs = REINIT_DELAY.as_secs(),
            "scheduling session reinitialization"
        );
        if wait_reinit(&cancel).await {
            break;
        }
    }

    *slot.lock().await = None;
    info!("session runtime stopped");
}

/// Sleep out the reinitialization delay; true when cancelled instead.
async fn wait_reinit(cancel: &CancellationToken) -> bool {
    tokio::select! {
        () = cancel.cancelled() => true,
        () = sleep(REINIT_DELAY) => false,
    }
}
