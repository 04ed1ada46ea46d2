//! Session phase state machine.
//!
//! One [`SessionTracker`] lives inside the runtime task and is the only
//! place transitions happen. Everything else sees immutable
//! [`SessionSnapshot`] values through a watch channel.

use std::time::{Duration, Instant};

use {
    serde::Serialize,
    tracing::{info, warn},
};

use crate::qr;

/// How long a pairing code stays scannable. Drives the countdown on the
/// pairing page; the client library rotates codes on its own schedule and
/// each rotation arrives as a fresh [`SessionEvent::QrIssued`].
pub const PAIRING_CODE_TTL: Duration = Duration::from_secs(60);

/// Connection phase of the delegated messaging session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    Initializing,
    PairingRequired,
    Ready,
    Disconnected,
}

/// Lifecycle event raised by the delegated client.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// A fresh pairing payload was issued.
    QrIssued { code: String },
    /// The phone accepted the pairing scan; connection follows shortly.
    PairAccepted,
    /// The session is linked and usable.
    Ready,
    /// The session material was rejected or invalidated.
    AuthFailure { reason: String },
    /// The connection dropped.
    Disconnected { reason: String },
}

/// One-time pairing artifact scanned from the phone.
#[derive(Debug, Clone)]
pub struct PairingCode {
    /// Raw payload handed over by the client library.
    pub code: String,
    /// Rendered PNG as a data URL, embedded directly in the pairing page.
    /// Empty when rendering failed; the page falls back to the raw payload.
    pub image_data_url: String,
    /// Issuance instant. Drives the page countdown and the status age field.
    pub issued_at: Instant,
}

impl PairingCode {
    pub fn age_secs(&self) -> u64 {
        self.issued_at.elapsed().as_secs()
    }

    /// Seconds left before the code expires on screen, clamped at zero.
    pub fn remaining_secs(&self) -> u64 {
        PAIRING_CODE_TTL.as_secs().saturating_sub(self.age_secs())
    }
}

/// Immutable view of the tracker, published after every transition.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub phase: SessionPhase,
    pub pairing: Option<PairingCode>,
    pub last_error: Option<String>,
    pub ready_since: Option<Instant>,
}

impl SessionSnapshot {
    pub fn initial() -> Self {
        Self {
            phase: SessionPhase::Initializing,
            pairing: None,
            last_error: None,
            ready_since: None,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.phase == SessionPhase::Ready
    }

    /// Human status line shown on the root endpoint.
    pub fn status_message(&self) -> String {
        match self.phase {
            SessionPhase::Initializing => "whatsapp client is initializing".into(),
            SessionPhase::PairingRequired => match (&self.pairing, &self.last_error) {
                (Some(_), _) => "pairing required, scan the code at /qr".into(),
                (None, Some(err)) => format!("authentication failed ({err}), waiting for a new pairing code"),
                (None, None) => "pairing required, waiting for a code".into(),
            },
            SessionPhase::Ready => "whatsapp api is operational".into(),
            SessionPhase::Disconnected => match &self.last_error {
                Some(err) => format!("disconnected ({err}), reconnecting"),
                None => "disconnected, reconnecting".into(),
            },
        }
    }
}

/// Owns the session state. Only the runtime task applies events.
#[derive(Debug)]
pub struct SessionTracker {
    snapshot: SessionSnapshot,
}

impl SessionTracker {
    pub fn new() -> Self {
        Self {
            snapshot: SessionSnapshot::initial(),
        }
    }

    /// Apply one lifecycle event and return the updated snapshot.
    ///
    /// The pairing artifact only survives inside `PairingRequired`; every
    /// other transition clears it.
    pub fn apply(&mut self, event: SessionEvent) -> SessionSnapshot {
        match event {
            SessionEvent::QrIssued { code } => {
                info!("pairing code issued, scan it from the phone");
                let image_data_url = match qr::render_data_url(&code) {
                    Ok(url) => url,
                    Err(e) => {
                        warn!(error = %e, "pairing image render failed, page will show the raw payload");
                        String::new()
                    },
                };
                self.snapshot.phase = SessionPhase::PairingRequired;
                self.snapshot.pairing = Some(PairingCode {
                    code,
                    image_data_url,
                    issued_at: Instant::now(),
                });
                self.snapshot.last_error = None;
                self.snapshot.ready_since = None;
            },
            SessionEvent::PairAccepted => {
                info!("pairing accepted by the phone, waiting for the connection");
            },
            SessionEvent::Ready => {
                info!("session connected");
                self.snapshot.phase = SessionPhase::Ready;
                self.snapshot.pairing = None;
                self.snapshot.last_error = None;
                self.snapshot.ready_since = Some(Instant::now());
            },
            SessionEvent::AuthFailure { reason } => {
                warn!(reason = %reason, "session authentication failed");
                self.snapshot.phase = SessionPhase::PairingRequired;
                self.snapshot.pairing = None;
                self.snapshot.last_error = Some(reason);
                self.snapshot.ready_since = None;
            },
            SessionEvent::Disconnected { reason } => {
                warn!(reason = %reason, "session disconnected");
                self.snapshot.phase = SessionPhase::Disconnected;
                self.snapshot.pairing = None;
                self.snapshot.last_error = Some(reason);
                self.snapshot.ready_since = None;
            },
        }
        self.snapshot.clone()
    }

    pub fn snapshot(&self) -> &SessionSnapshot {
        &self.snapshot
    }
}

impl Default for SessionTracker {
    fn default() -> Self {
        Self::new()
    }
}
