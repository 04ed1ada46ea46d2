//! Delegated messaging session for warelay.
//!
//! Owns the whole lifecycle of the upstream WhatsApp Web connection: the
//! sqlite-backed credential store, the client itself, pairing-code
//! rendering, and a supervisor task that reinitializes the session after
//! disconnects. The HTTP layer consumes all of it through [`SessionHandle`].

pub mod address;
mod client;
pub mod error;
pub mod outbound;
pub mod qr;
pub mod runtime;
pub mod state;
pub mod store;

pub use {
    error::{Error, Result},
    outbound::Outbound,
    runtime::{SessionHandle, start},
    state::{PairingCode, SessionEvent, SessionPhase, SessionSnapshot, SessionTracker},
    store::SessionStore,
};
