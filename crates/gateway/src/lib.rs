//! HTTP surface for warelay.
//!
//! Exposes the delegated session over a small REST API: a status summary
//! at `/`, browser pairing pages at `/qr`, and outbound sending at
//! `/send-message` behind an optional API-key guard. All session work
//! happens in `warelay-session`; this crate only translates between HTTP
//! and [`warelay_session::SessionHandle`].

pub mod auth;
pub mod error;
pub mod routes;
pub mod server;
pub mod state;
mod templates;

pub use {
    error::ApiError,
    server::{build_app, serve},
    state::AppState,
};
