//! Shared state threaded through every handler.

use std::time::Instant;

use {secrecy::Secret, warelay_session::SessionHandle};

#[derive(Clone)]
pub struct AppState {
    pub session: SessionHandle,
    pub api_key: Option<Secret<String>>,
    pub started_at: Instant,
}

impl AppState {
    #[must_use]
    pub fn new(session: SessionHandle, api_key: Option<Secret<String>>) -> Self {
        Self {
            session,
            api_key,
            started_at: Instant::now(),
        }
    }

    /// Whole seconds since the server came up.
    #[must_use]
    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}
