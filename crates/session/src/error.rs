use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// No live client connection to send through.
    #[error("messaging session is not connected")]
    NotConnected,

    /// The recipient could not be turned into a chat identifier.
    #[error("invalid recipient: {message}")]
    InvalidRecipient { message: String },

    /// The delegated client rejected or failed the send.
    #[error("send failed: {message}")]
    Send { message: String },

    /// Building or starting the delegated client failed.
    #[error("session client: {message}")]
    Client { message: String },

    /// Rendering the pairing artifact failed.
    #[error("pairing artifact render failed: {message}")]
    Render { message: String },

    #[error("session store: {0}")]
    Store(#[from] sqlx::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    #[must_use]
    pub fn invalid_recipient(message: impl Into<String>) -> Self {
        Self::InvalidRecipient {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn send(message: impl Into<String>) -> Self {
        Self::Send {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn client(message: impl Into<String>) -> Self {
        Self::Client {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn render(message: impl Into<String>) -> Self {
        Self::Render {
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
