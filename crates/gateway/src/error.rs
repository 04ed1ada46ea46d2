//! HTTP error taxonomy.
//!
//! Every error renders as JSON with `success: false` so callers branch on
//! one body shape regardless of status code.

use {
    axum::{
        Json,
        http::StatusCode,
        response::{IntoResponse, Response},
    },
    serde_json::json,
};

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Request payload failed validation.
    #[error("{message}")]
    Validation { message: String },

    /// The session cannot deliver messages right now.
    #[error("{message}")]
    NotReady { message: String },

    /// The delegated client accepted the request but delivery failed.
    #[error("message delivery failed")]
    Delegation { source: warelay_session::Error },

    /// A guarded route was called without a credential.
    #[error("missing api key")]
    MissingCredential,

    /// The presented credential did not match the configured one.
    #[error("invalid api key")]
    InvalidCredential,
}

impl ApiError {
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn not_ready(message: impl Into<String>) -> Self {
        Self::NotReady {
            message: message.into(),
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::Validation { .. } => StatusCode::BAD_REQUEST,
            Self::NotReady { .. } => StatusCode::SERVICE_UNAVAILABLE,
            Self::Delegation { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Self::MissingCredential => StatusCode::UNAUTHORIZED,
            Self::InvalidCredential => StatusCode::FORBIDDEN,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut body = json!({
            "success": false,
            "message": self.to_string(),
        });
        if let Self::Delegation { source } = &self {
            body["error"] = json!(source.to_string());
        }
        (self.status(), Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_match_variants() {
        assert_eq!(ApiError::validation("x").status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ApiError::not_ready("x").status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            ApiError::MissingCredential.status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(ApiError::InvalidCredential.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn delegation_carries_underlying_error() {
        let err = ApiError::Delegation {
            source: warelay_session::Error::send("peer rejected"),
        };
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.to_string(), "message delivery failed");
    }
}
