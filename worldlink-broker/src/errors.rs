//! This module defines the [`Error`] the websocket connection may encounter
//! and the [`ApiError`] a REST dispatch may resolve to. It provides a method
//! to transform websocket errors into a close frame and an `IntoResponse`
//! implementation for REST errors.

use axum::extract::ws::{CloseFrame, close_code};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;
use uuid::Uuid;

/// Close code used for handshake/auth rejection, per the wire contract.
pub const CLOSE_CODE_POLICY_VIOLATION: u16 = 1008;
/// Close code used for unexpected internal errors.
pub const CLOSE_CODE_INTERNAL_ERROR: u16 = 1011;

/// All errors that may occur while handling one websocket connection.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The handshake's `id` or `token` query parameter was missing.
    #[error("missing id or token")]
    MissingHandshakeParams,
    /// The auth adapter rejected the handshake's credentials.
    #[error("invalid session credentials")]
    InvalidCredentials,
    /// A session for this id already exists; the new connection wins.
    #[error("session {0} superseded")]
    Superseded(String),
    /// The peer closed the connection.
    #[error("connection closed by peer")]
    ConnectionClosed,
    /// The underlying transport returned an error.
    #[error(transparent)]
    Axum(#[from] axum::Error),
    /// Received a frame type we don't expect (e.g. a raw Ping payload mismatch).
    #[error("unexpected message")]
    UnexpectedMessage,
    /// A frame failed to decode as a valid envelope.
    #[error(transparent)]
    Json(#[from] worldlink_types::EnvelopeError),
}

impl Error {
    /// Transforms the error into a [`CloseFrame`] if one should be sent.
    #[tracing::instrument(level = "debug", skip_all)]
    pub fn into_close_frame(&self) -> Option<CloseFrame> {
        tracing::debug!("{self:?}");
        match self {
            Error::ConnectionClosed => None,
            Error::MissingHandshakeParams => Some(CloseFrame {
                code: CLOSE_CODE_POLICY_VIOLATION,
                reason: "missing id or token".into(),
            }),
            Error::InvalidCredentials => Some(CloseFrame {
                code: CLOSE_CODE_POLICY_VIOLATION,
                reason: "invalid credentials".into(),
            }),
            Error::Superseded(id) => Some(CloseFrame {
                code: close_code::POLICY,
                reason: format!("session {id} superseded by a newer connection").into(),
            }),
            Error::Axum(err) => {
                tracing::trace!("transport error: {err:?}");
                Some(CloseFrame {
                    code: close_code::ERROR,
                    reason: "unexpected error".into(),
                })
            }
            Error::UnexpectedMessage => Some(CloseFrame {
                code: close_code::UNSUPPORTED,
                reason: "unexpected message".into(),
            }),
            Error::Json(err) => Some(CloseFrame {
                code: CLOSE_CODE_INTERNAL_ERROR,
                reason: err.to_string().into(),
            }),
        }
    }
}

/// Errors a REST dispatch may resolve to, mapped to HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// A required parameter was missing from the request.
    #[error("missing parameter: {0}")]
    MissingParameter(String),
    /// A parameter had the wrong type or failed `validateParams`.
    #[error("{error}")]
    ValidationRejected {
        /// Machine-readable error message.
        error: String,
        /// Optional hint for the caller on how to fix the request.
        suggestion: Option<String>,
    },
    /// No session is registered for the requested `clientId`.
    #[error("world offline")]
    WorldOffline,
    /// The session existed but the send to it failed.
    #[error("upstream send failed")]
    UpstreamSendFailed,
    /// The world disconnected before it replied.
    #[error("world disconnected")]
    WorldDisconnected,
    /// The world did not reply within the configured deadline.
    #[error("upstream timeout")]
    UpstreamTimeout,
    /// The world replied with an error payload.
    #[error("world reported error: {0}")]
    WorldReportedError(String),
    /// The caller exceeded their daily quota.
    #[error("quota exceeded")]
    QuotaExceeded,
    /// The caller's API key was not recognized.
    #[error("unauthorized")]
    Unauthorized,
    /// The credential/quota backend itself could not be reached.
    #[error("internal error")]
    Internal(#[from] eyre::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        match self {
            ApiError::MissingParameter(name) => (
                StatusCode::BAD_REQUEST,
                Json(json!({"error": format!("missing parameter: {name}")})),
            )
                .into_response(),
            ApiError::ValidationRejected { error, suggestion } => (
                StatusCode::BAD_REQUEST,
                Json(json!({"error": error, "suggestion": suggestion})),
            )
                .into_response(),
            ApiError::WorldOffline => (
                StatusCode::NOT_FOUND,
                Json(json!({"error": "world is not connected"})),
            )
                .into_response(),
            ApiError::UpstreamSendFailed | ApiError::WorldDisconnected => (
                StatusCode::BAD_GATEWAY,
                Json(json!({"error": self.to_string()})),
            )
                .into_response(),
            ApiError::UpstreamTimeout => (
                StatusCode::GATEWAY_TIMEOUT,
                Json(json!({"error": "world did not respond in time"})),
            )
                .into_response(),
            ApiError::WorldReportedError(err) => {
                (StatusCode::UNPROCESSABLE_ENTITY, Json(json!({"error": err}))).into_response()
            }
            ApiError::QuotaExceeded => (
                StatusCode::TOO_MANY_REQUESTS,
                Json(json!({"error": "daily quota exceeded"})),
            )
                .into_response(),
            ApiError::Unauthorized => {
                (StatusCode::UNAUTHORIZED, Json(json!({"error": "unauthorized"}))).into_response()
            }
            ApiError::Internal(err) => {
                let error_id = Uuid::new_v4();
                tracing::error!("{error_id} - {err:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({"error": format!("internal error, error-id={error_id}")})),
                )
                    .into_response()
            }
        }
    }
}
