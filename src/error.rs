//! Gateway error types with HTTP status code mapping.
//!
//! [`GatewayError`] is the central error type for the gateway. Each variant
//! maps to a numeric code shared by the REST and WebSocket surfaces, and to
//! an HTTP status for REST responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use utoipa::ToSchema;

/// Structured JSON error response body.
///
/// All error responses follow this shape:
/// ```json
/// {
///   "error": {
///     "code": 4030,
///     "message": "not allowed to join band-42",
///     "details": null
///   }
/// }
/// ```
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Structured error payload.
    pub error: ErrorBody,
}

/// Inner error body with numeric code and human-readable message.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    /// Numeric error code.
    pub code: u32,
    /// Human-readable error message.
    pub message: String,
    /// Optional additional details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Server-side error enum with HTTP status code mapping.
///
/// # Error Code Ranges
///
/// | Range     | Category        | HTTP Status                  |
/// |-----------|-----------------|------------------------------|
/// | 1000–1999 | Validation      | 400 Bad Request              |
/// | 2000–2999 | State/Not Found | 404 Not Found / 410 Gone     |
/// | 3000–3999 | Server          | 500 / 502 / 504              |
/// | 4000–4999 | Auth            | 401 Unauthorized / 403       |
///
/// None of these is fatal to the process: a failure is scoped to the one
/// connection or request that produced it.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Missing or rejected credential at admission.
    #[error("unauthenticated: {0}")]
    Unauthenticated(String),

    /// The token verifier did not answer within the admission deadline.
    #[error("token verification timed out after {timeout_ms} ms")]
    VerifierTimeout {
        /// Deadline that elapsed, in milliseconds.
        timeout_ms: u64,
    },

    /// The identity is not allowed to act on the given room.
    #[error("not allowed to {action} {room}")]
    Unauthorized {
        /// Attempted action (`join`, `publish`, ...).
        action: &'static str,
        /// Textual room id.
        room: String,
    },

    /// Read or write failure on a connection's transport.
    #[error("transport failure: {0}")]
    TransportFailure(String),

    /// A command arrived for a connection that has already been removed.
    #[error("connection {0} is closed")]
    ConnectionClosed(uuid::Uuid),

    /// A room kind or room id could not be parsed.
    #[error("invalid room: {0}")]
    InvalidRoom(String),

    /// Room with the given id has no members and therefore does not exist.
    #[error("room not found: {0}")]
    RoomNotFound(String),

    /// Request validation failed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::InvalidRequest(_) => 1001,
            Self::InvalidRoom(_) => 1002,
            Self::RoomNotFound(_) => 2001,
            Self::ConnectionClosed(_) => 2002,
            Self::Internal(_) => 3000,
            Self::TransportFailure(_) => 3001,
            Self::Unauthenticated(_) => 4010,
            Self::VerifierTimeout { .. } => 4011,
            Self::Unauthorized { .. } => 4030,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) | Self::InvalidRoom(_) => StatusCode::BAD_REQUEST,
            Self::RoomNotFound(_) => StatusCode::NOT_FOUND,
            Self::ConnectionClosed(_) => StatusCode::GONE,
            Self::Unauthenticated(_) | Self::VerifierTimeout { .. } => StatusCode::UNAUTHORIZED,
            Self::Unauthorized { .. } => StatusCode::FORBIDDEN,
            Self::TransportFailure(_) => StatusCode::BAD_GATEWAY,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns `true` for failures that end admission.
    ///
    /// A verifier timeout counts as an authentication failure.
    #[must_use]
    pub const fn is_unauthenticated(&self) -> bool {
        matches!(
            self,
            Self::Unauthenticated(_) | Self::VerifierTimeout { .. }
        )
    }

    /// Message shown to remote clients.
    ///
    /// Admission failures collapse to one generic message so a client
    /// cannot tell a rejected token from a slow verifier.
    #[must_use]
    pub fn client_message(&self) -> String {
        if self.is_unauthenticated() {
            "authentication failed".to_string()
        } else {
            self.to_string()
        }
    }

    /// Builds the structured body shared by REST and WebSocket errors.
    #[must_use]
    pub fn to_body(&self) -> ErrorBody {
        ErrorBody {
            code: self.error_code(),
            message: self.client_message(),
            details: None,
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: self.to_body(),
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        response
    }
}
