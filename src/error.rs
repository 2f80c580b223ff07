//! Auth Error Taxonomy
//! Mission: One closed set of failure kinds, one HTTP boundary mapping

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::error;

/// Closed error taxonomy for the authentication subsystem.
///
/// Every component fails with one of these kinds. The `IntoResponse`
/// implementation is the single boundary handler: it maps kinds to HTTP
/// statuses and sanitized bodies. Collaborator failures (`Internal`, `Cache`)
/// are logged with full detail server-side and surfaced generically.
#[derive(Debug)]
pub enum AuthError {
    /// Malformed input; carries field-level detail.
    Validation { field: &'static str, message: String },
    /// No bearer token in the request.
    MissingToken,
    /// Signature or format failure.
    InvalidToken,
    /// Token past its `exp` claim.
    TokenExpired,
    /// Token present in the revocation cache.
    TokenRevoked,
    /// Credential proof failed (unknown user, wrong password, inactive
    /// account). Deliberately indistinguishable to the client.
    InvalidCredentials,
    /// Valid principal lacking the required role, permission, or ownership.
    Forbidden,
    /// Duplicate registration.
    Conflict,
    /// Per-principal quota exceeded.
    RateLimited { retry_after_seconds: u64 },
    /// Credential-store or token-signing failure.
    Internal(anyhow::Error),
    /// Revocation-cache failure surfaced under the fail-closed policy.
    Cache(anyhow::Error),
}

impl AuthError {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        AuthError::Validation {
            field,
            message: message.into(),
        }
    }

    /// Machine-readable error code included in response bodies.
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::Validation { .. } => "validation_error",
            AuthError::MissingToken => "missing_token",
            AuthError::InvalidToken => "invalid_token",
            AuthError::TokenExpired => "token_expired",
            AuthError::TokenRevoked => "token_revoked",
            AuthError::InvalidCredentials => "invalid_credentials",
            AuthError::Forbidden => "forbidden",
            AuthError::Conflict => "conflict",
            AuthError::RateLimited { .. } => "rate_limit_exceeded",
            AuthError::Internal(_) => "internal_error",
            AuthError::Cache(_) => "cache_unavailable",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::Validation { .. } => StatusCode::BAD_REQUEST,
            AuthError::MissingToken
            | AuthError::InvalidToken
            | AuthError::TokenExpired
            | AuthError::TokenRevoked
            | AuthError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            AuthError::Forbidden => StatusCode::FORBIDDEN,
            AuthError::Conflict => StatusCode::CONFLICT,
            AuthError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            AuthError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AuthError::Cache(_) => StatusCode::BAD_GATEWAY,
        }
    }

    /// Sanitized client-facing message. Never includes collaborator detail.
    fn message(&self) -> String {
        match self {
            AuthError::Validation { message, .. } => message.clone(),
            AuthError::MissingToken => "Missing authorization token".to_string(),
            AuthError::InvalidToken => "Invalid token".to_string(),
            AuthError::TokenExpired => "Token has expired".to_string(),
            AuthError::TokenRevoked => "Token has been revoked".to_string(),
            AuthError::InvalidCredentials => "Invalid email or password".to_string(),
            AuthError::Forbidden => "Insufficient permissions".to_string(),
            AuthError::Conflict => "Email is already registered".to_string(),
            AuthError::RateLimited { .. } => {
                "Too many requests. Please slow down.".to_string()
            }
            AuthError::Internal(_) => "Internal server error".to_string(),
            AuthError::Cache(_) => "Service temporarily unavailable".to_string(),
        }
    }
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthError::Validation { field, message } => {
                write!(f, "validation failed for {field}: {message}")
            }
            AuthError::Internal(e) => write!(f, "internal error: {e}"),
            AuthError::Cache(e) => write!(f, "cache error: {e}"),
            _ => write!(f, "{}", self.message()),
        }
    }
}

impl std::error::Error for AuthError {}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        // Operational (4xx) errors are expected; only collaborator failures
        // are logged here, at error severity with full detail.
        match &self {
            AuthError::Internal(e) => error!(error = ?e, "Internal failure in auth subsystem"),
            AuthError::Cache(e) => error!(error = ?e, "Revocation cache failure"),
            _ => {}
        }

        let status = self.status();
        let mut body = json!({
            "error": self.code(),
            "message": self.message(),
        });

        match &self {
            AuthError::Validation { field, .. } => {
                body["field"] = json!(field);
            }
            AuthError::RateLimited {
                retry_after_seconds,
            } => {
                body["retry_after_seconds"] = json!(retry_after_seconds);
                return (
                    status,
                    [("Retry-After", retry_after_seconds.to_string())],
                    Json(body),
                )
                    .into_response();
            }
            _ => {}
        }

        (status, Json(body)).into_response()
    }
}
