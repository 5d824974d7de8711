//! REST API implementation.

pub mod routes;
pub mod state;

use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use tracing::error;

use crate::registration::RegistrationError;

pub use state::ApiState;

/// Session token header for in-flight registrations.
pub const SESSION_TOKEN_HEADER: &str = "x-session-token";
/// Admin session token header for gated routes.
pub const ADMIN_TOKEN_HEADER: &str = "x-admin-token";

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: message.into(),
        }
    }
}

/// Map a workflow error to its HTTP reply. Internal errors are logged here
/// and surfaced as a generic failure.
pub(crate) fn error_reply(err: RegistrationError) -> (StatusCode, Json<ErrorResponse>) {
    let status = match &err {
        RegistrationError::Validation(_) | RegistrationError::SessionExpired => {
            StatusCode::BAD_REQUEST
        }
        RegistrationError::DuplicateContact
        | RegistrationError::AlreadyRefunded
        | RegistrationError::NotPaid => StatusCode::CONFLICT,
        RegistrationError::UnknownRegistrant(_) => StatusCode::NOT_FOUND,
        RegistrationError::Gateway(_) => StatusCode::BAD_GATEWAY,
        RegistrationError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    let message = match &err {
        RegistrationError::Storage(inner) => {
            error!(error = %inner, "storage failure");
            "internal error".to_string()
        }
        other => other.to_string(),
    };
    (status, Json(ErrorResponse::new(message)))
}
