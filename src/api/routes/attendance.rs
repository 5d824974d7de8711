//! Attendance verification endpoint.
//!
//! `GET /verify/{uid}` is what the QR code resolves to at the gate. The
//! transition fires exactly once per identifier; repeat scans come back as
//! warnings and unknown identifiers as errors, mirroring the statuses the
//! scanning UI displays.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use std::sync::Arc;

use crate::api::{error_reply, ApiState, ErrorResponse};
use crate::store::AttendanceOutcome;

#[derive(Debug, Serialize)]
pub struct VerifyResponse {
    pub success: bool,
    /// "success", "warning" or "error"
    pub status: &'static str,
    pub message: String,
}

/// GET /verify/{uid}
pub async fn verify(
    State(state): State<Arc<ApiState>>,
    Path(uid): Path<String>,
) -> Result<(StatusCode, Json<VerifyResponse>), (StatusCode, Json<ErrorResponse>)> {
    match state.registrar.verify_attendance(&uid).map_err(error_reply)? {
        AttendanceOutcome::Marked(reg) => Ok((
            StatusCode::OK,
            Json(VerifyResponse {
                success: true,
                status: "success",
                message: format!("Attendance marked for {} (Sem {}).", reg.name, reg.semester),
            }),
        )),
        AttendanceOutcome::AlreadyAttended(reg) => Ok((
            StatusCode::OK,
            Json(VerifyResponse {
                success: false,
                status: "warning",
                message: format!("{} has already attended.", reg.name),
            }),
        )),
        AttendanceOutcome::Unknown => Ok((
            StatusCode::NOT_FOUND,
            Json(VerifyResponse {
                success: false,
                status: "error",
                message: "Invalid QR or registrant not found.".to_string(),
            }),
        )),
    }
}
