//! Admin and reporting endpoints.
//!
//! Everything except the two chart feeds requires a session token from
//! `POST /admin/login`, sent back in the `x-admin-token` header. The chart
//! feeds are public read-only aggregates consumed by the event's status
//! page.

use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::error;

use crate::api::{error_reply, ApiState, ErrorResponse, ADMIN_TOKEN_HEADER};
use crate::reports;
use crate::store::{DashboardTotals, Registrant, SemesterAttendance};

// ============================================================================
// SESSIONS
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub success: bool,
    pub token: String,
}

/// POST /admin/login
pub async fn login(
    State(state): State<Arc<ApiState>>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, (StatusCode, Json<ErrorResponse>)> {
    match state.admin.login(&req.username, &req.password) {
        Some(token) => Ok(Json(LoginResponse {
            success: true,
            token,
        })),
        None => Err((
            StatusCode::UNAUTHORIZED,
            Json(ErrorResponse::new("invalid credentials")),
        )),
    }
}

/// POST /admin/logout
pub async fn logout(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
) -> Json<serde_json::Value> {
    if let Some(token) = headers.get(ADMIN_TOKEN_HEADER).and_then(|v| v.to_str().ok()) {
        state.admin.logout(token);
    }
    Json(serde_json::json!({ "success": true }))
}

fn require_admin(
    state: &ApiState,
    headers: &HeaderMap,
) -> Result<(), (StatusCode, Json<ErrorResponse>)> {
    let authorized = headers
        .get(ADMIN_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|token| state.admin.is_authorized(token));
    if authorized {
        Ok(())
    } else {
        Err((
            StatusCode::UNAUTHORIZED,
            Json(ErrorResponse::new("admin session required")),
        ))
    }
}

// ============================================================================
// MANAGEMENT
// ============================================================================

#[derive(Debug, Serialize)]
pub struct RegistrantListResponse {
    pub success: bool,
    pub registrants: Vec<Registrant>,
    pub total: usize,
}

/// GET /admin - full registrant listing, newest first.
pub async fn list_registrants(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
) -> Result<Json<RegistrantListResponse>, (StatusCode, Json<ErrorResponse>)> {
    require_admin(&state, &headers)?;
    let registrants = state
        .registrar
        .store()
        .list_all()
        .map_err(|e| error_reply(e.into()))?;
    Ok(Json(RegistrantListResponse {
        total: registrants.len(),
        success: true,
        registrants,
    }))
}

/// GET /admin/refunds - registrants eligible for the post-event refund.
pub async fn refund_eligible(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
) -> Result<Json<RegistrantListResponse>, (StatusCode, Json<ErrorResponse>)> {
    require_admin(&state, &headers)?;
    let registrants = state.registrar.refund_eligible().map_err(error_reply)?;
    Ok(Json(RegistrantListResponse {
        total: registrants.len(),
        success: true,
        registrants,
    }))
}

#[derive(Debug, Serialize)]
pub struct RefundResponse {
    pub success: bool,
    pub registrant: Registrant,
    pub message: String,
}

/// POST /process_refund/{uid}
pub async fn process_refund(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
    Path(uid): Path<String>,
) -> Result<Json<RefundResponse>, (StatusCode, Json<ErrorResponse>)> {
    require_admin(&state, &headers)?;
    let reg = state.registrar.refund(&uid).await.map_err(error_reply)?;
    Ok(Json(RefundResponse {
        message: format!("Refund processed for {} (Sem {}).", reg.name, reg.semester),
        success: true,
        registrant: reg,
    }))
}

/// POST /delete/{uid}
pub async fn delete_registrant(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
    Path(uid): Path<String>,
) -> Result<Json<serde_json::Value>, (StatusCode, Json<ErrorResponse>)> {
    require_admin(&state, &headers)?;
    state.registrar.delete(&uid).map_err(error_reply)?;
    Ok(Json(serde_json::json!({ "success": true })))
}

// ============================================================================
// AGGREGATES
// ============================================================================

#[derive(Debug, Serialize)]
pub struct AttendanceDashboardResponse {
    pub success: bool,
    pub total_registrants: u64,
    pub total_present: u64,
    pub total_absent: u64,
    pub semesters: Vec<SemesterAttendance>,
}

/// GET /admin-dashboard - attendance aggregates per semester.
pub async fn attendance_dashboard(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
) -> Result<Json<AttendanceDashboardResponse>, (StatusCode, Json<ErrorResponse>)> {
    require_admin(&state, &headers)?;
    let semesters = state
        .registrar
        .store()
        .attendance_by_semester()
        .map_err(|e| error_reply(e.into()))?;
    let total_present: u64 = semesters.iter().map(|s| s.present).sum();
    let total_absent: u64 = semesters.iter().map(|s| s.absent).sum();
    Ok(Json(AttendanceDashboardResponse {
        success: true,
        total_registrants: total_present + total_absent,
        total_present,
        total_absent,
        semesters,
    }))
}

#[derive(Debug, Serialize)]
pub struct DashboardDataResponse {
    pub success: bool,
    #[serde(flatten)]
    pub totals: DashboardTotals,
}

/// GET /dashboard_data - public aggregate counts and monetary totals.
pub async fn dashboard_data(
    State(state): State<Arc<ApiState>>,
) -> Result<Json<DashboardDataResponse>, (StatusCode, Json<ErrorResponse>)> {
    let totals = state
        .registrar
        .store()
        .dashboard_totals()
        .map_err(|e| error_reply(e.into()))?;
    Ok(Json(DashboardDataResponse {
        success: true,
        totals,
    }))
}

#[derive(Debug, Serialize)]
pub struct ChartDataResponse {
    pub success: bool,
    pub labels: Vec<String>,
    pub registrants: Vec<u64>,
    pub dependents: Vec<u64>,
    pub total_dependents: u64,
}

/// GET /chart_data - per-semester series for the client-side charts.
pub async fn chart_data(
    State(state): State<Arc<ApiState>>,
) -> Result<Json<ChartDataResponse>, (StatusCode, Json<ErrorResponse>)> {
    let breakdown = state
        .registrar
        .store()
        .semester_breakdown()
        .map_err(|e| error_reply(e.into()))?;
    let labels = breakdown.iter().map(|b| format!("Sem {}", b.semester)).collect();
    let registrants = breakdown.iter().map(|b| b.registrants).collect();
    let dependents: Vec<u64> = breakdown.iter().map(|b| b.dependents).collect();
    let total_dependents = dependents.iter().sum();
    Ok(Json(ChartDataResponse {
        success: true,
        labels,
        registrants,
        dependents,
        total_dependents,
    }))
}

// ============================================================================
// EXPORTS
// ============================================================================

/// GET /export/csv - snapshot CSV of the record store.
pub async fn export_csv(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
) -> Result<Response, (StatusCode, Json<ErrorResponse>)> {
    require_admin(&state, &headers)?;
    let rows = state
        .registrar
        .store()
        .list_all()
        .map_err(|e| error_reply(e.into()))?;
    let csv = reports::csv_snapshot(&rows).map_err(internal)?;
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv".to_string()),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"registrations.csv\"".to_string(),
            ),
        ],
        csv,
    )
        .into_response())
}

/// GET /export/pdf - snapshot report PDF of the record store.
pub async fn export_pdf(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
) -> Result<Response, (StatusCode, Json<ErrorResponse>)> {
    require_admin(&state, &headers)?;
    let rows = state
        .registrar
        .store()
        .list_all()
        .map_err(|e| error_reply(e.into()))?;
    let pdf = crate::artifacts::render_report(&rows).map_err(internal)?;
    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"registrations_report.pdf\"".to_string(),
            ),
        ],
        pdf,
    )
        .into_response())
}

fn internal(err: anyhow::Error) -> (StatusCode, Json<ErrorResponse>) {
    error!(error = %err, "export failed");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse::new("internal error")),
    )
}
