//! API route handlers.
//!
//! Each submodule handles a specific group of endpoints:
//! - `registration`: registration start and payment completion
//! - `attendance`: QR-scan attendance verification
//! - `artifacts`: QR/PDF downloads by registrant identifier
//! - `admin`: session-gated management, refunds, exports and aggregates

pub mod admin;
pub mod artifacts;
pub mod attendance;
pub mod registration;

use axum::routing::{get, post};
use axum::{Json, Router};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::api::ApiState;

pub fn build_router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/health", get(health))
        // Registration and payment
        .route("/pay", post(registration::start_registration))
        .route("/payment-success", post(registration::complete_payment))
        // Artifact downloads
        .route("/get-qr/:uid", get(artifacts::get_qr))
        .route("/get-pdf/:uid", get(artifacts::get_pdf))
        // Attendance
        .route("/verify/:uid", get(attendance::verify))
        // Admin surface
        .route("/admin/login", post(admin::login))
        .route("/admin/logout", post(admin::logout))
        .route("/admin", get(admin::list_registrants))
        .route("/admin-dashboard", get(admin::attendance_dashboard))
        .route("/admin/refunds", get(admin::refund_eligible))
        .route("/process_refund/:uid", post(admin::process_refund))
        .route("/delete/:uid", post(admin::delete_registrant))
        .route("/export/csv", get(admin::export_csv))
        .route("/export/pdf", get(admin::export_pdf))
        // Public chart feeds
        .route("/dashboard_data", get(admin::dashboard_data))
        .route("/chart_data", get(admin::chart_data))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}
